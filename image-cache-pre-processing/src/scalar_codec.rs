/// 24-bit RGB encoding of floating point scalar values.
///
/// `(0, 0, 0)` is reserved for "no value" and decodes to NaN. Every other triple holds
/// `code = r * 65536 + g * 256 + b`, and the decoded value is `min + delta * (code - 1)`.
use crate::error::{ConvertError, ConvertResult};
use constants::normal::NORMAL_RANGE;
use constants::texture::{MAX_SCALAR_CODE, SCALAR_CODE_STEPS};
use serde::{Deserialize, Serialize};

/// RGB triple reserved for a missing value.
pub const NO_VALUE: [u8; 3] = [0, 0, 0];

/// Value range a field was encoded with. Always satisfies `max > min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 2]", try_from = "[f64; 2]")]
pub struct ScalarRange {
    min: f64,
    max: f64,
}

impl ScalarRange {
    /// Creates a range, rejecting `max <= min` and NaN bounds.
    pub fn new(min: f64, max: f64) -> ConvertResult<Self> {
        if max > min {
            Ok(Self { min, max })
        } else {
            Err(ConvertError::RangeDegenerate { min, max })
        }
    }

    /// Range used for each component of an encoded normal.
    pub fn normal() -> Self {
        Self {
            min: NORMAL_RANGE.0,
            max: NORMAL_RANGE.1,
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Quantization step between two consecutive codes.
    pub fn delta(&self) -> f64 {
        (self.max - self.min) / SCALAR_CODE_STEPS
    }

    /// Encodes a value, clamping to the range bounds. NaN maps to [`NO_VALUE`].
    pub fn encode(&self, value: f64) -> [u8; 3] {
        if value.is_nan() {
            return NO_VALUE;
        }

        let steps = ((value - self.min) / self.delta())
            .round()
            .clamp(0.0, (MAX_SCALAR_CODE - 1) as f64);
        let code = steps as u32 + 1;

        [(code >> 16) as u8, (code >> 8) as u8, code as u8]
    }

    /// Decodes an RGB triple, returning NaN for [`NO_VALUE`].
    pub fn decode(&self, rgb: [u8; 3]) -> f64 {
        if rgb == NO_VALUE {
            return f64::NAN;
        }

        let code = (rgb[0] as u32) << 16 | (rgb[1] as u32) << 8 | rgb[2] as u32;
        self.min + self.delta() * (code - 1) as f64
    }
}

impl From<ScalarRange> for [f64; 2] {
    fn from(range: ScalarRange) -> Self {
        [range.min, range.max]
    }
}

impl TryFrom<[f64; 2]> for ScalarRange {
    type Error = ConvertError;

    fn try_from(bounds: [f64; 2]) -> Result<Self, Self::Error> {
        ScalarRange::new(bounds[0], bounds[1])
    }
}

/// Encodes `value` into an RGB triple for `range`.
pub fn encode(value: f64, range: &ScalarRange) -> [u8; 3] {
    range.encode(value)
}

/// Decodes an RGB triple produced with `range`.
pub fn decode(rgb: [u8; 3], range: &ScalarRange) -> f64 {
    range.decode(rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_round_trip_within_half_step() {
        let ranges = [
            ScalarRange::new(-1.0, 1.0).unwrap(),
            ScalarRange::new(37.3, 276.8).unwrap(),
            ScalarRange::new(0.0, 1e-3).unwrap(),
            ScalarRange::new(-5e6, 5e6).unwrap(),
        ];

        for range in &ranges {
            let delta = range.delta();
            for i in 0..=1000 {
                let t = i as f64 / 1000.0;
                let value = range.min() + t * (range.max() - range.min() - delta);
                let decoded = decode(encode(value, range), range);
                assert!(
                    (decoded - value).abs() <= delta / 2.0 + delta * 1e-6,
                    "{} decoded as {} for {:?}",
                    value,
                    decoded,
                    range
                );
            }
        }
    }

    #[test]
    fn test_sentinel_decodes_to_nan() {
        for range in [ScalarRange::normal(), ScalarRange::new(10.0, 20.0).unwrap()] {
            assert!(range.decode(NO_VALUE).is_nan());
        }
        assert_eq!(ScalarRange::normal().encode(f64::NAN), NO_VALUE);
    }

    #[test]
    fn test_bounds_encoding() {
        let range = ScalarRange::new(0.0, 1.0).unwrap();
        assert_eq!(range.encode(0.0), [0, 0, 1]);
        assert_eq!(range.encode(1.0), [255, 255, 255]);
        assert_abs_diff_eq!(range.decode([0, 0, 1]), 0.0);
        assert_abs_diff_eq!(range.decode([255, 255, 255]), 1.0 - range.delta(), epsilon = 1e-12);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let range = ScalarRange::new(-2.0, 2.0).unwrap();
        assert_eq!(range.encode(-100.0), range.encode(-2.0));
        assert_eq!(range.encode(100.0), range.encode(2.0));
        assert_eq!(range.encode(f64::INFINITY), [255, 255, 255]);
        assert_eq!(range.encode(f64::NEG_INFINITY), [0, 0, 1]);
    }

    #[test]
    fn test_degenerate_range_rejected() {
        assert!(matches!(
            ScalarRange::new(1.0, 1.0),
            Err(ConvertError::RangeDegenerate { .. })
        ));
        assert!(ScalarRange::new(2.0, 1.0).is_err());
        assert!(ScalarRange::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_range_json_form() {
        let range: ScalarRange = serde_json::from_str("[-3.5, 7.0]").unwrap();
        assert_eq!(range, ScalarRange::new(-3.5, 7.0).unwrap());
        assert_eq!(serde_json::to_string(&range).unwrap(), "[-3.5,7.0]");
        assert!(serde_json::from_str::<ScalarRange>("[4.0, 4.0]").is_err());
    }
}
