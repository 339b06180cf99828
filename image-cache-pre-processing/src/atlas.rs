/// Square texture atlas packing for flattened per-slot arrays.
use crate::error::{ConvertError, ConvertResult};
use crate::order::StackShape;
use serde::{Deserialize, Serialize};

/// Geometry of a square atlas holding `value_count` texels.
///
/// The side is the smallest integer whose square covers every value; the
/// remaining texels are padding appended after the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasPacker {
    value_count: usize,
    texture_size: usize,
    padding: usize,
}

impl AtlasPacker {
    pub fn for_values(value_count: usize) -> Self {
        let texture_size = ceil_sqrt(value_count);
        Self {
            value_count,
            texture_size,
            padding: texture_size * texture_size - value_count,
        }
    }

    /// Atlas sized for one texel per depth slot of a stack.
    pub fn for_stack(shape: StackShape) -> Self {
        Self::for_values(shape.stack_size())
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Side length in texels.
    pub fn texture_size(&self) -> usize {
        self.texture_size
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn texel_count(&self) -> usize {
        self.texture_size * self.texture_size
    }

    /// Copies one value per texel and pads the tail with `T::default()`.
    pub fn pack<T: Copy + Default>(&self, values: &[T]) -> ConvertResult<Vec<T>> {
        self.pack_components(values, 1)
    }

    /// Packs values made of `components` consecutive elements each, e.g. 3-byte normals.
    pub fn pack_components<T: Copy + Default>(
        &self,
        values: &[T],
        components: usize,
    ) -> ConvertResult<Vec<T>> {
        let expected = self.value_count * components;
        if values.len() != expected {
            return Err(ConvertError::BufferSize {
                name: "atlas input".to_string(),
                expected,
                actual: values.len(),
            });
        }

        let mut packed = Vec::with_capacity(self.texel_count() * components);
        packed.extend_from_slice(values);
        packed.resize(self.texel_count() * components, T::default());
        Ok(packed)
    }
}

/// Smallest `s` with `s * s >= n`.
fn ceil_sqrt(n: usize) -> usize {
    if n == 0 {
        return 0;
    }

    // Float estimate, then corrected for rounding on large inputs.
    let mut side = (n as f64).sqrt() as usize;
    while side * side < n {
        side += 1;
    }
    while side > 0 && (side - 1) * (side - 1) >= n {
        side -= 1;
    }
    side
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_geometry() {
        let atlas = AtlasPacker::for_stack(StackShape::new(10, 10, 3).unwrap());
        assert_eq!(atlas.value_count(), 300);
        assert_eq!(atlas.texture_size(), 18);
        assert_eq!(atlas.padding(), 24);
    }

    #[test]
    fn test_ceil_sqrt() {
        assert_eq!(ceil_sqrt(0), 0);
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(2), 2);
        assert_eq!(ceil_sqrt(16), 4);
        assert_eq!(ceil_sqrt(17), 5);
        let big = 94_906_267usize;
        assert_eq!(ceil_sqrt(big * big), big);
        assert_eq!(ceil_sqrt(big * big + 1), big + 1);
    }

    #[test]
    fn test_packed_length_is_square() {
        for count in [1usize, 5, 9, 300, 1000] {
            let atlas = AtlasPacker::for_values(count);
            let packed = atlas.pack(&vec![7u8; count]).unwrap();
            assert_eq!(packed.len(), atlas.texel_count());
            assert!(packed[count..].iter().all(|&v| v == 0));
            assert!(packed[..count].iter().all(|&v| v == 7));
        }
    }

    #[test]
    fn test_pack_components() {
        let atlas = AtlasPacker::for_values(3);
        let packed = atlas.pack_components(&[1u8, 2, 3, 4, 5, 6, 7, 8, 9], 3).unwrap();
        assert_eq!(packed.len(), 12);
        assert_eq!(&packed[9..], &[0, 0, 0]);

        let floats = AtlasPacker::for_values(2).pack(&[0.5f32, 1.5]).unwrap();
        assert_eq!(floats, vec![0.5, 1.5, 0.0, 0.0]);
    }

    #[test]
    fn test_pack_rejects_wrong_length() {
        let atlas = AtlasPacker::for_values(4);
        assert!(atlas.pack(&[1u8, 2, 3]).is_err());
    }
}
