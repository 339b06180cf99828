/// Packed capture image holding every encoded channel of a pose.
///
/// Channels are stored as consecutive runs of `image_size` RGB tuples; a channel offset
/// `k` selects tuples `k * image_size .. (k + 1) * image_size`. Tuples are kept in
/// bottom-up row order, the same order the order array uses.
use crate::error::{ConvertError, ConvertResult};
use crate::order::StackShape;
use image::RgbImage;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PackedImage {
    rgb: Vec<u8>,
    image_size: usize,
}

impl PackedImage {
    /// Wraps raw RGB bytes already in bottom-up order.
    pub fn from_raw(rgb: Vec<u8>, image_size: usize) -> ConvertResult<Self> {
        if image_size == 0 || rgb.len() % 3 != 0 || (rgb.len() / 3) % image_size != 0 {
            return Err(ConvertError::BufferSize {
                name: "packed image".to_string(),
                expected: image_size * 3,
                actual: rgb.len(),
            });
        }

        Ok(Self { rgb, image_size })
    }

    /// Builds a packed image from a decoded RGB image, flipping rows to bottom-up order.
    ///
    /// The image must be exactly as wide as the pose and a whole number of pose
    /// heights tall; anything else would misalign every channel sample.
    pub fn from_rgb_image(image: &RgbImage, shape: StackShape) -> ConvertResult<Self> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width != shape.width || shape.height == 0 || height % shape.height != 0 {
            return Err(ConvertError::InvalidDataset(format!(
                "packed image is {}x{}, expected {} wide and a multiple of {} tall",
                width, height, shape.width, shape.height
            )));
        }

        let row_bytes = width * 3;
        let raw = image.as_raw();

        let mut rgb = Vec::with_capacity(raw.len());
        if row_bytes > 0 {
            for row in raw.chunks_exact(row_bytes).rev() {
                rgb.extend_from_slice(row);
            }
        }

        Self::from_raw(rgb, shape.image_size())
    }

    /// Reads a packed capture image from disk.
    pub fn open(path: &Path, shape: StackShape) -> ConvertResult<Self> {
        let image = image::open(path)?.to_rgb8();
        Self::from_rgb_image(&image, shape)
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Number of `image_size` channel runs held by the image.
    pub fn channel_count(&self) -> usize {
        self.rgb.len() / 3 / self.image_size
    }

    /// RGB tuple of `pixel` within the channel at `offset`.
    pub fn sample(&self, pixel: usize, offset: usize) -> Option<[u8; 3]> {
        if pixel >= self.image_size {
            return None;
        }

        let base = (offset * self.image_size + pixel) * 3;
        self.rgb
            .get(base..base + 3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
    }

    /// Fails unless the channel at `offset` exists.
    pub fn require_channel(&self, offset: usize, layer: usize, channel: &str) -> ConvertResult<()> {
        if offset < self.channel_count() {
            Ok(())
        } else {
            Err(ConvertError::InvalidDataset(format!(
                "layer {} '{}' offset {} is outside the packed image ({} channels)",
                layer,
                channel,
                offset,
                self.channel_count()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_by_offset() {
        // Two channels of two pixels each.
        let rgb = vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
        let image = PackedImage::from_raw(rgb, 2).unwrap();

        assert_eq!(image.channel_count(), 2);
        assert_eq!(image.sample(0, 0), Some([1, 1, 1]));
        assert_eq!(image.sample(1, 1), Some([4, 4, 4]));
        assert_eq!(image.sample(0, 2), None);
        assert_eq!(image.sample(2, 0), None);
    }

    #[test]
    fn test_rows_are_flipped() {
        // 1 pixel wide, 2 rows: top row red, bottom row blue.
        let image = RgbImage::from_raw(1, 2, vec![255, 0, 0, 0, 0, 255]).unwrap();
        let shape = StackShape::new(1, 2, 1).unwrap();
        let packed = PackedImage::from_rgb_image(&image, shape).unwrap();

        assert_eq!(packed.sample(0, 0), Some([0, 0, 255]));
        assert_eq!(packed.sample(1, 0), Some([255, 0, 0]));
    }

    #[test]
    fn test_image_must_match_pose_width() {
        let shape = StackShape::new(2, 2, 1).unwrap();

        // Same tuple count as a 2x2 channel, wrong row length.
        let wide = RgbImage::new(4, 1);
        assert!(matches!(
            PackedImage::from_rgb_image(&wide, shape),
            Err(ConvertError::InvalidDataset(_))
        ));

        let partial_channel = RgbImage::new(2, 3);
        assert!(PackedImage::from_rgb_image(&partial_channel, shape).is_err());

        let two_channels = PackedImage::from_rgb_image(&RgbImage::new(2, 4), shape).unwrap();
        assert_eq!(two_channels.channel_count(), 2);
    }

    #[test]
    fn test_size_mismatch_rejected() {
        assert!(PackedImage::from_raw(vec![0; 9], 2).is_err());
        assert!(PackedImage::from_raw(vec![0; 8], 2).is_err());
        assert!(PackedImage::from_raw(vec![0; 6], 0).is_err());
    }
}
