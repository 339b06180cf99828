/// Per-layer attribute extraction re-indexed into depth order.
use crate::error::{ConvertError, ConvertResult};
use crate::order::{LayerIndex, OrderArray};
use crate::packed_image::PackedImage;
use crate::scalar_codec::{NO_VALUE, ScalarRange};
use crate::scene::{FieldChannel, INTENSITY_CHANNEL, LayerChannels, NORMAL_CHANNEL};
use crate::view_normal::{NormalZChannel, ViewRotation, encode_view_normal};
use constants::normal::{FORWARD_NORMAL, NORMAL_COMPONENTS};
use constants::texture::NO_LIGHT_INTENSITY;
use glam::DVec3;
use rayon::prelude::*;

/// Pulls layer attributes out of a packed capture image following an order array.
///
/// Every accessor resolves and validates the channel offsets of all layers before
/// touching a pixel, so missing channels fail the frame up front.
pub struct LayerAttributeExtractor<'a> {
    image: &'a PackedImage,
    order: &'a OrderArray,
    channels: &'a [LayerChannels],
}

impl<'a> LayerAttributeExtractor<'a> {
    pub fn new(
        image: &'a PackedImage,
        order: &'a OrderArray,
        channels: &'a [LayerChannels],
    ) -> ConvertResult<Self> {
        let shape = order.shape();
        if channels.len() != shape.layers {
            return Err(ConvertError::InvalidDataset(format!(
                "{} channel layouts for {} layers",
                channels.len(),
                shape.layers
            )));
        }

        if image.image_size() != shape.image_size() {
            return Err(ConvertError::BufferSize {
                name: "packed image".to_string(),
                expected: shape.image_size(),
                actual: image.image_size(),
            });
        }

        Ok(Self {
            image,
            order,
            channels,
        })
    }

    /// Decoded values of one layer's field, one per pixel, NaN where nothing was drawn.
    pub fn layer_scalar(&self, layer: LayerIndex, field: &str) -> ConvertResult<Vec<f32>> {
        let channel = self.field_channel(layer.get(), field)?;
        let image_size = self.image.image_size();

        Ok((0..image_size)
            .into_par_iter()
            .map(|pixel| self.decode_sample(pixel, &channel))
            .collect())
    }

    /// Field values per depth slot; empty slots hold NaN.
    pub fn sorted_scalar(&self, field: &str) -> ConvertResult<Vec<f32>> {
        let channels = (0..self.channels.len())
            .map(|layer| self.field_channel(layer, field))
            .collect::<ConvertResult<Vec<_>>>()?;
        let image_size = self.image.image_size();

        Ok((0..self.order.shape().stack_size())
            .into_par_iter()
            .map(|idx| match self.order.layer_at(idx) {
                None => f32::NAN,
                Some(layer) => self.decode_sample(idx % image_size, &channels[layer.get()]),
            })
            .collect())
    }

    /// Intensity per depth slot, read from the red byte of the intensity channel.
    pub fn sorted_intensity(&self) -> ConvertResult<Vec<u8>> {
        let offsets = (0..self.channels.len())
            .map(|layer| {
                let offset = self.channels[layer].intensity.ok_or_else(|| {
                    ConvertError::MissingChannel {
                        layer,
                        channel: INTENSITY_CHANNEL.to_string(),
                    }
                })?;
                self.image
                    .require_channel(offset, layer, INTENSITY_CHANNEL)
                    .map(|_| offset)
            })
            .collect::<ConvertResult<Vec<_>>>()?;
        let image_size = self.image.image_size();

        Ok((0..self.order.shape().stack_size())
            .into_par_iter()
            .map(|idx| match self.order.layer_at(idx) {
                None => NO_LIGHT_INTENSITY,
                Some(layer) => self
                    .image
                    .sample(idx % image_size, offsets[layer.get()])
                    .map_or(NO_LIGHT_INTENSITY, |rgb| rgb[0]),
            })
            .collect())
    }

    /// View-space normals per depth slot, three bytes each.
    pub fn sorted_normals(
        &self,
        rotation: &ViewRotation,
        z_channel: NormalZChannel,
    ) -> ConvertResult<Vec<u8>> {
        let offsets = (0..self.channels.len())
            .map(|layer| {
                let offsets = self.channels[layer].normal.ok_or_else(|| {
                    ConvertError::MissingChannel {
                        layer,
                        channel: NORMAL_CHANNEL.to_string(),
                    }
                })?;
                for offset in offsets {
                    self.image.require_channel(offset, layer, NORMAL_CHANNEL)?;
                }
                Ok(offsets)
            })
            .collect::<ConvertResult<Vec<_>>>()?;
        let image_size = self.image.image_size();
        let range = ScalarRange::normal();

        let mut normals = vec![0u8; self.order.shape().stack_size() * NORMAL_COMPONENTS];
        normals
            .par_chunks_mut(NORMAL_COMPONENTS)
            .enumerate()
            .for_each(|(idx, texel)| {
                let encoded = match self.order.layer_at(idx) {
                    None => FORWARD_NORMAL,
                    Some(layer) => {
                        let pixel = idx % image_size;
                        let [x, y, z] = offsets[layer.get()].map(|offset| {
                            range.decode(self.image.sample(pixel, offset).unwrap_or(NO_VALUE))
                        });
                        let normal = DVec3::new(x, y, z);
                        if normal.is_nan() {
                            FORWARD_NORMAL
                        } else {
                            encode_view_normal(rotation.to_view(normal), z_channel)
                        }
                    }
                };
                texel.copy_from_slice(&encoded);
            });

        Ok(normals)
    }

    fn field_channel(&self, layer: usize, field: &str) -> ConvertResult<FieldChannel> {
        let channel = self.channels[layer]
            .fields
            .get(field)
            .copied()
            .ok_or_else(|| ConvertError::MissingChannel {
                layer,
                channel: field.to_string(),
            })?;
        self.image.require_channel(channel.offset, layer, field)?;
        Ok(channel)
    }

    fn decode_sample(&self, pixel: usize, channel: &FieldChannel) -> f32 {
        let rgb = self.image.sample(pixel, channel.offset).unwrap_or(NO_VALUE);
        channel.range.decode(rgb) as f32
    }
}
