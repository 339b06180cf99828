/// Depth-based per-pixel layer sorting for stacks of volumetric slabs.
use crate::error::{ConvertError, ConvertResult};
use crate::order::{OrderArray, StackShape};
use clap::ValueEnum;
use constants::layer::MAX_LAYERS;
use constants::texture::OPAQUE_ALPHA;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Meaning of a captured depth byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DepthConvention {
    /// Smaller values are closer to the camera.
    #[default]
    NearerSmaller,
    /// Larger values are closer; equivalent to sorting on `255 - raw`.
    NearerLarger,
}

impl DepthConvention {
    /// Sort key where smaller always means nearer.
    pub fn key(self, raw: u8) -> u8 {
        match self {
            DepthConvention::NearerSmaller => raw,
            DepthConvention::NearerLarger => 255 - raw,
        }
    }
}

/// Buffers captured for one layer at one camera pose.
#[derive(Debug, Clone, Default)]
pub struct LayerCapture {
    pub depth: Vec<u8>,
    /// Coverage; treated as fully opaque when absent.
    pub alpha: Option<Vec<u8>>,
    pub intensity: Option<Vec<u8>>,
}

/// One pose's layers merged into depth order, layer-major like the order array.
#[derive(Debug, Clone)]
pub struct SortedStack {
    pub order: OrderArray,
    pub depth: Vec<u8>,
    pub alpha: Vec<u8>,
    /// Present when every layer supplied an intensity buffer.
    pub intensity: Option<Vec<u8>>,
}

/// Sorts every pixel's layers by depth for a fixed camera pose.
#[derive(Debug, Clone, Copy)]
pub struct DepthSortCompositor {
    shape: StackShape,
    convention: DepthConvention,
}

impl DepthSortCompositor {
    pub fn new(shape: StackShape, convention: DepthConvention) -> Self {
        Self { shape, convention }
    }

    /// Front-to-back layer permutation of every pixel.
    ///
    /// Ties resolve to the lower layer index, so identical input always yields
    /// identical output.
    pub fn sort_order(&self, depths: &[&[u8]]) -> ConvertResult<OrderArray> {
        self.check_buffers("depth", depths.iter().map(|d| d.len()))?;
        let permutations = self.permutations(depths);

        let mut slots = vec![0u8; self.shape.stack_size()];
        self.scatter(&permutations, &mut slots, |layer, _| layer as u8);
        OrderArray::from_raw(self.shape, slots)
    }

    /// Merges all layers into one sorted stack.
    pub fn composite(&self, layers: &[LayerCapture]) -> ConvertResult<SortedStack> {
        self.check_buffers("depth", layers.iter().map(|l| l.depth.len()))?;
        for (index, layer) in layers.iter().enumerate() {
            for (name, buffer) in [("alpha", &layer.alpha), ("intensity", &layer.intensity)] {
                if let Some(buffer) = buffer {
                    let label = format!("layer {} {}", index, name);
                    check_size(&label, self.shape.image_size(), buffer.len())?;
                }
            }
        }

        let with_intensity = layers.iter().filter(|l| l.intensity.is_some()).count();
        if with_intensity != 0 && with_intensity != layers.len() {
            let layer = layers
                .iter()
                .position(|l| l.intensity.is_none())
                .unwrap_or_default();
            return Err(ConvertError::MissingChannel {
                layer,
                channel: "intensity".to_string(),
            });
        }

        let depths: Vec<&[u8]> = layers.iter().map(|l| l.depth.as_slice()).collect();
        let permutations = self.permutations(&depths);
        let stack_size = self.shape.stack_size();

        let mut order = vec![0u8; stack_size];
        self.scatter(&permutations, &mut order, |layer, _| layer as u8);

        let mut depth = vec![0u8; stack_size];
        self.scatter(&permutations, &mut depth, |layer, pixel| {
            layers[layer].depth[pixel]
        });

        let mut alpha = vec![0u8; stack_size];
        self.scatter(&permutations, &mut alpha, |layer, pixel| {
            layers[layer]
                .alpha
                .as_ref()
                .map_or(OPAQUE_ALPHA, |alpha| alpha[pixel])
        });

        let intensity = if with_intensity == layers.len() && !layers.is_empty() {
            let mut intensity = vec![0u8; stack_size];
            self.scatter(&permutations, &mut intensity, |layer, pixel| {
                layers[layer]
                    .intensity
                    .as_ref()
                    .map_or(0, |intensity| intensity[pixel])
            });
            Some(intensity)
        } else {
            None
        };

        Ok(SortedStack {
            order: OrderArray::from_raw(self.shape, order)?,
            depth,
            alpha,
            intensity,
        })
    }

    fn check_buffers(
        &self,
        name: &str,
        lengths: impl ExactSizeIterator<Item = usize>,
    ) -> ConvertResult<()> {
        if lengths.len() != self.shape.layers {
            return Err(ConvertError::InvalidDataset(format!(
                "{} {} buffers for {} layers",
                lengths.len(),
                name,
                self.shape.layers
            )));
        }

        for (index, length) in lengths.enumerate() {
            check_size(&format!("layer {} {}", index, name), self.shape.image_size(), length)?;
        }
        Ok(())
    }

    fn permutations(&self, depths: &[&[u8]]) -> Vec<[u8; MAX_LAYERS]> {
        let layers = self.shape.layers;
        let convention = self.convention;

        (0..self.shape.image_size())
            .into_par_iter()
            .map(|pixel| {
                let mut permutation = [0u8; MAX_LAYERS];
                for (slot, layer) in permutation.iter_mut().take(layers).enumerate() {
                    *layer = slot as u8;
                }
                permutation[..layers]
                    .sort_by_key(|&layer| (convention.key(depths[layer as usize][pixel]), layer));
                permutation
            })
            .collect()
    }

    /// Writes `value(layer, pixel)` for each sorted slot into a layer-major buffer.
    fn scatter<F>(&self, permutations: &[[u8; MAX_LAYERS]], target: &mut [u8], value: F)
    where
        F: Fn(usize, usize) -> u8 + Sync,
    {
        let image_size = self.shape.image_size();
        if image_size == 0 {
            return;
        }

        target
            .par_chunks_mut(image_size)
            .enumerate()
            .for_each(|(slot, plane)| {
                for (pixel, cell) in plane.iter_mut().enumerate() {
                    *cell = value(permutations[pixel][slot] as usize, pixel);
                }
            });
    }
}

fn check_size(name: &str, expected: usize, actual: usize) -> ConvertResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConvertError::BufferSize {
            name: name.to_string(),
            expected,
            actual,
        })
    }
}
