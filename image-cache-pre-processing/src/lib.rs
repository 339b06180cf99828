//! Post-capture codec and compositing-order engine for explorable image caches.
//!
//! Captured layers of every camera pose are decoded from RGB-encoded scalar images and
//! pixel-order sprites, or sorted by depth, into flat layer-major arrays the viewer
//! recomposes without re-rendering.

pub mod array_writer;
pub mod atlas;
pub mod compress;
pub mod config;
pub mod constants;
pub mod converter;
pub mod dds_writer;
pub mod depth_sort;
pub mod error;
pub mod layer_attributes;
pub mod manifest;
pub mod order;
pub mod packed_image;
pub mod pixel_order;
pub mod scalar_codec;
pub mod scene;
pub mod sorted_stack;
pub mod view_normal;

pub use config::PipelineConfig;
pub use converter::{CompositeSpriteConverter, ConversionSummary};
pub use error::{ConvertError, ConvertResult};
pub use sorted_stack::SortedStackConverter;
