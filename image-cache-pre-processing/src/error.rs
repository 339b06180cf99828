//! Error types for image cache conversion

use constants::layer::MAX_LAYERS;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for conversion operations
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors that can occur while converting a captured dataset
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Malformed pixel-order descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("Layer {layer} has no '{channel}' channel registered")]
    MissingChannel { layer: usize, channel: String },

    #[error("Degenerate scalar range [{min}, {max}]")]
    RangeDegenerate { min: f64, max: f64 },

    #[error("{0} layers requested, at most {} are supported", MAX_LAYERS)]
    LayerOverflow(usize),

    #[error("Buffer size mismatch for {name}: expected {expected}, got {actual}")]
    BufferSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Failed to process {}: {source}", path.display())]
    Pose {
        path: PathBuf,
        #[source]
        source: Box<ConvertError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("DDS error: {0}")]
    Dds(#[from] ddsfile::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl ConvertError {
    /// Attach the pose directory a failure happened in.
    pub fn in_pose(self, path: impl Into<PathBuf>) -> Self {
        ConvertError::Pose {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
