/// Format constants shared between the image cache pre-processor and its viewer.
pub mod layer;
pub mod normal;
pub mod texture;
