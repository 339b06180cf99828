/// Pipeline settings loaded from JSON and overridden from the command line.
use crate::depth_sort::DepthConvention;
use crate::error::ConvertResult;
use crate::pixel_order::RowOrder;
use crate::scene::read_json;
use crate::view_normal::NormalZChannel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conversion conventions and output options shared by both pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Row mapping from descriptor order to the stored order array.
    pub row_order: RowOrder,
    pub depth_convention: DepthConvention,
    pub normal_z_channel: NormalZChannel,
    /// Pad stack arrays to a square atlas in the sprite pipeline.
    pub pad_to_texture: bool,
    /// Also write R8 DDS copies of padded stack arrays.
    pub export_dds: bool,
    /// Run the gzip pass after conversion.
    pub compress: bool,
    /// Worker threads; the global rayon pool when unset.
    pub threads: Option<usize>,
}

impl PipelineConfig {
    pub fn load(path: &Path) -> ConvertResult<Self> {
        read_json(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_use_defaults() {
        let config: PipelineConfig = serde_json::from_str(r#"{"exportDds": true}"#).unwrap();
        assert!(config.export_dds);
        assert_eq!(config.row_order, RowOrder::FlipY);
        assert_eq!(config.depth_convention, DepthConvention::NearerSmaller);
        assert_eq!(config.normal_z_channel, NormalZChannel::XComponent);
        assert_eq!(config.threads, None);
    }

    #[test]
    fn test_named_conventions() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{
                "rowOrder": "source",
                "depthConvention": "nearer-larger",
                "normalZChannel": "z-component",
                "threads": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.row_order, RowOrder::Source);
        assert_eq!(config.depth_convention, DepthConvention::NearerLarger);
        assert_eq!(config.normal_z_channel, NormalZChannel::ZComponent);
        assert_eq!(config.threads, Some(4));
    }

    #[test]
    fn test_unknown_convention_rejected() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"rowOrder": "upside-down"}"#).is_err());
    }
}
