/// Dataset manifest (`index.json`) generation for the downstream viewer.
use crate::array_writer::write_atomic;
use crate::constants::INDEX_FILE;
use crate::depth_sort::DepthConvention;
use crate::error::{ConvertError, ConvertResult};
use crate::scene::{FieldDescriptor, SceneDescriptor, read_json};
use constants::layer::layer_code;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest type tag of every converted dataset.
pub const DATA_MODEL_TYPE: &str = "tonic-query-data-model";
/// Type tag added when the dataset carries a sorted stack.
pub const SORTED_COMPOSITE_TYPE: &str = "sorted-composite";
/// Type tag added when layers can be coloured by several fields.
pub const MULTI_COLOR_TYPE: &str = "multi-color-by";

/// Storage type of one array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Uint8,
    Float32,
}

/// One per-pose array file declared to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// File name inside every pose directory.
    pub pattern: String,
    pub element_type: ElementType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<[f64; 2]>,
}

impl DataEntry {
    pub fn array(name: &str, pattern: &str, element_type: ElementType) -> Self {
        Self {
            name: name.to_string(),
            kind: "array".to_string(),
            pattern: pattern.to_string(),
            element_type,
            categories: Vec::new(),
            range: None,
        }
    }

    /// Square DDS texture; one byte per texel.
    pub fn texture(name: &str, pattern: &str) -> Self {
        Self {
            kind: "texture".to_string(),
            ..Self::array(name, pattern, ElementType::Uint8)
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.categories.push(category.to_string());
        self
    }

    pub fn with_range(mut self, range: [f64; 2]) -> Self {
        self.range = Some(range);
        self
    }
}

/// Layer entry of the composite pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineLayer {
    pub name: String,
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// Field a sorted layer can be coloured by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorBy {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
}

impl ColorBy {
    pub fn field(name: &str) -> Self {
        Self {
            kind: "field".to_string(),
            name: name.to_string(),
        }
    }
}

/// Per-layer entry of the sorted composite, in layer index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedLayer {
    pub name: String,
    #[serde(rename = "colorBy")]
    pub color_by: Vec<ColorBy>,
}

/// Layer codes, hierarchy and colour-by fields as the viewer addresses them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositePipeline {
    pub layers: Vec<String>,
    pub pipeline: Vec<PipelineLayer>,
    /// Layer code to the codes of the fields it can be coloured by.
    pub layer_fields: BTreeMap<String, Vec<String>>,
    /// Field code to field name.
    pub fields: BTreeMap<String, String>,
}

impl CompositePipeline {
    /// Assigns layer codes by index. Field codes follow the scene's layers in
    /// order, each layer's fields by name, so a field keeps the code of the
    /// first layer that lists it.
    pub fn from_scene(scene: &SceneDescriptor) -> ConvertResult<Self> {
        let mut pipeline = Self::default();
        let mut field_codes: BTreeMap<&str, String> = BTreeMap::new();

        for (index, layer) in scene.scene.iter().enumerate() {
            let layer_id = layer_code(index)
                .map(String::from)
                .ok_or(ConvertError::LayerOverflow(scene.scene.len()))?;

            let mut codes = Vec::new();
            for name in layer.colors.keys() {
                let code = match field_codes.get(name.as_str()) {
                    Some(code) => code.clone(),
                    None => {
                        let code = layer_code(field_codes.len())
                            .map(String::from)
                            .ok_or_else(|| {
                                ConvertError::InvalidDataset(format!(
                                    "more than {} distinct colour fields",
                                    field_codes.len()
                                ))
                            })?;
                        field_codes.insert(name, code.clone());
                        pipeline.fields.insert(code.clone(), name.clone());
                        code
                    }
                };
                codes.push(code);
            }

            pipeline.layers.push(layer_id.clone());
            pipeline.pipeline.push(PipelineLayer {
                name: layer.name.clone(),
                ids: vec![layer_id.clone()],
                parent: layer.parent.clone(),
            });
            pipeline.layer_fields.insert(layer_id, codes);
        }

        Ok(pipeline)
    }
}

/// Sorted-stack metadata: shape, ranges, atlas geometry and depth convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedComposite {
    pub dimensions: [usize; 2],
    pub layers: usize,
    /// Layer names and their colour-by fields.
    #[serde(default)]
    pub pipeline: Vec<SortedLayer>,
    /// Slots are stored front to back, so the viewer composites them in order.
    #[serde(default, rename = "reverseCompositePass")]
    pub reverse_composite_pass: bool,
    /// Encoding range per scalar field.
    pub ranges: BTreeMap<String, [f64; 2]>,
    /// Lighting arrays available per slot.
    #[serde(default)]
    pub light: Vec<String>,
    /// Side of the square atlas; zero when arrays are stored unpadded.
    pub texture_size: usize,
    pub texture_padding: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_convention: Option<DepthConvention>,
}

impl SortedComposite {
    pub fn new(dimensions: [usize; 2], layers: usize) -> Self {
        Self {
            dimensions,
            layers,
            pipeline: Vec::new(),
            reverse_composite_pass: false,
            ranges: BTreeMap::new(),
            light: Vec::new(),
            texture_size: 0,
            texture_padding: 0,
            depth_convention: None,
        }
    }

    /// Layer list and the ranges of every range-encoded field in the scene.
    pub fn with_scene(mut self, scene: &SceneDescriptor) -> Self {
        for layer in &scene.scene {
            self.pipeline.push(SortedLayer {
                name: layer.name.clone(),
                color_by: layer.colors.keys().map(|name| ColorBy::field(name)).collect(),
            });

            for (name, field) in &layer.colors {
                if let FieldDescriptor::Range { range } = field {
                    self.ranges
                        .entry(name.clone())
                        .or_insert([range.min(), range.max()]);
                }
            }
        }
        self
    }
}

/// Root manifest of a converted dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    #[serde(rename = "CompositePipeline")]
    pub composite_pipeline: CompositePipeline,
    #[serde(rename = "SortedComposite")]
    pub sorted_composite: SortedComposite,
    pub data: Vec<DataEntry>,
    /// Converted pose directories relative to the dataset root.
    pub poses: Vec<String>,
    /// True once the gzip pass replaced every declared file with its `.gz` form.
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl DatasetManifest {
    pub fn new(
        scene: &SceneDescriptor,
        sorted_composite: SortedComposite,
        data: Vec<DataEntry>,
        poses: Vec<String>,
        metadata: serde_json::Value,
    ) -> ConvertResult<Self> {
        let mut kind = vec![
            DATA_MODEL_TYPE.to_string(),
            SORTED_COMPOSITE_TYPE.to_string(),
        ];
        if scene.scene.iter().any(|layer| layer.colors.len() > 1) {
            kind.push(MULTI_COLOR_TYPE.to_string());
        }

        Ok(Self {
            kind,
            composite_pipeline: CompositePipeline::from_scene(scene)?,
            sorted_composite,
            data,
            poses,
            compressed: false,
            metadata,
        })
    }

    /// Looks up a declared array by name.
    pub fn entry(&self, name: &str) -> Option<&DataEntry> {
        self.data.iter().find(|entry| entry.name == name)
    }
}

/// Writes and reads the manifest at a dataset root.
pub struct ManifestGenerator {
    output_dir: PathBuf,
}

impl ManifestGenerator {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.output_dir.join(INDEX_FILE)
    }

    pub fn write(&self, manifest: &DatasetManifest) -> ConvertResult<()> {
        let manifest_path = self.path();
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        write_atomic(&manifest_path, manifest_json.as_bytes())?;

        info!("Generated manifest: {}", manifest_path.display());
        self.log_summary(manifest);
        Ok(())
    }

    pub fn load(&self) -> ConvertResult<DatasetManifest> {
        read_json(&self.path())
    }

    fn log_summary(&self, manifest: &DatasetManifest) {
        let sorted = &manifest.sorted_composite;
        info!("Manifest Summary:");
        info!(
            "  Dimensions: {}x{}, {} layers",
            sorted.dimensions[0], sorted.dimensions[1], sorted.layers
        );
        info!("  Poses: {}", manifest.poses.len());
        info!("  Arrays per pose: {}", manifest.data.len());
        if sorted.texture_size > 0 {
            info!(
                "  Atlas: {}x{} texels, {} padding",
                sorted.texture_size, sorted.texture_size, sorted.texture_padding
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> SceneDescriptor {
        serde_json::from_str(
            r#"{
                "scene": [
                    {"name": "contour", "parent": "surfaces", "colors": {
                        "pressure": {"range": [0, 10]},
                        "temperature": {"range": [-5, 5]}
                    }},
                    {"name": "slice", "colors": {
                        "solid": {"constant": 0.5},
                        "temperature": {"range": [-5, 5]}
                    }}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_pipeline_codes() {
        let pipeline = CompositePipeline::from_scene(&scene()).unwrap();

        assert_eq!(pipeline.layers, vec!["A", "B"]);
        assert_eq!(pipeline.pipeline[0].parent.as_deref(), Some("surfaces"));
        assert_eq!(pipeline.pipeline[1].parent, None);
        assert_eq!(pipeline.fields["A"], "pressure");
        assert_eq!(pipeline.fields["B"], "temperature");
        assert_eq!(pipeline.fields["C"], "solid");
        assert_eq!(pipeline.layer_fields["A"], vec!["A", "B"]);
        assert_eq!(pipeline.layer_fields["B"], vec!["C", "B"]);
    }

    #[test]
    fn test_field_codes_follow_layer_order() {
        let scene: SceneDescriptor = serde_json::from_str(
            r#"{"scene": [
                {"name": "first", "colors": {"zeta": {"constant": 1}}},
                {"name": "second", "colors": {"alpha": {"constant": 2}, "zeta": {"constant": 1}}}
            ]}"#,
        )
        .unwrap();
        let pipeline = CompositePipeline::from_scene(&scene).unwrap();

        assert_eq!(pipeline.fields["A"], "zeta");
        assert_eq!(pipeline.fields["B"], "alpha");
        assert_eq!(pipeline.layer_fields["B"], vec!["B", "A"]);
    }

    #[test]
    fn test_too_many_fields_rejected() {
        let colors: Vec<String> = (0..27)
            .map(|i| format!(r#""field_{:02}": {{"constant": {}}}"#, i, i))
            .collect();
        let scene: SceneDescriptor = serde_json::from_str(&format!(
            r#"{{"scene": [{{"name": "crowded", "colors": {{{}}}}}]}}"#,
            colors.join(", ")
        ))
        .unwrap();

        assert!(matches!(
            CompositePipeline::from_scene(&scene),
            Err(ConvertError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_scene_layers_and_ranges() {
        let sorted = SortedComposite::new([4, 2], 2).with_scene(&scene());
        assert_eq!(sorted.ranges.len(), 2);
        assert_eq!(sorted.ranges["temperature"], [-5.0, 5.0]);

        assert_eq!(sorted.pipeline.len(), 2);
        assert_eq!(sorted.pipeline[1].name, "slice");
        let names: Vec<&str> = sorted.pipeline[1]
            .color_by
            .iter()
            .map(|color| color.name.as_str())
            .collect();
        assert_eq!(names, vec!["solid", "temperature"]);
    }

    #[test]
    fn test_manifest_json_layout() {
        let manifest = DatasetManifest::new(
            &scene(),
            SortedComposite::new([4, 2], 2).with_scene(&scene()),
            vec![DataEntry::array("order", "order.uint8", ElementType::Uint8)],
            vec!["pose_0".to_string()],
            serde_json::json!({"title": "demo"}),
        )
        .unwrap();
        let json = serde_json::to_value(&manifest).unwrap();

        assert_eq!(json["type"][0], "tonic-query-data-model");
        assert_eq!(json["type"][1], "sorted-composite");
        assert_eq!(json["type"][2], "multi-color-by");
        assert_eq!(json["CompositePipeline"]["layers"][1], "B");
        assert_eq!(json["SortedComposite"]["dimensions"][0], 4);
        assert_eq!(json["SortedComposite"]["reverseCompositePass"], false);
        assert_eq!(json["SortedComposite"]["pipeline"][0]["name"], "contour");
        assert_eq!(
            json["SortedComposite"]["pipeline"][0]["colorBy"][1],
            serde_json::json!({"type": "field", "name": "temperature"})
        );
        assert_eq!(json["data"][0]["element_type"], "uint8");
        assert_eq!(json["data"][0]["type"], "array");
        assert!(json["data"][0].get("categories").is_none());
        assert_eq!(json["metadata"]["title"], "demo");
        assert_eq!(manifest.entry("order").map(|e| e.pattern.as_str()), Some("order.uint8"));
    }

    #[test]
    fn test_write_and_load() {
        let dir = std::env::temp_dir().join(format!("manifest-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut sorted = SortedComposite::new([3, 3], 1);
        sorted.depth_convention = Some(DepthConvention::NearerLarger);
        let manifest = DatasetManifest::new(
            &scene(),
            sorted,
            vec![DataEntry::array("intensity", "intensity.uint8", ElementType::Uint8)
                .with_category("intensity")],
            Vec::new(),
            serde_json::Value::Null,
        )
        .unwrap();

        let generator = ManifestGenerator::new(&dir);
        generator.write(&manifest).unwrap();
        assert_eq!(generator.load().unwrap(), manifest);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
