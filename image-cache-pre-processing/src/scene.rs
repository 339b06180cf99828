/// Scene, layer and pose descriptors produced by the capture layer.
use crate::constants::{CONFIG_FILE, INFO_FILE, OFFSET_FILE};
use crate::error::{ConvertError, ConvertResult};
use crate::order::StackShape;
use crate::scalar_codec::ScalarRange;
use constants::layer::MAX_LAYERS;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Channel name holding the per-layer light intensity.
pub const INTENSITY_CHANNEL: &str = "intensity";

/// Channel name holding the three normal components.
pub const NORMAL_CHANNEL: &str = "normal";

/// Dataset-level scene description (`config.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// One entry per layer, in layer index order.
    pub scene: Vec<LayerDescriptor>,
    /// Capture resolution, required when poses carry only raw buffers.
    #[serde(default)]
    pub dimensions: Option<[usize; 2]>,
}

/// A single captured layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub name: String,
    /// Parent group for hierarchical layer toggling in the viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Fields the layer can be coloured by.
    #[serde(default)]
    pub colors: BTreeMap<String, FieldDescriptor>,
}

/// How a field's values are provided.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDescriptor {
    /// RGB-encoded scalar field with its encoding range.
    Range { range: ScalarRange },
    /// Constant colour; nothing is captured for it.
    Constant { constant: serde_json::Value },
}

/// Per-pose pixel-order sprite (`composite.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeDescriptor {
    pub dimensions: [usize; 2],
    #[serde(rename = "pixel-order")]
    pub pixel_order: String,
}

/// Camera pose a frame was captured from (`camera.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraPose {
    pub position: [f64; 3],
    pub focal_point: [f64; 3],
    pub view_up: [f64; 3],
}

/// Location and encoding range of a scalar field inside the packed image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldChannel {
    pub offset: usize,
    pub range: ScalarRange,
}

/// Channel offsets registered for one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerChannels {
    pub intensity: Option<usize>,
    pub normal: Option<[usize; 3]>,
    pub fields: BTreeMap<String, FieldChannel>,
}

/// Everything shared by all poses of a dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub root: PathBuf,
    pub scene: SceneDescriptor,
    /// Channel layout per layer; empty when the dataset has no offset map.
    pub channels: Vec<LayerChannels>,
    /// Free-form metadata forwarded to the output manifest.
    pub info: serde_json::Value,
}

impl Dataset {
    /// Loads `config.json`, and `offset.json` / `info.json` when present.
    pub fn load(root: &Path) -> ConvertResult<Self> {
        let scene: SceneDescriptor = read_json(&root.join(CONFIG_FILE))?;
        if scene.scene.len() > MAX_LAYERS {
            return Err(ConvertError::LayerOverflow(scene.scene.len()));
        }

        let offset_path = root.join(OFFSET_FILE);
        let channels = if offset_path.exists() {
            let offsets: BTreeMap<String, usize> = read_json(&offset_path)?;
            parse_offsets(&offsets, &scene)?
        } else {
            Vec::new()
        };

        let info_path = root.join(INFO_FILE);
        let info = if info_path.exists() {
            read_json(&info_path)?
        } else {
            serde_json::Value::Object(serde_json::Map::new())
        };

        debug!(
            "Loaded dataset {} with {} layers",
            root.display(),
            scene.scene.len()
        );

        Ok(Self {
            root: root.to_path_buf(),
            scene,
            channels,
            info,
        })
    }

    pub fn layer_count(&self) -> usize {
        self.scene.scene.len()
    }

    /// Stack shape from the dataset-level dimensions.
    pub fn shape(&self) -> ConvertResult<StackShape> {
        let [width, height] = self.scene.dimensions.ok_or_else(|| {
            ConvertError::InvalidDataset(format!("{} has no 'dimensions' entry", CONFIG_FILE))
        })?;
        StackShape::new(width, height, self.layer_count())
    }

    /// True when every layer registers the given channel.
    pub fn all_layers_have(&self, channel: &str) -> bool {
        !self.channels.is_empty()
            && self.channels.iter().all(|layer| match channel {
                INTENSITY_CHANNEL => layer.intensity.is_some(),
                NORMAL_CHANNEL => layer.normal.is_some(),
                field => layer.fields.contains_key(field),
            })
    }

    /// True when at least one layer registers the given channel.
    pub fn any_layer_has(&self, channel: &str) -> bool {
        self.channels.iter().any(|layer| match channel {
            INTENSITY_CHANNEL => layer.intensity.is_some(),
            NORMAL_CHANNEL => layer.normal.is_some(),
            field => layer.fields.contains_key(field),
        })
    }

    /// Scalar fields carried by every layer, in name order.
    pub fn shared_fields(&self) -> Vec<String> {
        let Some(first) = self.channels.first() else {
            return Vec::new();
        };

        first
            .fields
            .keys()
            .filter(|field| self.all_layers_have(field))
            .cloned()
            .collect()
    }
}

/// Parses `offset.json` keys of the form `layer|channel` or `layer|normal|component`.
pub fn parse_offsets(
    offsets: &BTreeMap<String, usize>,
    scene: &SceneDescriptor,
) -> ConvertResult<Vec<LayerChannels>> {
    let layer_count = scene.scene.len();
    let mut channels = vec![LayerChannels::default(); layer_count];
    let mut normals: Vec<[Option<usize>; 3]> = vec![[None; 3]; layer_count];

    for (key, &offset) in offsets {
        let parts: Vec<&str> = key.split('|').collect();
        let layer = parts
            .first()
            .and_then(|index| index.parse::<usize>().ok())
            .filter(|&index| index < layer_count)
            .ok_or_else(|| {
                ConvertError::InvalidDataset(format!("offset key '{}' names no known layer", key))
            })?;

        match parts.as_slice() {
            [_, INTENSITY_CHANNEL] => channels[layer].intensity = Some(offset),
            [_, NORMAL_CHANNEL, component] => {
                let component = component
                    .parse::<usize>()
                    .ok()
                    .filter(|&c| c < 3)
                    .ok_or_else(|| {
                        ConvertError::InvalidDataset(format!(
                            "offset key '{}' has an invalid normal component",
                            key
                        ))
                    })?;
                normals[layer][component] = Some(offset);
            }
            [_, field] => {
                let range = match scene.scene[layer].colors.get(*field) {
                    Some(FieldDescriptor::Range { range }) => *range,
                    _ => {
                        return Err(ConvertError::InvalidDataset(format!(
                            "field '{}' of layer {} has no encoding range",
                            field, layer
                        )));
                    }
                };
                channels[layer]
                    .fields
                    .insert(field.to_string(), FieldChannel { offset, range });
            }
            _ => {
                return Err(ConvertError::InvalidDataset(format!(
                    "unrecognised offset key '{}'",
                    key
                )));
            }
        }
    }

    for (layer, components) in normals.into_iter().enumerate() {
        match components {
            [None, None, None] => {}
            [Some(x), Some(y), Some(z)] => channels[layer].normal = Some([x, y, z]),
            _ => {
                return Err(ConvertError::MissingChannel {
                    layer,
                    channel: NORMAL_CHANNEL.to_string(),
                });
            }
        }
    }

    Ok(channels)
}

/// Directories under `root` containing `marker`, sorted for a stable processing order.
pub fn discover_pose_directories(root: &Path, marker: &str) -> ConvertResult<Vec<PathBuf>> {
    let mut directories = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|err| ConvertError::Io(err.into()))?;
        if entry.file_type().is_file() && entry.file_name() == marker {
            if let Some(parent) = entry.path().parent() {
                directories.push(parent.to_path_buf());
            }
        }
    }

    directories.sort();
    directories.dedup();
    Ok(directories)
}

/// Reads and deserializes a JSON document.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> ConvertResult<T> {
    let text = fs::read_to_string(path).map_err(|err| {
        ConvertError::InvalidDataset(format!("cannot read {}: {}", path.display(), err))
    })?;
    Ok(serde_json::from_str(&text)?)
}
