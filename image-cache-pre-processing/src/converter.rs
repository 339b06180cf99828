/// Sprite pipeline: pixel-order sprites plus packed capture images to per-pose arrays.
use crate::array_writer::PoseWriter;
use crate::atlas::AtlasPacker;
use crate::config::PipelineConfig;
use crate::constants::{
    CAMERA_FILE, COMPOSITE_FILE, INTENSITY_NAME, NORMAL_NAME, ORDER_NAME, PROGRESS_CHARS,
    PROGRESS_TEMPLATE, RGB_FILE, SORTED_FIELD_PREFIX,
};
use crate::error::{ConvertError, ConvertResult};
use crate::layer_attributes::LayerAttributeExtractor;
use crate::manifest::{DataEntry, DatasetManifest, ElementType, ManifestGenerator, SortedComposite};
use crate::order::{LayerIndex, StackShape};
use crate::packed_image::PackedImage;
use crate::pixel_order::PixelOrderDecoder;
use crate::scene::{
    CameraPose, CompositeDescriptor, Dataset, INTENSITY_CHANNEL, NORMAL_CHANNEL,
    discover_pose_directories, read_json,
};
use crate::view_normal::ViewRotation;
use constants::normal::NORMAL_COMPONENTS;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Pose counts of one conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub processed: usize,
    pub failed: usize,
}

impl ConversionSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Progress bar in the shared layout.
pub(crate) fn progress_bar(len: usize, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
        pb.set_style(style.progress_chars(PROGRESS_CHARS));
    }
    pb.set_message(message);
    pb
}

/// Runs `process` over every pose in parallel. Failures are logged and counted;
/// they never abort the other poses.
pub(crate) fn process_poses<T, F>(
    poses: &[PathBuf],
    message: &'static str,
    process: F,
) -> (Vec<(PathBuf, T)>, ConversionSummary)
where
    T: Send,
    F: Fn(&Path) -> ConvertResult<T> + Sync,
{
    let pb = progress_bar(poses.len(), message);

    let results: Vec<(PathBuf, ConvertResult<T>)> = poses
        .par_iter()
        .map(|dir| {
            let result = process(dir).map_err(|err| err.in_pose(dir));
            pb.inc(1);
            (dir.clone(), result)
        })
        .collect();
    pb.finish_with_message("Poses converted");

    let mut summary = ConversionSummary::default();
    let mut converted = Vec::with_capacity(results.len());
    for (dir, result) in results {
        match result {
            Ok(value) => {
                summary.processed += 1;
                converted.push((dir, value));
            }
            Err(err) => {
                summary.failed += 1;
                error!("{}", err);
            }
        }
    }

    info!(
        "Processing complete: {} poses converted, {} failed",
        summary.processed, summary.failed
    );
    (converted, summary)
}

/// Pose directory relative to the dataset root, with `/` separators.
pub(crate) fn relative_pose(root: &Path, dir: &Path) -> String {
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Arrays produced for every pose, decided once per dataset.
#[derive(Debug, Clone, Default)]
struct OutputPlan {
    intensity: bool,
    normals: bool,
    /// `(layer, field)` pairs written as unsorted per-layer images.
    layer_fields: Vec<(usize, String)>,
    /// Fields every layer carries, written in depth order.
    sorted_fields: Vec<String>,
}

impl OutputPlan {
    fn for_dataset(dataset: &Dataset) -> Self {
        let mut plan = Self::default();

        for channel in [INTENSITY_CHANNEL, NORMAL_CHANNEL] {
            let complete = dataset.all_layers_have(channel);
            if !complete && dataset.any_layer_has(channel) {
                warn!(
                    "Only some layers register '{}'; skipping sorted {} output",
                    channel, channel
                );
            }
            match channel {
                INTENSITY_CHANNEL => plan.intensity = complete,
                _ => plan.normals = complete,
            }
        }

        for (layer, channels) in dataset.channels.iter().enumerate() {
            for field in channels.fields.keys() {
                plan.layer_fields.push((layer, field.clone()));
            }
        }
        plan.sorted_fields = dataset.shared_fields();
        plan
    }

    fn needs_image(&self) -> bool {
        self.intensity || self.normals || !self.layer_fields.is_empty()
    }
}

/// Converts every sprite pose of a dataset and writes the manifest.
pub struct CompositeSpriteConverter {
    dataset: Dataset,
    config: PipelineConfig,
}

impl CompositeSpriteConverter {
    pub fn new(root: &Path, config: PipelineConfig) -> ConvertResult<Self> {
        Ok(Self {
            dataset: Dataset::load(root)?,
            config,
        })
    }

    fn padded(&self) -> bool {
        self.config.pad_to_texture || self.config.export_dds
    }

    pub fn convert(&self) -> ConvertResult<ConversionSummary> {
        let root = &self.dataset.root;
        let poses = discover_pose_directories(root, RGB_FILE)?;
        if poses.is_empty() {
            warn!("No pose directory with {} under {}", RGB_FILE, root.display());
        }

        let plan = OutputPlan::for_dataset(&self.dataset);
        info!(
            "Converting {} sprite poses with {} layers ({} per-layer fields, {} sorted fields)",
            poses.len(),
            self.dataset.layer_count(),
            plan.layer_fields.len(),
            plan.sorted_fields.len()
        );

        let (converted, summary) =
            process_poses(&poses, "Decoding sprites", |dir| self.process_pose(dir, &plan));

        let dimensions = self
            .dataset
            .scene
            .dimensions
            .or_else(|| converted.first().map(|(_, dims)| *dims))
            .unwrap_or_default();
        if converted.iter().any(|(_, dims)| *dims != dimensions) {
            warn!("Poses were captured at differing resolutions");
        }

        let pose_names = converted
            .iter()
            .map(|(dir, _)| relative_pose(root, dir))
            .collect();
        let manifest = DatasetManifest::new(
            &self.dataset.scene,
            self.sorted_composite(dimensions, &plan)?,
            self.data_entries(&plan),
            pose_names,
            self.dataset.info.clone(),
        )?;
        ManifestGenerator::new(root).write(&manifest)?;

        Ok(summary)
    }

    fn sorted_composite(
        &self,
        dimensions: [usize; 2],
        plan: &OutputPlan,
    ) -> ConvertResult<SortedComposite> {
        let shape = StackShape::new(dimensions[0], dimensions[1], self.dataset.layer_count())?;
        let mut sorted =
            SortedComposite::new(dimensions, shape.layers).with_scene(&self.dataset.scene);
        if plan.intensity {
            sorted.light.push(INTENSITY_NAME.to_string());
        }
        if self.padded() {
            let atlas = AtlasPacker::for_stack(shape);
            sorted.texture_size = atlas.texture_size();
            sorted.texture_padding = atlas.padding();
        }
        Ok(sorted)
    }

    fn data_entries(&self, plan: &OutputPlan) -> Vec<DataEntry> {
        let mut entries = vec![DataEntry::array(
            ORDER_NAME,
            &format!("{}.uint8", ORDER_NAME),
            ElementType::Uint8,
        )];
        if plan.intensity {
            entries.push(
                DataEntry::array(
                    INTENSITY_NAME,
                    &format!("{}.uint8", INTENSITY_NAME),
                    ElementType::Uint8,
                )
                .with_category(INTENSITY_NAME),
            );
        }
        if self.config.export_dds {
            entries.push(DataEntry::texture(ORDER_NAME, &format!("{}.dds", ORDER_NAME)));
            if plan.intensity {
                entries.push(DataEntry::texture(
                    INTENSITY_NAME,
                    &format!("{}.dds", INTENSITY_NAME),
                ));
            }
        }
        if plan.normals {
            entries.push(
                DataEntry::array(
                    NORMAL_NAME,
                    &format!("{}.uint8", NORMAL_NAME),
                    ElementType::Uint8,
                )
                .with_category(NORMAL_NAME),
            );
        }

        for (layer, field) in &plan.layer_fields {
            let name = format!("{}_{}", layer, field);
            let range = self.dataset.channels[*layer].fields[field].range;
            entries.push(
                DataEntry::array(&name, &format!("{}.float32", name), ElementType::Float32)
                    .with_category(field)
                    .with_range([range.min(), range.max()]),
            );
        }

        for field in &plan.sorted_fields {
            let name = format!("{}{}", SORTED_FIELD_PREFIX, field);
            let mut entry =
                DataEntry::array(&name, &format!("{}.float32", name), ElementType::Float32)
                    .with_category(field);
            if let Some(channels) = self.dataset.channels.first() {
                let range = channels.fields[field].range;
                entry = entry.with_range([range.min(), range.max()]);
            }
            entries.push(entry);
        }

        entries
    }

    /// Converts one pose directory, returning its capture dimensions.
    fn process_pose(&self, dir: &Path, plan: &OutputPlan) -> ConvertResult<[usize; 2]> {
        let composite: CompositeDescriptor = read_json(&dir.join(COMPOSITE_FILE))?;
        let [width, height] = composite.dimensions;
        if let Some(expected) = self.dataset.scene.dimensions {
            if expected != composite.dimensions {
                return Err(ConvertError::InvalidDataset(format!(
                    "pose is {}x{}, dataset declares {}x{}",
                    width, height, expected[0], expected[1]
                )));
            }
        }

        let shape = StackShape::new(width, height, self.dataset.layer_count())?;
        let order = PixelOrderDecoder::new(shape, self.config.row_order)
            .decode(&composite.pixel_order)?;
        let atlas = self.padded().then(|| AtlasPacker::for_stack(shape));
        let mut writer = PoseWriter::new(dir);

        self.write_stack(&mut writer, atlas.as_ref(), ORDER_NAME, order.as_bytes())?;

        if plan.needs_image() {
            let image = PackedImage::open(&dir.join(RGB_FILE), shape)?;
            let extractor = LayerAttributeExtractor::new(&image, &order, &self.dataset.channels)?;

            if plan.intensity {
                let intensity = extractor.sorted_intensity()?;
                self.write_stack(&mut writer, atlas.as_ref(), INTENSITY_NAME, &intensity)?;
            }

            if plan.normals {
                let camera: CameraPose = read_json(&dir.join(CAMERA_FILE))?;
                let rotation = ViewRotation::from_camera(&camera)?;
                let normals = extractor.sorted_normals(&rotation, self.config.normal_z_channel)?;
                let normals = match &atlas {
                    Some(atlas) => atlas.pack_components(&normals, NORMAL_COMPONENTS)?,
                    None => normals,
                };
                writer.write_u8(&format!("{}.uint8", NORMAL_NAME), &normals)?;
            }

            for (layer, field) in &plan.layer_fields {
                let values = extractor.layer_scalar(LayerIndex::new(*layer)?, field)?;
                writer.write_f32(&format!("{}_{}.float32", layer, field), &values)?;
            }

            for field in &plan.sorted_fields {
                let values = extractor.sorted_scalar(field)?;
                let values = match &atlas {
                    Some(atlas) => atlas.pack(&values)?,
                    None => values,
                };
                writer.write_f32(&format!("{}{}.float32", SORTED_FIELD_PREFIX, field), &values)?;
            }
        }

        debug!("{}: wrote {}", dir.display(), writer.written().join(", "));
        Ok(composite.dimensions)
    }

    /// Writes one byte per slot, padded and mirrored to DDS when configured.
    fn write_stack(
        &self,
        writer: &mut PoseWriter,
        atlas: Option<&AtlasPacker>,
        name: &str,
        data: &[u8],
    ) -> ConvertResult<()> {
        match atlas {
            Some(atlas) => {
                let packed = atlas.pack(data)?;
                writer.write_u8(&format!("{}.uint8", name), &packed)?;
                if self.config.export_dds {
                    writer.write_dds_r8(&format!("{}.dds", name), atlas.texture_size(), &packed)?;
                }
            }
            None => writer.write_u8(&format!("{}.uint8", name), data)?,
        }
        Ok(())
    }
}
