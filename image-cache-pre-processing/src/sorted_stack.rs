/// Depth pipeline: raw per-layer depth captures merged into padded sorted stacks.
use crate::array_writer::PoseWriter;
use crate::atlas::AtlasPacker;
use crate::config::PipelineConfig;
use crate::constants::{
    ALPHA_NAME, ALPHA_SUFFIX, DEPTH_NAME, DEPTH_SUFFIX, FIRST_DEPTH_FILE, INTENSITY_NAME,
    INTENSITY_SUFFIX, ORDER_NAME, RGBA_SUFFIX,
};
use crate::converter::{ConversionSummary, process_poses, relative_pose};
use crate::depth_sort::{DepthSortCompositor, LayerCapture};
use crate::error::{ConvertError, ConvertResult};
use crate::manifest::{DataEntry, DatasetManifest, ElementType, ManifestGenerator, SortedComposite};
use crate::order::StackShape;
use crate::scene::{Dataset, discover_pose_directories};
use image::{GenericImageView, imageops};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Sorts the layers of every depth-captured pose and writes the manifest.
pub struct SortedStackConverter {
    dataset: Dataset,
    shape: StackShape,
    config: PipelineConfig,
}

impl SortedStackConverter {
    /// Loads the dataset; its `config.json` must declare the capture dimensions.
    pub fn new(root: &Path, config: PipelineConfig) -> ConvertResult<Self> {
        let dataset = Dataset::load(root)?;
        let shape = dataset.shape()?;
        Ok(Self {
            dataset,
            shape,
            config,
        })
    }

    pub fn convert(&self) -> ConvertResult<ConversionSummary> {
        let root = &self.dataset.root;
        let poses = discover_pose_directories(root, FIRST_DEPTH_FILE)?;
        if poses.is_empty() {
            warn!("No pose directory with {} under {}", FIRST_DEPTH_FILE, root.display());
        }

        let atlas = AtlasPacker::for_stack(self.shape);
        info!(
            "Sorting {} poses of {} layers at {}x{} into {}x{} textures",
            poses.len(),
            self.shape.layers,
            self.shape.width,
            self.shape.height,
            atlas.texture_size(),
            atlas.texture_size()
        );

        let (converted, summary) =
            process_poses(&poses, "Sorting layers", |dir| self.process_pose(dir, &atlas));

        let with_intensity = converted.iter().filter(|(_, intensity)| *intensity).count();
        let intensity = with_intensity > 0 && with_intensity == converted.len();
        if with_intensity > 0 && !intensity {
            warn!(
                "{} of {} poses carry intensity; not declaring it in the manifest",
                with_intensity,
                converted.len()
            );
        }

        let dimensions = [self.shape.width, self.shape.height];
        let mut sorted =
            SortedComposite::new(dimensions, self.shape.layers).with_scene(&self.dataset.scene);
        sorted.texture_size = atlas.texture_size();
        sorted.texture_padding = atlas.padding();
        sorted.depth_convention = Some(self.config.depth_convention);
        if intensity {
            sorted.light.push(INTENSITY_NAME.to_string());
        }

        let manifest = DatasetManifest::new(
            &self.dataset.scene,
            sorted,
            self.data_entries(intensity),
            converted
                .iter()
                .map(|(dir, _)| relative_pose(root, dir))
                .collect(),
            self.dataset.info.clone(),
        )?;
        ManifestGenerator::new(root).write(&manifest)?;

        Ok(summary)
    }

    fn data_entries(&self, intensity: bool) -> Vec<DataEntry> {
        let mut names = vec![ORDER_NAME, ALPHA_NAME, DEPTH_NAME];
        if intensity {
            names.push(INTENSITY_NAME);
        }

        let mut entries: Vec<DataEntry> = names
            .iter()
            .map(|name| {
                let entry = DataEntry::array(name, &format!("{}.uint8", name), ElementType::Uint8);
                if *name == INTENSITY_NAME {
                    entry.with_category(INTENSITY_NAME)
                } else {
                    entry
                }
            })
            .collect();

        if self.config.export_dds {
            entries.extend(
                names
                    .iter()
                    .map(|name| DataEntry::texture(name, &format!("{}.dds", name))),
            );
        }
        entries
    }

    /// Sorts one pose, returning whether it carried intensity.
    fn process_pose(&self, dir: &Path, atlas: &AtlasPacker) -> ConvertResult<bool> {
        let layers = (0..self.shape.layers)
            .map(|layer| read_capture(dir, layer, self.shape))
            .collect::<ConvertResult<Vec<_>>>()?;

        let stack =
            DepthSortCompositor::new(self.shape, self.config.depth_convention).composite(&layers)?;

        let mut writer = PoseWriter::new(dir);
        self.write_stack(&mut writer, atlas, ORDER_NAME, stack.order.as_bytes())?;
        self.write_stack(&mut writer, atlas, ALPHA_NAME, &stack.alpha)?;
        self.write_stack(&mut writer, atlas, DEPTH_NAME, &stack.depth)?;
        if let Some(intensity) = &stack.intensity {
            self.write_stack(&mut writer, atlas, INTENSITY_NAME, intensity)?;
        }

        debug!("{}: wrote {}", dir.display(), writer.written().join(", "));
        Ok(stack.intensity.is_some())
    }

    fn write_stack(
        &self,
        writer: &mut PoseWriter,
        atlas: &AtlasPacker,
        name: &str,
        data: &[u8],
    ) -> ConvertResult<()> {
        let packed = atlas.pack(data)?;
        writer.write_u8(&format!("{}.uint8", name), &packed)?;
        if self.config.export_dds {
            writer.write_dds_r8(&format!("{}.dds", name), atlas.texture_size(), &packed)?;
        }
        Ok(())
    }
}

/// Reads the buffers of one layer. Raw alpha and intensity files take precedence
/// over the ones derived from an RGBA capture.
fn read_capture(dir: &Path, layer: usize, shape: StackShape) -> ConvertResult<LayerCapture> {
    let depth = fs::read(dir.join(format!("{}{}", layer, DEPTH_SUFFIX)))?;
    let mut alpha = read_optional(&dir.join(format!("{}{}", layer, ALPHA_SUFFIX)))?;
    let mut intensity = read_optional(&dir.join(format!("{}{}", layer, INTENSITY_SUFFIX)))?;

    let rgba_path = dir.join(format!("{}{}", layer, RGBA_SUFFIX));
    if (alpha.is_none() || intensity.is_none()) && rgba_path.exists() {
        let (rgba_alpha, rgba_intensity) = read_rgba_capture(&rgba_path, shape)?;
        alpha.get_or_insert(rgba_alpha);
        intensity.get_or_insert(rgba_intensity);
    }

    Ok(LayerCapture {
        depth,
        alpha,
        intensity,
    })
}

fn read_optional(path: &Path) -> ConvertResult<Option<Vec<u8>>> {
    if path.exists() {
        Ok(Some(fs::read(path)?))
    } else {
        Ok(None)
    }
}

/// Alpha and luma of an RGBA capture, flipped to bottom-up row order.
fn read_rgba_capture(path: &Path, shape: StackShape) -> ConvertResult<(Vec<u8>, Vec<u8>)> {
    let image = image::open(path)?;
    let (width, height) = image.dimensions();
    let (width, height) = (width as usize, height as usize);
    if width != shape.width || height != shape.height {
        return Err(ConvertError::BufferSize {
            name: path.display().to_string(),
            expected: shape.image_size(),
            actual: width * height,
        });
    }

    let rgba = imageops::flip_vertical(&image.to_rgba8());
    let luma = imageops::flip_vertical(&image.to_luma8());
    let alpha = rgba.pixels().map(|pixel| pixel[3]).collect();
    Ok((alpha, luma.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("sorted-stack-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_rgba_capture_is_flipped() {
        let dir = scratch_dir("rgba");
        let mut image = RgbaImage::new(1, 2);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 10]));
        image.put_pixel(0, 1, Rgba([0, 0, 0, 20]));
        image.save(dir.join("0_rgba.png")).unwrap();
        fs::write(dir.join("0_depth.uint8"), [1u8, 2]).unwrap();

        let capture = read_capture(&dir, 0, StackShape::new(1, 2, 1).unwrap()).unwrap();
        assert_eq!(capture.depth, vec![1, 2]);
        assert_eq!(capture.alpha, Some(vec![20, 10]));
        assert_eq!(capture.intensity, Some(vec![0, 255]));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_raw_buffers_take_precedence() {
        let dir = scratch_dir("raw");
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([9, 9, 9, 9]));
        image.put_pixel(1, 0, Rgba([9, 9, 9, 9]));
        image.save(dir.join("0_rgba.png")).unwrap();
        fs::write(dir.join("0_depth.uint8"), [5u8, 6]).unwrap();
        fs::write(dir.join("0_alpha.uint8"), [100u8, 101]).unwrap();

        let capture = read_capture(&dir, 0, StackShape::new(2, 1, 1).unwrap()).unwrap();
        assert_eq!(capture.alpha, Some(vec![100, 101]));
        assert_eq!(capture.intensity, Some(vec![9, 9]));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_depth_fails() {
        let dir = scratch_dir("missing");
        assert!(read_capture(&dir, 0, StackShape::new(1, 1, 1).unwrap()).is_err());
        fs::remove_dir_all(&dir).unwrap();
    }
}
