/// Gzip pass over the files a manifest declares, and readers that see through it.
use crate::array_writer::write_atomic;
use crate::constants::GZIP_EXTENSION;
use crate::converter::progress_bar;
use crate::error::{ConvertError, ConvertResult};
use crate::manifest::ManifestGenerator;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Files touched by one compression run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionSummary {
    pub compressed: usize,
    pub missing: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// `file.ext` to `file.ext.gz`.
pub fn gzip_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(GZIP_EXTENSION);
    path.with_file_name(name)
}

/// Compresses `path` next to itself and removes the original. Returns the byte
/// counts before and after.
pub fn gzip_file(path: &Path) -> ConvertResult<(u64, u64)> {
    let raw = fs::read(path)?;
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(&raw)?;
    let compressed = encoder.finish()?;

    write_atomic(&gzip_path(path), &compressed)?;
    fs::remove_file(path)?;
    Ok((raw.len() as u64, compressed.len() as u64))
}

/// Existing form of a declared output: the plain file, else its `.gz` sibling.
pub fn locate_output(dir: &Path, file_name: &str) -> Option<PathBuf> {
    let plain = dir.join(file_name);
    if plain.exists() {
        return Some(plain);
    }

    let gzipped = gzip_path(&plain);
    gzipped.exists().then_some(gzipped)
}

/// Reads a declared output, inflating it when only the gzip form exists.
pub fn read_output(dir: &Path, file_name: &str) -> ConvertResult<Vec<u8>> {
    let path = locate_output(dir, file_name).ok_or_else(|| {
        ConvertError::InvalidDataset(format!("{} not found in {}", file_name, dir.display()))
    })?;

    let raw = fs::read(&path)?;
    if path.extension().is_some_and(|ext| ext == GZIP_EXTENSION) {
        let mut inflated = Vec::new();
        GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated)?;
        Ok(inflated)
    } else {
        Ok(raw)
    }
}

/// Gzips every file the manifest at `root` declares for its poses, then marks the
/// manifest compressed. Already-compressed files are left alone, so the pass can
/// be rerun after an interruption.
pub fn compress_outputs(root: &Path) -> ConvertResult<CompressionSummary> {
    let generator = ManifestGenerator::new(root);
    let mut manifest = generator.load()?;

    let targets: Vec<PathBuf> = manifest
        .poses
        .iter()
        .flat_map(|pose| {
            let dir = root.join(pose);
            manifest
                .data
                .iter()
                .map(move |entry| dir.join(&entry.pattern))
        })
        .collect();
    info!("Compressing {} declared files", targets.len());

    let pb = progress_bar(targets.len(), "Compressing");
    let results: Vec<ConvertResult<Option<(u64, u64)>>> = targets
        .par_iter()
        .map(|path| {
            let result = if path.exists() {
                gzip_file(path).map(Some)
            } else {
                if !gzip_path(path).exists() {
                    warn!("Declared output {} is missing", path.display());
                }
                Ok(None)
            };
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_with_message("Compressed");

    let mut summary = CompressionSummary::default();
    for result in results {
        match result? {
            Some((bytes_in, bytes_out)) => {
                summary.compressed += 1;
                summary.bytes_in += bytes_in;
                summary.bytes_out += bytes_out;
            }
            None => summary.missing += 1,
        }
    }

    manifest.compressed = true;
    generator.write(&manifest)?;

    debug!("{:?}", summary);
    info!(
        "Compressed {} files: {} bytes to {} bytes",
        summary.compressed, summary.bytes_in, summary.bytes_out
    );
    Ok(summary)
}
