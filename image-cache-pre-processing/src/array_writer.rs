/// Raw array output with atomic file replacement.
use crate::constants::PARTIAL_SUFFIX;
use crate::error::ConvertResult;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes `bytes` to a `.partial` sibling and renames it over `path`.
///
/// Readers never observe a half-written file; a failed write leaves any
/// previous version in place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> ConvertResult<()> {
    let partial = partial_path(path);
    if let Err(err) = fs::write(&partial, bytes) {
        let _ = fs::remove_file(&partial);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&partial, path) {
        let _ = fs::remove_file(&partial);
        return Err(err.into());
    }
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

/// Little-endian bytes of a float array.
pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Writes the output files of one pose directory, remembering their names.
pub struct PoseWriter {
    dir: PathBuf,
    written: Vec<String>,
}

impl PoseWriter {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            written: Vec::new(),
        }
    }

    pub fn write_u8(&mut self, file_name: &str, data: &[u8]) -> ConvertResult<()> {
        write_atomic(&self.dir.join(file_name), data)?;
        self.written.push(file_name.to_string());
        Ok(())
    }

    pub fn write_f32(&mut self, file_name: &str, data: &[f32]) -> ConvertResult<()> {
        self.write_u8(file_name, &f32_bytes(data))
    }

    /// Single-channel DDS texture of a square atlas.
    pub fn write_dds_r8(&mut self, file_name: &str, size: usize, data: &[u8]) -> ConvertResult<()> {
        crate::dds_writer::write_r8_texture(&self.dir.join(file_name), size, data)?;
        self.written.push(file_name.to_string());
        Ok(())
    }

    /// File names written so far, in write order.
    pub fn written(&self) -> &[String] {
        &self.written
    }
}
