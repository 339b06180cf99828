use crate::array_writer::write_atomic;
use crate::error::{ConvertError, ConvertResult};
use ddsfile::{AlphaMode, D3D10ResourceDimension, Dds, DxgiFormat, NewDxgiParams};
use std::path::Path;

/// Writes a square single-channel byte texture (R8_UNorm).
pub fn write_r8_texture(path: &Path, size: usize, data: &[u8]) -> ConvertResult<()> {
    if data.len() != size * size {
        return Err(ConvertError::BufferSize {
            name: "dds texture".to_string(),
            expected: size * size,
            actual: data.len(),
        });
    }

    let params = NewDxgiParams {
        height: size as u32,
        width: size as u32,
        depth: None,
        format: DxgiFormat::R8_UNorm,
        mipmap_levels: Some(1),
        array_layers: Some(1),
        caps2: None,
        is_cubemap: false,
        resource_dimension: D3D10ResourceDimension::Texture2D,
        alpha_mode: AlphaMode::Unknown,
    };

    let mut dds = Dds::new_dxgi(params)?;
    dds.data = data.to_vec();

    let mut bytes = Vec::new();
    dds.write(&mut bytes)?;
    write_atomic(path, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_r8_texture_round_trip() {
        let dir = std::env::temp_dir().join(format!("dds-writer-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("order.dds");

        let data: Vec<u8> = (0..16).collect();
        write_r8_texture(&path, 4, &data).unwrap();

        let dds = Dds::read(&mut fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(dds.get_width(), 4);
        assert_eq!(dds.get_height(), 4);
        assert_eq!(dds.get_dxgi_format(), Some(DxgiFormat::R8_UNorm));
        assert_eq!(dds.get_data(0).unwrap(), &data[..]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let path = std::env::temp_dir().join("never-written.dds");
        assert!(write_r8_texture(&path, 3, &[0; 4]).is_err());
    }
}
