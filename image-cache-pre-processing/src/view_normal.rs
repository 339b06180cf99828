/// View-space normal reconstruction and byte encoding.
use crate::error::{ConvertError, ConvertResult};
use crate::scene::CameraPose;
use clap::ValueEnum;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Component written to the third byte of an encoded normal.
///
/// The historical producer writes `255 * x` there; `ZComponent` writes `255 * z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NormalZChannel {
    #[default]
    XComponent,
    ZComponent,
}

/// Rotation taking world-space normals into the camera's view space.
#[derive(Debug, Clone, Copy)]
pub struct ViewRotation {
    rotation: DQuat,
}

impl ViewRotation {
    /// Builds the rotation bringing the camera's view direction onto +Z.
    pub fn from_camera(camera: &CameraPose) -> ConvertResult<Self> {
        let position = DVec3::from_array(camera.position);
        let focal_point = DVec3::from_array(camera.focal_point);
        let view_dir = (position - focal_point).try_normalize().ok_or_else(|| {
            ConvertError::InvalidDataset("camera position equals its focal point".to_string())
        })?;

        Ok(Self::from_view_direction(view_dir))
    }

    /// Axis `(dir.y, -dir.x, 0)`, angle `acos(dir.z)`.
    pub fn from_view_direction(view_dir: DVec3) -> Self {
        let angle = view_dir.z.clamp(-1.0, 1.0).acos();
        // Looking straight down either Z direction leaves the axis undefined; any axis
        // in the XY plane gives the same result for angle 0 or pi.
        let axis = DVec3::new(view_dir.y, -view_dir.x, 0.0)
            .try_normalize()
            .unwrap_or(DVec3::X);

        Self {
            rotation: DQuat::from_axis_angle(axis, angle),
        }
    }

    /// Rotates a normal into view space, flipping it to face the viewer.
    pub fn to_view(&self, normal: DVec3) -> DVec3 {
        let rotated = self.rotation * normal;
        if rotated.z < 0.0 { -rotated } else { rotated }
    }
}

/// Encodes a view-space normal: `127.5 * (v + 1)` for x/y, `255 * v` for the third byte.
pub fn encode_view_normal(normal: DVec3, z_channel: NormalZChannel) -> [u8; 3] {
    let third = match z_channel {
        NormalZChannel::XComponent => normal.x,
        NormalZChannel::ZComponent => normal.z,
    };

    // Float-to-int casts truncate and saturate, matching the viewer's expectations.
    [
        (127.5 * (normal.x + 1.0)) as u8,
        (127.5 * (normal.y + 1.0)) as u8,
        (255.0 * third) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn camera(position: [f64; 3]) -> CameraPose {
        CameraPose {
            position,
            focal_point: [0.0, 0.0, 0.0],
            view_up: [0.0, 1.0, 0.0],
        }
    }

    #[test]
    fn test_view_direction_maps_to_forward() {
        for position in [
            [1.0, 2.0, 3.0],
            [-4.0, 0.5, -1.0],
            [0.0, 0.0, 5.0],
            [0.0, 0.0, -5.0],
            [3.0, 0.0, 0.0],
        ] {
            let rotation = ViewRotation::from_camera(&camera(position)).unwrap();
            let dir = DVec3::from_array(position).normalize();
            let view = rotation.to_view(dir);
            assert_relative_eq!(view.x, 0.0, epsilon = 1e-9);
            assert_relative_eq!(view.y, 0.0, epsilon = 1e-9);
            assert_relative_eq!(view.z, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_back_facing_normals_are_flipped() {
        let rotation = ViewRotation::from_camera(&camera([0.0, 0.0, 10.0])).unwrap();
        let view = rotation.to_view(DVec3::new(0.0, 0.6, -0.8));
        assert_relative_eq!(view.y, -0.6, epsilon = 1e-12);
        assert_relative_eq!(view.z, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_camera_rejected() {
        assert!(ViewRotation::from_camera(&camera([0.0, 0.0, 0.0])).is_err());
    }

    #[test]
    fn test_encoding_channels() {
        let forward = DVec3::new(0.0, 0.0, 1.0);
        assert_eq!(encode_view_normal(forward, NormalZChannel::ZComponent), [127, 127, 255]);
        assert_eq!(encode_view_normal(forward, NormalZChannel::XComponent), [127, 127, 0]);

        let tilted = DVec3::new(0.6, -0.8, 0.0);
        assert_eq!(encode_view_normal(tilted, NormalZChannel::XComponent), [204, 25, 153]);
        assert_eq!(encode_view_normal(tilted, NormalZChannel::ZComponent), [204, 25, 0]);
    }
}
