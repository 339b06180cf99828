/// Value range the capture layer uses for each normal component
pub const NORMAL_RANGE: (f64, f64) = (-1.0, 1.0);

/// Encoded normal for slots without a layer (pointing at the camera)
pub const FORWARD_NORMAL: [u8; 3] = [128, 128, 255];

/// Bytes per encoded normal
pub const NORMAL_COMPONENTS: usize = 3;
