/// Number of distinct codes in a 24-bit RGB triple minus the reserved sentinel
pub const SCALAR_CODE_STEPS: f64 = 16_777_215.0;

/// Largest 24-bit code
pub const MAX_SCALAR_CODE: u32 = 0xFF_FFFF;

/// Intensity written for slots without a layer (no light)
pub const NO_LIGHT_INTENSITY: u8 = 0;

/// Alpha used for layers captured without coverage information
pub const OPAQUE_ALPHA: u8 = 255;
