/// File layout of captured datasets and converted outputs

/// Dataset scene description
pub const CONFIG_FILE: &str = "config.json";

/// Channel offsets into the packed capture image
pub const OFFSET_FILE: &str = "offset.json";

/// Free-form dataset metadata forwarded to the output manifest
pub const INFO_FILE: &str = "info.json";

/// Output manifest written at the dataset root
pub const INDEX_FILE: &str = "index.json";

/// Packed capture image of a pose (sprite pipeline marker)
pub const RGB_FILE: &str = "rgb.png";

/// Pixel-order sprite of a pose
pub const COMPOSITE_FILE: &str = "composite.json";

/// Camera pose record
pub const CAMERA_FILE: &str = "camera.json";

/// Depth buffer of the first layer (depth pipeline marker)
pub const FIRST_DEPTH_FILE: &str = "0_depth.uint8";

/// Per-layer capture suffixes for the depth pipeline
pub const DEPTH_SUFFIX: &str = "_depth.uint8";
pub const ALPHA_SUFFIX: &str = "_alpha.uint8";
pub const INTENSITY_SUFFIX: &str = "_intensity.uint8";
pub const RGBA_SUFFIX: &str = "_rgba.png";

/// Output array names
pub const ORDER_NAME: &str = "order";
pub const ALPHA_NAME: &str = "alpha";
pub const INTENSITY_NAME: &str = "intensity";
pub const NORMAL_NAME: &str = "normal";
pub const DEPTH_NAME: &str = "depth";
pub const SORTED_FIELD_PREFIX: &str = "sorted_";

/// Extension appended by the compression pass
pub const GZIP_EXTENSION: &str = "gz";

/// Suffix of in-flight output files before their atomic rename
pub const PARTIAL_SUFFIX: &str = "partial";

/// Progress bar layout for pose and file loops
pub const PROGRESS_TEMPLATE: &str = "[{bar:40.green/blue}] {pos}/{len} ({percent}%) {msg}";
pub const PROGRESS_CHARS: &str = "▉▊▋▌▍▎▏ ";
