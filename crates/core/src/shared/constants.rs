/// Default capture rate of the synthetic camera.
pub const DEFAULT_FPS: u32 = 30;

/// Buffers the producer may have outstanding before `acquire` blocks.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Brightness (0-255) below which the synthetic detector reports no subject.
pub const SUBJECT_BRIGHTNESS_THRESHOLD: u8 = 64;

/// Stream mode smoothing factor for the tracked nose position.
pub const TRACKING_ALPHA: f64 = 0.5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub const CONFIG_DIR_NAME: &str = "posestream";
pub const CONFIG_FILE_NAME: &str = "config.json";
