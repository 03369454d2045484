use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::domain::resolution::Resolution;
use crate::pose::domain::pose::LandmarkKind;
use crate::pose::domain::pose_detector::DetectorMode;
use crate::shared::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_FPS, DEFAULT_POOL_SIZE};
use crate::shared::frame::Rotation;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Invalid(&'static str),
}

/// Capture and analysis settings, persisted as JSON.
///
/// Unknown fields are rejected; missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    pub resolution: Resolution,
    pub fps: u32,
    pub rotation: Rotation,
    pub pool_size: usize,
    pub detector_mode: DetectorMode,
    /// Simulated per-frame model latency in milliseconds.
    pub analysis_latency_ms: u64,
    /// Landmark whose confidence is shown as status text.
    pub landmark: LandmarkKind,
    /// Stop after this many captured frames; `None` runs until interrupted.
    pub frame_limit: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::Vga,
            fps: DEFAULT_FPS,
            rotation: Rotation::Deg0,
            pool_size: DEFAULT_POOL_SIZE,
            detector_mode: DetectorMode::Stream,
            analysis_latency_ms: 0,
            landmark: LandmarkKind::Nose,
            frame_limit: None,
        }
    }
}

impl StreamConfig {
    /// `<config dir>/posestream/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be greater than 0"));
        }
        if self.pool_size == 0 {
            return Err(ConfigError::Invalid("pool_size must be greater than 0"));
        }
        let (w, h) = self.resolution.dimensions();
        if w == 0 || h == 0 {
            return Err(ConfigError::Invalid("resolution must be non-zero"));
        }
        Ok(())
    }
}
