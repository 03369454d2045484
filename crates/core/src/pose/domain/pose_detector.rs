use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pose::domain::pose::Pose;
use crate::shared::frame::Frame;

/// Failure to analyze one frame. Never fatal to the stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("pose detection failed: {0}")]
    Detector(String),
    #[error("analyzer dropped the frame without reporting a result")]
    Abandoned,
    #[error("analyzer worker is no longer running")]
    Disconnected,
}

/// How the detector treats consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    /// Detect the most prominent person once, then track them across frames.
    #[default]
    Stream,
    /// Detect from scratch on every frame.
    SingleImage,
}

/// Domain interface for pose detection.
///
/// Implementations may be stateful (e.g., tracking across frames in
/// [`DetectorMode::Stream`]), hence `&mut self`.
pub trait PoseDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Pose, AnalysisError>;
}
