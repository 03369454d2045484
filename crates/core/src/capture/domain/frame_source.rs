use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to read capture directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no images found in {0}")]
    NoImages(PathBuf),
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("frame pool closed")]
    PoolClosed,
}

/// Domain interface for anything that produces camera frames.
///
/// Frames come out in strictly increasing timestamp order. `None` means the
/// stream has ended.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Result<Frame, CaptureError>>;

    /// Frames per second the source tries to deliver at.
    fn target_fps(&self) -> u32;
}
