use std::fmt;
use std::time::Duration;

use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("rotation must be 0, 90, 180 or 270 degrees, got {0}")]
    InvalidRotation(u32),
}

/// Hands the pixel buffer back to whoever allocated it (usually a frame pool).
pub type FrameRelease = Box<dyn FnOnce(Vec<u8>) + Send>;

/// Clockwise rotation needed to display a frame upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Result<Self, FrameError> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(FrameError::InvalidRotation(other)),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }
}

impl TryFrom<u32> for Rotation {
    type Error = FrameError;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

/// One captured image: contiguous bytes in row-major order plus capture metadata.
///
/// A frame is move-only. Its release capability runs exactly once, either
/// through [`Frame::release`] or when the frame is dropped, so a frame that
/// has been released can never reach the analyzer again.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    sequence: u64,
    timestamp: Duration,
    rotation: Rotation,
    release: Option<FrameRelease>,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, sequence: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            sequence,
            timestamp: Duration::ZERO,
            rotation: Rotation::Deg0,
            release: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_release(mut self, release: FrameRelease) -> Self {
        self.release = Some(release);
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Returns the buffer to its owner. Equivalent to dropping the frame.
    pub fn release(self) {}

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.sequence)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("timestamp", &self.timestamp)
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}
