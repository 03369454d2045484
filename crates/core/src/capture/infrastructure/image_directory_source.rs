use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::FilterType;
use image::RgbImage;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::capture::infrastructure::frame_pool::FramePool;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::{Frame, Rotation};

/// Plays back the images in a directory as a camera stream.
///
/// Files are ordered by name. Every frame is scaled to the size of the first
/// image so buffers can be pooled.
pub struct ImageDirectorySource {
    paths: Vec<PathBuf>,
    pool: FramePool,
    fps: u32,
    rotation: Rotation,
    looping: bool,
    frame_limit: Option<u64>,
    cursor: usize,
    sequence: u64,
}

impl ImageDirectorySource {
    pub fn open(
        dir: &Path,
        fps: u32,
        rotation: Rotation,
        pool_size: usize,
    ) -> Result<Self, CaptureError> {
        let paths = list_images(dir)?;
        let first = decode(&paths[0])?;
        let pool = FramePool::new(first.width(), first.height(), 3, pool_size);
        log::info!(
            "Playing {} images from {} at {}x{}",
            paths.len(),
            dir.display(),
            first.width(),
            first.height()
        );
        Ok(Self {
            paths,
            pool,
            fps: fps.max(1),
            rotation,
            looping: false,
            frame_limit: None,
            cursor: 0,
            sequence: 0,
        })
    }

    /// Restart from the first image instead of ending the stream.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// End the stream after `limit` frames, even when looping.
    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn load(&self, path: &Path) -> Result<Frame, CaptureError> {
        let mut img = decode(path)?;
        let mut frame = self.pool.acquire(
            self.sequence,
            Duration::from_nanos(self.sequence * 1_000_000_000 / self.fps as u64),
            self.rotation,
        )?;
        if img.width() != frame.width() || img.height() != frame.height() {
            img = image::imageops::resize(&img, frame.width(), frame.height(), FilterType::Triangle);
        }
        frame.data_mut().copy_from_slice(img.as_raw());
        Ok(frame)
    }
}

impl FrameSource for ImageDirectorySource {
    fn next_frame(&mut self) -> Option<Result<Frame, CaptureError>> {
        if self.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            return None;
        }
        if self.cursor >= self.paths.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let path = self.paths[self.cursor].clone();
        self.cursor += 1;
        let result = self.load(&path);
        self.sequence += 1;
        Some(result)
    }

    fn target_fps(&self) -> u32 {
        self.fps
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CaptureError> {
    let entries = std::fs::read_dir(dir).map_err(|source| CaptureError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image(p))
        .collect();
    if paths.is_empty() {
        return Err(CaptureError::NoImages(dir.to_path_buf()));
    }
    paths.sort();
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn decode(path: &Path) -> Result<RgbImage, CaptureError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|source| CaptureError::Decode {
            path: path.to_path_buf(),
            source,
        })
}
