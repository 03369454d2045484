use std::f64::consts::TAU;
use std::time::Duration;

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::capture::domain::resolution::Resolution;
use crate::capture::infrastructure::frame_pool::FramePool;
use crate::shared::frame::{Frame, Rotation};

const BACKGROUND: u8 = 16;
const SUBJECT: u8 = 240;
const SUBJECT_RADIUS: i64 = 2;
/// Frames per full orbit of the subject.
const ORBIT_FRAMES: u64 = 60;
/// The subject leaves the scene for the last `ABSENT_FRAMES` of every cycle.
const CYCLE_FRAMES: u64 = 90;
const ABSENT_FRAMES: u64 = 15;
const STARVED_WAIT: Duration = Duration::from_millis(200);

/// Fake camera: a bright subject orbiting the center of a dark scene.
///
/// Buffers come from a [`FramePool`], so a consumer that forgets to release
/// frames stalls this source just like real camera hardware.
pub struct SyntheticCameraSource {
    pool: FramePool,
    fps: u32,
    rotation: Rotation,
    frame_limit: Option<u64>,
    sequence: u64,
}

impl SyntheticCameraSource {
    pub fn new(resolution: Resolution, fps: u32, rotation: Rotation, pool_size: usize) -> Self {
        let (width, height) = resolution.dimensions();
        Self {
            pool: FramePool::new(width, height, 3, pool_size),
            fps: fps.max(1),
            rotation,
            frame_limit: None,
            sequence: 0,
        }
    }

    pub fn with_frame_limit(mut self, limit: Option<u64>) -> Self {
        self.frame_limit = limit;
        self
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    fn timestamp(&self, sequence: u64) -> Duration {
        Duration::from_nanos(sequence * 1_000_000_000 / self.fps as u64)
    }

    fn acquire(&self, sequence: u64) -> Result<Frame, CaptureError> {
        let timestamp = self.timestamp(sequence);
        let mut warned = false;
        loop {
            if let Some(frame) =
                self.pool
                    .acquire_timeout(sequence, timestamp, self.rotation, STARVED_WAIT)?
            {
                return Ok(frame);
            }
            if !warned {
                log::warn!(
                    "Frame pool exhausted ({} buffers), waiting for a release",
                    self.pool.capacity()
                );
                warned = true;
            }
        }
    }
}

impl FrameSource for SyntheticCameraSource {
    fn next_frame(&mut self) -> Option<Result<Frame, CaptureError>> {
        if self.frame_limit.is_some_and(|limit| self.sequence >= limit) {
            return None;
        }
        let sequence = self.sequence;
        self.sequence += 1;

        let mut frame = match self.acquire(sequence) {
            Ok(frame) => frame,
            Err(e) => return Some(Err(e)),
        };
        render_scene(&mut frame, sequence);
        Some(Ok(frame))
    }

    fn target_fps(&self) -> u32 {
        self.fps
    }
}

fn render_scene(frame: &mut Frame, sequence: u64) {
    let width = frame.width() as i64;
    let height = frame.height() as i64;
    frame.data_mut().fill(BACKGROUND);

    if sequence % CYCLE_FRAMES >= CYCLE_FRAMES - ABSENT_FRAMES {
        return;
    }

    let angle = (sequence % ORBIT_FRAMES) as f64 / ORBIT_FRAMES as f64 * TAU;
    let radius = width.min(height) as f64 / 4.0;
    let cx = (width as f64 / 2.0 + radius * angle.cos()) as i64;
    let cy = (height as f64 / 2.0 + radius * angle.sin()) as i64;

    let data = frame.data_mut();
    for y in (cy - SUBJECT_RADIUS).max(0)..=(cy + SUBJECT_RADIUS).min(height - 1) {
        for x in (cx - SUBJECT_RADIUS).max(0)..=(cx + SUBJECT_RADIUS).min(width - 1) {
            let idx = ((y * width + x) * 3) as usize;
            data[idx..idx + 3].fill(SUBJECT);
        }
    }
}
