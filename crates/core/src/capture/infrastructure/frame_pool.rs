use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::capture::domain::frame_source::CaptureError;
use crate::shared::frame::{Frame, FrameRelease, Rotation};

/// Fixed set of reusable pixel buffers, the way a camera HAL hands them out.
///
/// Every frame carries a release capability that returns its buffer here.
/// If frames are never released the pool runs dry and [`FramePool::acquire`]
/// blocks, stalling the producer.
pub struct FramePool {
    width: u32,
    height: u32,
    channels: u8,
    capacity: usize,
    free_tx: Sender<Vec<u8>>,
    free_rx: Receiver<Vec<u8>>,
}

impl FramePool {
    pub fn new(width: u32, height: u32, channels: u8, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (free_tx, free_rx) = crossbeam_channel::bounded(capacity);
        let len = width as usize * height as usize * channels as usize;
        for _ in 0..capacity {
            // Cannot fail: the channel was sized for exactly `capacity` buffers.
            let _ = free_tx.send(vec![0u8; len]);
        }
        Self {
            width,
            height,
            channels,
            capacity,
            free_tx,
            free_rx,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers currently free.
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }

    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }

    /// Blocks until a buffer is free.
    pub fn acquire(
        &self,
        sequence: u64,
        timestamp: Duration,
        rotation: Rotation,
    ) -> Result<Frame, CaptureError> {
        let buf = self.free_rx.recv().map_err(|_| CaptureError::PoolClosed)?;
        Ok(self.wrap(buf, sequence, timestamp, rotation))
    }

    /// Waits up to `timeout` for a buffer; `Ok(None)` on timeout.
    pub fn acquire_timeout(
        &self,
        sequence: u64,
        timestamp: Duration,
        rotation: Rotation,
        timeout: Duration,
    ) -> Result<Option<Frame>, CaptureError> {
        match self.free_rx.recv_timeout(timeout) {
            Ok(buf) => Ok(Some(self.wrap(buf, sequence, timestamp, rotation))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CaptureError::PoolClosed),
        }
    }

    pub fn try_acquire(&self, sequence: u64, timestamp: Duration, rotation: Rotation) -> Option<Frame> {
        self.free_rx
            .try_recv()
            .ok()
            .map(|buf| self.wrap(buf, sequence, timestamp, rotation))
    }

    fn wrap(&self, mut buf: Vec<u8>, sequence: u64, timestamp: Duration, rotation: Rotation) -> Frame {
        buf.resize(self.frame_len(), 0);
        let free_tx = self.free_tx.clone();
        let release: FrameRelease = Box::new(move |buf| {
            let _ = free_tx.try_send(buf);
        });
        Frame::new(buf, self.width, self.height, self.channels, sequence)
            .with_timestamp(timestamp)
            .with_rotation(rotation)
            .with_release(release)
    }
}
