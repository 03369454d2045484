//! Keep-only-latest delivery with single-flight analysis.
//!
//! At most one frame is in flight and at most one is pending. A frame that
//! arrives while busy replaces the pending one, and the replaced frame goes
//! back to the caller to be released unanalyzed. This keeps memory at O(1)
//! frames and latency at one analysis cycle, at the cost of skipping frames
//! under sustained overload.

use crate::shared::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing in flight; the next submission is dispatched immediately.
    Idle,
    /// One frame is being analyzed.
    Busy,
}

#[derive(Debug)]
pub enum SubmitAction {
    /// Send this frame to the analyzer now.
    Dispatch(Frame),
    /// The frame was parked as pending. `replaced` is the stale pending frame
    /// it displaced, which must be released without analysis.
    Queued { replaced: Option<Frame> },
}

/// The `{state, pending}` pair. Not thread-safe by itself; the owner must
/// serialize every call (the threaded pipeline keeps it behind a mutex).
#[derive(Debug)]
pub struct DeliveryState {
    state: PipelineState,
    pending: Option<Frame>,
}

impl DeliveryState {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_sequence(&self) -> Option<u64> {
        self.pending.as_ref().map(Frame::sequence)
    }

    pub fn submit(&mut self, frame: Frame) -> SubmitAction {
        match self.state {
            PipelineState::Idle => {
                debug_assert!(self.pending.is_none(), "idle pipeline holds a pending frame");
                self.state = PipelineState::Busy;
                SubmitAction::Dispatch(frame)
            }
            PipelineState::Busy => SubmitAction::Queued {
                replaced: self.pending.replace(frame),
            },
        }
    }

    /// Handles completion of the in-flight frame.
    ///
    /// Returns the pending frame to dispatch next (state stays busy), or
    /// `None` after moving to idle.
    ///
    /// # Panics
    ///
    /// When called while idle: a completion without an in-flight frame is a
    /// programming error.
    pub fn complete(&mut self) -> Option<Frame> {
        assert_eq!(
            self.state,
            PipelineState::Busy,
            "completion received while idle"
        );
        let next = self.pending.take();
        if next.is_none() {
            self.state = PipelineState::Idle;
        }
        next
    }

    /// Removes the pending frame without touching the in-flight one.
    pub fn drain_pending(&mut self) -> Option<Frame> {
        self.pending.take()
    }
}

impl Default for DeliveryState {
    fn default() -> Self {
        Self::new()
    }
}
