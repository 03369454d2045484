use std::fmt;
use std::time::{Duration, Instant};

use crate::pose::domain::pose::Pose;
use crate::pose::domain::pose_detector::AnalysisError;
use crate::shared::frame::Frame;

/// What an analyzer hands back when it is done with a frame.
///
/// The frame travels back with the outcome so the dispatcher decides when
/// to release it.
#[derive(Debug)]
pub struct AnalysisCompletion {
    pub frame: Frame,
    pub outcome: Result<Pose, AnalysisError>,
    pub elapsed: Duration,
}

/// Route from an analyzer back to whoever dispatched the frame.
pub type CompletionNotify = Box<dyn FnOnce(AnalysisCompletion) + Send>;

/// A frame in flight to an analyzer.
///
/// Owns the frame until [`AnalysisJob::complete`] is called. A job dropped
/// without completing reports [`AnalysisError::Abandoned`], so the dispatcher
/// always hears back exactly once per job.
pub struct AnalysisJob {
    frame: Option<Frame>,
    notify: Option<CompletionNotify>,
    dispatched_at: Instant,
}

impl AnalysisJob {
    pub fn new(frame: Frame, notify: CompletionNotify) -> Self {
        Self {
            frame: Some(frame),
            notify: Some(notify),
            dispatched_at: Instant::now(),
        }
    }

    pub fn frame(&self) -> &Frame {
        self.frame
            .as_ref()
            .expect("frame is present until the job completes")
    }

    pub fn complete(mut self, outcome: Result<Pose, AnalysisError>) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: Result<Pose, AnalysisError>) {
        if let (Some(frame), Some(notify)) = (self.frame.take(), self.notify.take()) {
            notify(AnalysisCompletion {
                frame,
                outcome,
                elapsed: self.dispatched_at.elapsed(),
            });
        }
    }
}

impl Drop for AnalysisJob {
    fn drop(&mut self) {
        self.finish(Err(AnalysisError::Abandoned));
    }
}

impl fmt::Debug for AnalysisJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisJob")
            .field("frame", &self.frame)
            .field("dispatched_at", &self.dispatched_at)
            .finish_non_exhaustive()
    }
}

/// Asynchronous, single-flight analysis capability.
///
/// `analyze` must return promptly; the result is delivered later (possibly
/// from another thread) through the job. The caller never issues a second
/// job before the previous one has completed.
pub trait FrameAnalyzer: Send {
    fn analyze(&mut self, job: AnalysisJob);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn job(
        released: &Arc<AtomicUsize>,
    ) -> (AnalysisJob, crossbeam_channel::Receiver<AnalysisCompletion>) {
        let released = released.clone();
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, 9).with_release(Box::new(move |_| {
            released.fetch_add(1, Ordering::SeqCst);
        }));
        let (tx, rx) = crossbeam_channel::unbounded();
        let notify: CompletionNotify = Box::new(move |c| {
            let _ = tx.send(c);
        });
        (AnalysisJob::new(frame, notify), rx)
    }

    #[test]
    fn test_complete_delivers_frame_and_outcome() {
        let released = Arc::new(AtomicUsize::new(0));
        let (job, rx) = job(&released);
        assert_eq!(job.frame().sequence(), 9);

        job.complete(Ok(Pose::empty()));

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.frame.sequence(), 9);
        assert_eq!(completion.outcome, Ok(Pose::empty()));
        assert_eq!(released.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_job_reports_abandoned() {
        let released = Arc::new(AtomicUsize::new(0));
        let (job, rx) = job(&released);
        drop(job);

        let completion = rx.try_recv().unwrap();
        assert_eq!(completion.outcome, Err(AnalysisError::Abandoned));
        drop(completion);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_frame_released_when_receiver_gone() {
        let released = Arc::new(AtomicUsize::new(0));
        let (job, rx) = job(&released);
        drop(rx);
        job.complete(Err(AnalysisError::Detector("boom".into())));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
