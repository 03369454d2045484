use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::pose::domain::frame_analyzer::{AnalysisJob, FrameAnalyzer};
use crate::pose::domain::pose_detector::{AnalysisError, PoseDetector};

/// Runs a synchronous [`PoseDetector`] on a dedicated thread.
///
/// `analyze` only hands the job over; the completion fires from the detector
/// thread once detection finishes.
pub struct ThreadedFrameAnalyzer {
    job_tx: Option<Sender<AnalysisJob>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadedFrameAnalyzer {
    pub fn new(detector: Box<dyn PoseDetector>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<AnalysisJob>();
        let handle = std::thread::Builder::new()
            .name("pose-detector".into())
            .spawn(move || run_detector(detector, job_rx))
            .ok();
        if handle.is_none() {
            log::error!("Failed to spawn pose detector thread");
        }
        Self {
            job_tx: Some(job_tx),
            handle,
        }
    }
}

fn run_detector(
    mut detector: Box<dyn PoseDetector>,
    job_rx: crossbeam_channel::Receiver<AnalysisJob>,
) {
    for job in job_rx {
        let outcome = detector.detect(job.frame());
        if let Err(ref e) = outcome {
            log::debug!("Frame #{} failed: {e}", job.frame().sequence());
        }
        job.complete(outcome);
    }
    log::debug!("Pose detector thread exiting");
}

impl FrameAnalyzer for ThreadedFrameAnalyzer {
    fn analyze(&mut self, job: AnalysisJob) {
        let Some(tx) = self.job_tx.as_ref() else {
            job.complete(Err(AnalysisError::Disconnected));
            return;
        };
        if let Err(crossbeam_channel::SendError(job)) = tx.send(job) {
            job.complete(Err(AnalysisError::Disconnected));
        }
    }
}

impl Drop for ThreadedFrameAnalyzer {
    fn drop(&mut self) {
        drop(self.job_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Pose detector thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::domain::frame_analyzer::{AnalysisCompletion, CompletionNotify};
    use crate::pose::domain::pose::{LandmarkKind, Point3, Pose, PoseLandmark};
    use crate::shared::frame::Frame;
    use std::time::Duration;

    struct FakeDetector {
        fail_on: Option<u64>,
    }

    impl PoseDetector for FakeDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Pose, AnalysisError> {
            if Some(frame.sequence()) == self.fail_on {
                return Err(AnalysisError::Detector("bad frame".into()));
            }
            Ok(Pose::new(vec![PoseLandmark::new(
                LandmarkKind::Nose,
                Point3::default(),
                0.5,
            )]))
        }
    }

    struct PanickingDetector;

    impl PoseDetector for PanickingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Pose, AnalysisError> {
            panic!("model crashed");
        }
    }

    fn submit(
        analyzer: &mut ThreadedFrameAnalyzer,
        sequence: u64,
    ) -> crossbeam_channel::Receiver<AnalysisCompletion> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let notify: CompletionNotify = Box::new(move |c| {
            let _ = tx.send(c);
        });
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, sequence);
        analyzer.analyze(AnalysisJob::new(frame, notify));
        rx
    }

    #[test]
    fn test_completes_on_detector_thread() {
        let mut analyzer = ThreadedFrameAnalyzer::new(Box::new(FakeDetector { fail_on: None }));
        let rx = submit(&mut analyzer, 1);
        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.frame.sequence(), 1);
        assert_eq!(completion.outcome.unwrap().landmarks().len(), 1);
    }

    #[test]
    fn test_detector_error_is_reported() {
        let mut analyzer = ThreadedFrameAnalyzer::new(Box::new(FakeDetector { fail_on: Some(2) }));
        let rx = submit(&mut analyzer, 2);
        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            completion.outcome,
            Err(AnalysisError::Detector("bad frame".into()))
        );
    }

    #[test]
    fn test_panicking_detector_still_completes_job() {
        let mut analyzer = ThreadedFrameAnalyzer::new(Box::new(PanickingDetector));
        let rx = submit(&mut analyzer, 3);
        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(completion.outcome, Err(AnalysisError::Abandoned));

        // The dead thread may or may not have dropped its receiver yet; either
        // way the job must come back as a failure once the analyzer is gone.
        let rx = submit(&mut analyzer, 4);
        drop(analyzer);
        let completion = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(completion.outcome.is_err());
    }
}
