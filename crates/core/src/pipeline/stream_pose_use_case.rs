use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::capture::domain::frame_source::FrameSource;
use crate::pipeline::infrastructure::threaded_frame_pipeline::{
    FramePipelineHandle, PipelineReport, PipelineWorker, SubmitError,
};

/// Runs a capture session: pumps frames from a source into the delivery
/// pipeline, then shuts the pipeline down and collects its report.
///
/// Frames are paced to the source's capture timestamps so a synthetic or
/// file-backed source behaves like live hardware. This is a single-use
/// struct: `execute` consumes the owned components.
pub struct StreamPoseUseCase {
    source: Option<Box<dyn FrameSource>>,
    handle: FramePipelineHandle,
    worker: Option<PipelineWorker>,
    realtime: bool,
    cancelled: Arc<AtomicBool>,
}

impl StreamPoseUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        handle: FramePipelineHandle,
        worker: PipelineWorker,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            source: Some(source),
            handle,
            worker: Some(worker),
            realtime: true,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    /// Disables pacing: frames are submitted as fast as the source yields them.
    pub fn unpaced(mut self) -> Self {
        self.realtime = false;
        self
    }

    pub fn execute(&mut self) -> Result<PipelineReport, Box<dyn std::error::Error>> {
        let mut source = self.source.take().ok_or("Stream already executed")?;
        let worker = self.worker.take().ok_or("Stream already executed")?;

        let capture_result = self.pump(&mut *source);

        self.handle.shutdown();
        let report = worker.join()?;
        capture_result?;
        Ok(report)
    }

    fn pump(&self, source: &mut dyn FrameSource) -> Result<(), Box<dyn std::error::Error>> {
        let started = Instant::now();
        let mut unauthorized_warned = false;

        while !self.cancelled.load(Ordering::Relaxed) {
            let frame = match source.next_frame() {
                None => break,
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    log::error!("Capture failed: {e}");
                    return Err(e.into());
                }
            };

            if self.realtime {
                let due = started + frame.timestamp();
                let now = Instant::now();
                if due > now {
                    std::thread::sleep(due - now);
                }
            }

            match self.handle.submit(frame) {
                Ok(()) => {}
                Err(SubmitError::NotAuthorized) => {
                    if !unauthorized_warned {
                        log::warn!("Camera permission not granted; discarding frames");
                        unauthorized_warned = true;
                    }
                }
                Err(SubmitError::ShutDown) => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::frame_source::CaptureError;
    use crate::pipeline::domain::result_sink::AnalysisOutcome;
    use crate::pipeline::infrastructure::result_sinks::ChannelResultSink;
    use crate::pipeline::infrastructure::threaded_frame_pipeline::ThreadedFramePipeline;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::pose::domain::frame_analyzer::{AnalysisJob, FrameAnalyzer};
    use crate::pose::domain::pose::Pose;
    use crate::shared::frame::Frame;
    use crate::shared::permission::PermissionGate;
    use crossbeam_channel::Receiver;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    // --- Stubs ---

    struct StubSource {
        remaining: u64,
        next: u64,
        fail_at: Option<u64>,
        released: Arc<AtomicUsize>,
    }

    impl StubSource {
        fn new(count: u64, released: &Arc<AtomicUsize>) -> Self {
            Self {
                remaining: count,
                next: 0,
                fail_at: None,
                released: released.clone(),
            }
        }
    }

    impl FrameSource for StubSource {
        fn next_frame(&mut self) -> Option<Result<Frame, CaptureError>> {
            if Some(self.next) == self.fail_at {
                return Some(Err(CaptureError::PoolClosed));
            }
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            let seq = self.next;
            self.next += 1;
            let released = self.released.clone();
            Some(Ok(Frame::new(vec![0u8; 3], 1, 1, 3, seq)
                .with_timestamp(Duration::from_micros(seq * 100))
                .with_release(Box::new(move |_| {
                    released.fetch_add(1, Ordering::SeqCst);
                }))))
        }

        fn target_fps(&self) -> u32 {
            10_000
        }
    }

    /// Completes every job inline with an empty pose.
    struct InlineAnalyzer;

    impl FrameAnalyzer for InlineAnalyzer {
        fn analyze(&mut self, job: AnalysisJob) {
            job.complete(Ok(Pose::empty()));
        }
    }

    fn spawn(
        gate: PermissionGate,
    ) -> (FramePipelineHandle, PipelineWorker, Receiver<AnalysisOutcome>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (handle, worker) = ThreadedFramePipeline::spawn(
            Box::new(InlineAnalyzer),
            Box::new(ChannelResultSink::new(tx)),
            Box::new(NullPipelineLogger),
            gate,
        )
        .unwrap();
        (handle, worker, rx)
    }

    #[test]
    fn test_streams_until_source_ends() {
        let released = Arc::new(AtomicUsize::new(0));
        let (handle, worker, outcomes) = spawn(PermissionGate::granted());
        let mut use_case =
            StreamPoseUseCase::new(Box::new(StubSource::new(20, &released)), handle, worker, None);

        let report = use_case.execute().unwrap();

        assert_eq!(report.submitted, 20);
        assert_eq!(
            report.dispatched + report.superseded + report.released_at_shutdown,
            20
        );
        assert_eq!(released.load(Ordering::SeqCst), 20);
        let sequences: Vec<u64> = outcomes.try_iter().map(|o| o.sequence).collect();
        assert!(sequences.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(sequences.len() as u64, report.dispatched);
    }

    #[test]
    fn test_execute_twice_fails() {
        let released = Arc::new(AtomicUsize::new(0));
        let (handle, worker, _outcomes) = spawn(PermissionGate::granted());
        let mut use_case =
            StreamPoseUseCase::new(Box::new(StubSource::new(1, &released)), handle, worker, None)
                .unpaced();
        use_case.execute().unwrap();
        assert!(use_case.execute().is_err());
    }

    #[test]
    fn test_unauthorized_frames_are_released() {
        let released = Arc::new(AtomicUsize::new(0));
        let (handle, worker, _outcomes) = spawn(PermissionGate::new());
        let mut use_case =
            StreamPoseUseCase::new(Box::new(StubSource::new(5, &released)), handle, worker, None)
                .unpaced();

        let report = use_case.execute().unwrap();
        assert_eq!(report.submitted, 0);
        assert_eq!(report.rejected, 5);
        assert_eq!(released.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_capture_error_still_shuts_down_cleanly() {
        let released = Arc::new(AtomicUsize::new(0));
        let mut source = StubSource::new(10, &released);
        source.fail_at = Some(3);
        let (handle, worker, _outcomes) = spawn(PermissionGate::granted());
        let mut use_case = StreamPoseUseCase::new(Box::new(source), handle, worker, None).unpaced();

        assert!(use_case.execute().is_err());
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_cancel_mid_stream_shuts_down_cleanly() {
        let released = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));
        let (handle, worker, outcomes) = spawn(PermissionGate::granted());
        let mut use_case = StreamPoseUseCase::new(
            Box::new(StubSource::new(u64::MAX, &released)),
            handle,
            worker,
            Some(cancelled.clone()),
        );

        let interrupter = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            cancelled.store(true, Ordering::SeqCst);
        });
        let report = use_case.execute().unwrap();
        interrupter.join().unwrap();

        assert!(report.submitted > 0);
        assert_eq!(
            report.dispatched + report.superseded + report.released_at_shutdown,
            report.submitted
        );
        assert_eq!(released.load(Ordering::SeqCst) as u64, report.submitted);
        assert_eq!(outcomes.try_iter().count() as u64, report.dispatched);
    }

    #[test]
    fn test_cancel_flag_stops_capture() {
        let released = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(true));
        let (handle, worker, _outcomes) = spawn(PermissionGate::granted());
        let mut use_case = StreamPoseUseCase::new(
            Box::new(StubSource::new(10, &released)),
            handle,
            worker,
            Some(cancelled),
        );
        let report = use_case.execute().unwrap();
        assert_eq!(report.submitted, 0);
    }
}
