use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::pipeline::delivery_state::{DeliveryState, PipelineState, SubmitAction};
use crate::pipeline::domain::result_sink::{AnalysisOutcome, ResultSink};
use crate::pipeline::pipeline_logger::{DropReason, PipelineLogger};
use crate::pose::domain::frame_analyzer::{AnalysisCompletion, AnalysisJob, FrameAnalyzer};
use crate::shared::frame::Frame;
use crate::shared::permission::PermissionGate;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("camera capture has not been authorized")]
    NotAuthorized,
    #[error("pipeline is shut down")]
    ShutDown,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to spawn pipeline worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("pipeline worker panicked")]
    WorkerPanicked,
}

/// Frame counts for one pipeline run.
///
/// Every submitted frame ends up in exactly one of `dispatched`,
/// `superseded` or `released_at_shutdown`; `rejected` frames never entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub submitted: u64,
    pub dispatched: u64,
    pub superseded: u64,
    pub released_at_shutdown: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// Delivery state plus the bookkeeping that must change with it.
struct Shared {
    state: DeliveryState,
    closed: bool,
    logger: Box<dyn PipelineLogger>,
    report: PipelineReport,
}

impl Shared {
    /// Stops accepting frames and hands back the pending frame for release.
    /// Returns `None` when already closed.
    fn close(&mut self) -> Option<Frame> {
        if self.closed {
            return None;
        }
        self.closed = true;
        let pending = self.state.drain_pending()?;
        self.report.released_at_shutdown += 1;
        self.logger.dropped(pending.sequence(), DropReason::Shutdown);
        Some(pending)
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer-side entry point. Cheap to clone; never blocks on analysis.
///
/// Replacing the pending frame happens inside `submit`, so the producer never
/// has more than two frames outstanding: one in flight and one pending.
#[derive(Clone)]
pub struct FramePipelineHandle {
    shared: Arc<Mutex<Shared>>,
    dispatch_tx: Sender<Frame>,
    shutdown_tx: Sender<()>,
    gate: PermissionGate,
}

impl FramePipelineHandle {
    /// Hands a frame to the pipeline and returns immediately.
    ///
    /// A rejected or superseded frame is released before this returns.
    pub fn submit(&self, frame: Frame) -> Result<(), SubmitError> {
        let mut shared = lock(&self.shared);
        let refusal = if shared.closed {
            Some(SubmitError::ShutDown)
        } else if !self.gate.is_granted() {
            Some(SubmitError::NotAuthorized)
        } else {
            None
        };
        if let Some(err) = refusal {
            shared.report.rejected += 1;
            drop(shared);
            log::trace!("Rejected frame #{} ({err})", frame.sequence());
            frame.release();
            return Err(err);
        }

        let sequence = frame.sequence();
        let mut worker_gone = false;
        shared.report.submitted += 1;
        shared.logger.submitted(sequence);

        let stale = match shared.state.submit(frame) {
            SubmitAction::Dispatch(frame) => {
                shared.report.dispatched += 1;
                shared.logger.dispatched(sequence);
                // The slot is empty whenever the state was idle. Sending under
                // the lock keeps a concurrent shutdown from missing the frame.
                match self.dispatch_tx.try_send(frame) {
                    Ok(()) => None,
                    Err(e) => {
                        log::error!("Frame pipeline worker is gone; closing");
                        shared.closed = true;
                        worker_gone = true;
                        Some(e.into_inner())
                    }
                }
            }
            SubmitAction::Queued { replaced } => replaced.map(|stale| {
                shared.report.superseded += 1;
                shared.logger.dropped(stale.sequence(), DropReason::Superseded);
                stale
            }),
        };
        drop(shared);

        if let Some(stale) = stale {
            stale.release();
        }
        if worker_gone {
            return Err(SubmitError::ShutDown);
        }
        Ok(())
    }

    /// Stops accepting frames. The pending frame is released right away; the
    /// in-flight frame finishes normally. Idempotent.
    pub fn shutdown(&self) {
        let pending = lock(&self.shared).close();
        if let Some(pending) = pending {
            pending.release();
        }
        let _ = self.shutdown_tx.try_send(());
    }

    pub fn is_accepting(&self) -> bool {
        !lock(&self.shared).closed
    }
}

/// Owner of the worker thread. Join it after shutting the handle down.
pub struct PipelineWorker {
    handle: JoinHandle<PipelineReport>,
}

impl PipelineWorker {
    /// Waits for the worker to finish. The worker only exits after shutdown
    /// (or after every handle is dropped) and once the in-flight frame has
    /// completed.
    pub fn join(self) -> Result<PipelineReport, PipelineError> {
        self.handle.join().map_err(|_| PipelineError::WorkerPanicked)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Keep-only-latest frame delivery with a dedicated analysis thread.
///
/// Layout: `producer → [pending slot] → worker ⇄ analyzer → sink`
///
/// The `{state, pending}` pair sits behind one lock taken by `submit` and by
/// the worker's completion handler, so a late completion never races a
/// submission. Only a dispatch crosses to the worker, over a one-slot
/// channel. The worker alone calls the analyzer and the sink.
pub struct ThreadedFramePipeline;

impl ThreadedFramePipeline {
    pub fn spawn(
        analyzer: Box<dyn FrameAnalyzer>,
        sink: Box<dyn ResultSink>,
        logger: Box<dyn PipelineLogger>,
        gate: PermissionGate,
    ) -> Result<(FramePipelineHandle, PipelineWorker), PipelineError> {
        let (dispatch_tx, dispatch_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (completion_tx, completion_rx) = crossbeam_channel::unbounded::<AnalysisCompletion>();
        let shared = Arc::new(Mutex::new(Shared {
            state: DeliveryState::new(),
            closed: false,
            logger,
            report: PipelineReport::default(),
        }));

        let worker = DeliveryWorker {
            shared: shared.clone(),
            analyzer,
            sink,
            completion_tx,
            in_flight: None,
        };

        let handle = std::thread::Builder::new()
            .name("frame-pipeline".into())
            .spawn(move || worker.run(dispatch_rx, shutdown_rx, completion_rx))
            .map_err(PipelineError::Spawn)?;

        Ok((
            FramePipelineHandle {
                shared,
                dispatch_tx,
                shutdown_tx,
                gate,
            },
            PipelineWorker { handle },
        ))
    }
}

enum WorkerEvent {
    Dispatched(Frame),
    ProducersGone,
    ShutdownRequested,
    Completed(AnalysisCompletion),
}

struct DeliveryWorker {
    shared: Arc<Mutex<Shared>>,
    analyzer: Box<dyn FrameAnalyzer>,
    sink: Box<dyn ResultSink>,
    completion_tx: Sender<AnalysisCompletion>,
    in_flight: Option<u64>,
}

impl DeliveryWorker {
    fn run(
        mut self,
        mut dispatch_rx: Receiver<Frame>,
        mut shutdown_rx: Receiver<()>,
        completion_rx: Receiver<AnalysisCompletion>,
    ) -> PipelineReport {
        loop {
            if self.finished() {
                break;
            }

            let event = crossbeam_channel::select! {
                recv(dispatch_rx) -> msg => match msg {
                    Ok(frame) => WorkerEvent::Dispatched(frame),
                    Err(_) => WorkerEvent::ProducersGone,
                },
                recv(shutdown_rx) -> _ => WorkerEvent::ShutdownRequested,
                recv(completion_rx) -> msg => match msg {
                    Ok(completion) => WorkerEvent::Completed(completion),
                    // The worker holds a completion sender.
                    Err(_) => unreachable!("completion channel closed"),
                },
            };

            match event {
                WorkerEvent::Dispatched(frame) => self.analyze(frame),
                WorkerEvent::ProducersGone => {
                    dispatch_rx = crossbeam_channel::never();
                    self.close();
                }
                WorkerEvent::ShutdownRequested => {
                    shutdown_rx = crossbeam_channel::never();
                    self.close();
                }
                WorkerEvent::Completed(completion) => self.on_completed(completion),
            }
        }

        let shared = lock(&self.shared);
        shared.logger.summary();
        log::debug!("Frame pipeline worker exiting: {:?}", shared.report);
        shared.report.clone()
    }

    /// Closed with nothing in flight: no completion can arrive any more.
    fn finished(&self) -> bool {
        let shared = lock(&self.shared);
        shared.closed && shared.state.state() == PipelineState::Idle
    }

    fn analyze(&mut self, frame: Frame) {
        debug_assert!(self.in_flight.is_none(), "dispatch while a frame is in flight");
        self.in_flight = Some(frame.sequence());

        let completion_tx = self.completion_tx.clone();
        let job = AnalysisJob::new(
            frame,
            Box::new(move |completion| {
                let _ = completion_tx.send(completion);
            }),
        );
        self.analyzer.analyze(job);
    }

    fn on_completed(&mut self, completion: AnalysisCompletion) {
        let AnalysisCompletion {
            frame,
            outcome,
            elapsed,
        } = completion;
        let sequence = frame.sequence();
        let timestamp = frame.timestamp();
        debug_assert_eq!(self.in_flight, Some(sequence), "completion for a frame not in flight");

        frame.release();
        self.in_flight = None;

        let next = {
            let mut shared = lock(&self.shared);
            match &outcome {
                Ok(_) => shared.report.succeeded += 1,
                Err(e) => {
                    shared.report.failed += 1;
                    log::debug!("Analysis of frame #{sequence} failed: {e}");
                }
            }
            shared.logger.completed(sequence, elapsed, outcome.is_ok());

            let next = shared.state.complete();
            if let Some(next) = &next {
                shared.report.dispatched += 1;
                shared.logger.dispatched(next.sequence());
            }
            next
        };
        if let Some(next) = next {
            self.analyze(next);
        }

        self.sink.publish(AnalysisOutcome {
            sequence,
            timestamp,
            result: outcome,
        });
    }

    fn close(&mut self) {
        let pending = lock(&self.shared).close();
        if let Some(pending) = pending {
            pending.release();
        }
        log::info!(
            "Frame pipeline shutting down ({})",
            match self.in_flight {
                Some(seq) => format!("waiting for frame #{seq}"),
                None => "idle".to_string(),
            }
        );
    }
}
