use std::time::{Duration, Instant};

/// Why a submitted frame never reached the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Displaced from the pending slot by a newer frame.
    Superseded,
    /// Still pending when the pipeline shut down.
    Shutdown,
}

/// Observer for frame delivery events.
///
/// Calls are serialized by the pipeline's lock, so implementations may keep
/// plain mutable state. They arrive from both the producer and the worker
/// thread and must not block.
pub trait PipelineLogger: Send {
    fn submitted(&mut self, sequence: u64);

    fn dispatched(&mut self, sequence: u64);

    fn dropped(&mut self, sequence: u64, reason: DropReason);

    /// Analysis of `sequence` finished after `elapsed`, successfully or not.
    fn completed(&mut self, sequence: u64, elapsed: Duration, success: bool);

    /// Emit an end-of-stream summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger for tests and embedders that do their own reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn submitted(&mut self, _sequence: u64) {}
    fn dispatched(&mut self, _sequence: u64) {}
    fn dropped(&mut self, _sequence: u64, _reason: DropReason) {}
    fn completed(&mut self, _sequence: u64, _elapsed: Duration, _success: bool) {}
}

/// Logs delivery events through the `log` crate and keeps running totals.
///
/// A heartbeat line is written every `heartbeat_frames` completions.
pub struct LogPipelineLogger {
    heartbeat_frames: u64,
    start_time: Instant,
    submitted: u64,
    dispatched: u64,
    superseded: u64,
    dropped_at_shutdown: u64,
    succeeded: u64,
    failed: u64,
    analysis_ms_total: f64,
}

impl LogPipelineLogger {
    pub fn new(heartbeat_frames: u64) -> Self {
        Self {
            heartbeat_frames: heartbeat_frames.max(1),
            start_time: Instant::now(),
            submitted: 0,
            dispatched: 0,
            superseded: 0,
            dropped_at_shutdown: 0,
            succeeded: 0,
            failed: 0,
            analysis_ms_total: 0.0,
        }
    }

    fn completions(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Fraction of submitted frames that were never analyzed.
    pub fn drop_rate(&self) -> f64 {
        if self.submitted == 0 {
            return 0.0;
        }
        (self.superseded + self.dropped_at_shutdown) as f64 / self.submitted as f64
    }

    pub fn average_analysis_ms(&self) -> Option<f64> {
        match self.completions() {
            0 => None,
            n => Some(self.analysis_ms_total / n as f64),
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was submitted.
    pub fn summary_string(&self) -> Option<String> {
        if self.submitted == 0 {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Stream summary ({} frames submitted, {elapsed_s:.1}s):",
            self.submitted
        )];
        lines.push(format!(
            "  analyzed: {} dispatched, {} ok, {} failed",
            self.dispatched, self.succeeded, self.failed
        ));
        lines.push(format!(
            "  dropped : {} superseded, {} at shutdown ({:.1}%)",
            self.superseded,
            self.dropped_at_shutdown,
            self.drop_rate() * 100.0
        ));
        if let Some(avg) = self.average_analysis_ms() {
            lines.push(format!("  analysis: avg {avg:.1}ms"));
        }
        if elapsed_s > 0.0 && self.completions() > 0 {
            let fps = self.completions() as f64 / elapsed_s;
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn submitted(&mut self, _sequence: u64) {
        self.submitted += 1;
    }

    fn dispatched(&mut self, sequence: u64) {
        self.dispatched += 1;
        log::trace!("Dispatching frame #{sequence}");
    }

    fn dropped(&mut self, sequence: u64, reason: DropReason) {
        match reason {
            DropReason::Superseded => self.superseded += 1,
            DropReason::Shutdown => self.dropped_at_shutdown += 1,
        }
        log::trace!("Dropped frame #{sequence} ({reason:?})");
    }

    fn completed(&mut self, sequence: u64, elapsed: Duration, success: bool) {
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.analysis_ms_total += elapsed.as_secs_f64() * 1000.0;

        if self.completions() % self.heartbeat_frames == 0 {
            log::info!(
                "Analyzed {} frames (last #{sequence}), {} dropped",
                self.completions(),
                self.superseded
            );
        }
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.submitted(1);
        logger.dispatched(1);
        logger.dropped(2, DropReason::Superseded);
        logger.completed(1, Duration::from_millis(5), true);
        logger.summary();
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = LogPipelineLogger::new(10);
        assert!(logger.summary_string().is_none());
        assert!(logger.average_analysis_ms().is_none());
    }

    #[test]
    fn test_drop_rate_counts_both_reasons() {
        let mut logger = LogPipelineLogger::new(10);
        for seq in 0..4 {
            logger.submitted(seq);
        }
        logger.dropped(1, DropReason::Superseded);
        logger.dropped(3, DropReason::Shutdown);
        assert_relative_eq!(logger.drop_rate(), 0.5);
    }

    #[test]
    fn test_average_analysis_time() {
        let mut logger = LogPipelineLogger::new(10);
        logger.completed(0, Duration::from_millis(10), true);
        logger.completed(1, Duration::from_millis(30), false);
        assert_relative_eq!(logger.average_analysis_ms().unwrap(), 20.0, epsilon = 1e-9);
        assert_eq!(logger.succeeded, 1);
        assert_eq!(logger.failed, 1);
    }

    #[test]
    fn test_average_over_long_stream_uses_running_total() {
        let mut logger = LogPipelineLogger::new(1_000_000);
        for seq in 0..100_000u64 {
            let ms = if seq % 2 == 0 { 1 } else { 3 };
            logger.completed(seq, Duration::from_millis(ms), true);
        }
        assert_relative_eq!(logger.average_analysis_ms().unwrap(), 2.0, epsilon = 1e-6);
        assert_relative_eq!(logger.analysis_ms_total, 200_000.0, epsilon = 1e-3);
    }

    #[test]
    fn test_summary_contents() {
        let mut logger = LogPipelineLogger::new(10);
        logger.submitted(0);
        logger.submitted(1);
        logger.dispatched(0);
        logger.dropped(1, DropReason::Superseded);
        logger.completed(0, Duration::from_millis(12), true);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Stream summary (2 frames submitted"));
        assert!(summary.contains("1 dispatched, 1 ok, 0 failed"));
        assert!(summary.contains("1 superseded, 0 at shutdown (50.0%)"));
        assert!(summary.contains("avg 12.0ms"));
    }

    #[test]
    fn test_heartbeat_interval_clamped() {
        let logger = LogPipelineLogger::new(0);
        assert_eq!(logger.heartbeat_frames, 1);
    }

    #[test]
    fn test_default_heartbeat() {
        assert_eq!(LogPipelineLogger::default().heartbeat_frames, 30);
    }
}
