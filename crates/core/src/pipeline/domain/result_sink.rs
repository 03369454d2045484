use std::time::Duration;

use crate::pose::domain::pose::Pose;
use crate::pose::domain::pose_detector::AnalysisError;

/// Result of analyzing one frame, as published to a [`ResultSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub sequence: u64,
    pub timestamp: Duration,
    pub result: Result<Pose, AnalysisError>,
}

/// Receives one outcome per analyzed frame, in dispatch order.
///
/// Called from the pipeline worker thread after the next frame has been
/// dispatched. A slow sink holds up completion handling, not submission.
pub trait ResultSink: Send {
    fn publish(&mut self, outcome: AnalysisOutcome);
}
