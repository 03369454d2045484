use crossbeam_channel::Sender;

use crate::pipeline::domain::result_sink::{AnalysisOutcome, ResultSink};
use crate::pose::domain::pose::LandmarkKind;

/// Forwards every outcome over a channel. A disconnected receiver is ignored.
pub struct ChannelResultSink {
    tx: Sender<AnalysisOutcome>,
}

impl ChannelResultSink {
    pub fn new(tx: Sender<AnalysisOutcome>) -> Self {
        Self { tx }
    }
}

impl ResultSink for ChannelResultSink {
    fn publish(&mut self, outcome: AnalysisOutcome) {
        let _ = self.tx.send(outcome);
    }
}

/// Turns outcomes into one line of status text about a single landmark.
pub struct LandmarkStatusSink {
    landmark: LandmarkKind,
    on_status: Box<dyn FnMut(&str) + Send>,
    last: Option<String>,
}

impl LandmarkStatusSink {
    pub fn new(landmark: LandmarkKind, on_status: Box<dyn FnMut(&str) + Send>) -> Self {
        Self {
            landmark,
            on_status,
            last: None,
        }
    }

    pub fn status_text(&self, outcome: &AnalysisOutcome) -> String {
        match &outcome.result {
            Ok(pose) => match pose.landmark(self.landmark) {
                Some(lm) => format!("Confidence: {:.2}", lm.in_frame_likelihood),
                None => "No person detected".to_string(),
            },
            Err(e) => format!("Analysis failed: {e}"),
        }
    }

    /// Most recent status line, if any outcome has been published.
    pub fn last_status(&self) -> Option<&str> {
        self.last.as_deref()
    }
}

impl ResultSink for LandmarkStatusSink {
    fn publish(&mut self, outcome: AnalysisOutcome) {
        let text = self.status_text(&outcome);
        match &outcome.result {
            Ok(_) => log::debug!("Frame #{}: {text}", outcome.sequence),
            Err(_) => log::warn!("Frame #{}: {text}", outcome.sequence),
        }
        (self.on_status)(&text);
        self.last = Some(text);
    }
}
