//! # Pipeline Events
//!
//! Progress events emitted while a request moves through the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::pipeline::PipelineStage;

/// Kind of pipeline event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Request accepted
    PipelineStarted,
    /// A stage began calling the backend
    StageStarted,
    /// A stage finished
    StageCompleted,
    /// Returning clarifying questions instead of an answer
    ClarificationRequested,
    /// Answer failed review, answering again
    RetryTriggered,
    /// Vision backend failed; request short-circuits
    ImageAnalysisFailed,
    /// Final answer produced
    PipelineCompleted,
    /// Backend failure outside image analysis
    PipelineFailed,
}

/// An event in the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Position within the run, starting at 0
    pub seq: u32,
    pub timestamp: DateTime<Utc>,
    pub kind: PipelineEventKind,
    /// Stage the event belongs to
    pub stage: PipelineStage,
    /// Associated data (JSON)
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl PipelineEvent {
    pub fn new(seq: u32, kind: PipelineEventKind, stage: PipelineStage) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            kind,
            stage,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Per-run event sender; a sink without a channel drops everything
#[derive(Debug, Default)]
pub(crate) struct EventSink {
    tx: Option<mpsc::Sender<PipelineEvent>>,
    seq: u32,
}

impl EventSink {
    pub(crate) fn new(tx: Option<mpsc::Sender<PipelineEvent>>) -> Self {
        Self { tx, seq: 0 }
    }

    pub(crate) async fn emit(
        &mut self,
        kind: PipelineEventKind,
        stage: PipelineStage,
        data: Option<serde_json::Value>,
    ) {
        let Some(tx) = &self.tx else {
            return;
        };
        let mut event = PipelineEvent::new(self.seq, kind, stage);
        event.data = data;
        self.seq += 1;
        // A dropped receiver only means nobody is listening
        let _ = tx.send(event).await;
    }
}
