//! # Pipeline Stages
//!
//! The request state machine as a plain value. The coordinator drives it in a
//! single loop; the retry ceiling lives in [`super::context::RequestContext`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Nothing has run yet
    #[default]
    Start,
    /// Describing attached images
    ImageFusion,
    /// Routing the query to a role
    RoleSelection,
    /// Checking whether the query is answerable
    SufficiencyCheck,
    /// Waiting on the caller for clarifications (terminal)
    ClarificationPending,
    /// Generating an answer
    Answering,
    /// Reviewing the latest answer
    Judging,
    /// Preparing a second answering attempt
    Retrying,
    /// Answer produced (terminal)
    Done,
    /// Image analysis failed (terminal)
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Start => "start",
            PipelineStage::ImageFusion => "image_fusion",
            PipelineStage::RoleSelection => "role_selection",
            PipelineStage::SufficiencyCheck => "sufficiency_check",
            PipelineStage::ClarificationPending => "clarification_pending",
            PipelineStage::Answering => "answering",
            PipelineStage::Judging => "judging",
            PipelineStage::Retrying => "retrying",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::ClarificationPending | PipelineStage::Done | PipelineStage::Failed
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline state machine
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stage: PipelineStage,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Advance along the happy path.
    ///
    /// From `Judging` this means the verdict passed; use [`Pipeline::judged`]
    /// when the verdict is known. Terminal stages stay put.
    pub fn advance(&mut self) {
        self.stage = match self.stage {
            PipelineStage::Start => PipelineStage::ImageFusion,
            PipelineStage::ImageFusion => PipelineStage::RoleSelection,
            PipelineStage::RoleSelection => PipelineStage::SufficiencyCheck,
            PipelineStage::SufficiencyCheck => PipelineStage::Answering,
            PipelineStage::Answering => PipelineStage::Judging,
            PipelineStage::Judging => PipelineStage::Done,
            PipelineStage::Retrying => PipelineStage::Answering,
            terminal => terminal,
        };
    }

    /// Stop early and hand clarifying questions back to the caller
    pub fn request_clarification(&mut self) {
        if self.stage == PipelineStage::SufficiencyCheck {
            self.stage = PipelineStage::ClarificationPending;
        }
    }

    /// Apply a judgement: pass or exhausted retries finish, otherwise retry
    pub fn judged(&mut self, passed: bool, can_retry: bool) -> PipelineStage {
        if self.stage == PipelineStage::Judging {
            self.stage = if passed || !can_retry {
                PipelineStage::Done
            } else {
                PipelineStage::Retrying
            };
        }
        self.stage
    }

    /// Abort after image analysis failure
    pub fn fail(&mut self) {
        self.stage = PipelineStage::Failed;
    }

    pub fn is_complete(&self) -> bool {
        self.stage.is_terminal()
    }
}
