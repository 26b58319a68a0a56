//! # Orchestration
//!
//! Drives a request through the ask-then-answer pipeline.
//!
//! ## Pipeline Flow
//!
//! ```text
//! Images → Role → Sufficiency ─┬─ need input → Clarifying questions
//!                              └─ answerable → Answer ⟷ Judge (one retry)
//! ```

pub mod context;
pub mod coordinator;
pub mod events;
pub mod pipeline;

pub use context::{RequestContext, MAX_QUALITY_RETRIES, QUALITY_FEEDBACK_MARKER};
pub use coordinator::{
    AskRequest, Orchestrator, PipelineConfig, PipelineError, PipelineResult, IMAGE_FAILURE_REASON,
    IMAGE_FAILURE_ROLE,
};
pub use events::{PipelineEvent, PipelineEventKind};
pub use pipeline::{Pipeline, PipelineStage};
