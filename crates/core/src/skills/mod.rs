//! # Askthen Skills
//!
//! One skill per pipeline stage. Each skill is a stateless unit struct with
//! an async `run` that takes the completion client by reference, so the
//! orchestrator can drive them with any backend.
//!
//! ## Stages
//!
//! - `ImageSkill` - Fuse attached images into one description
//! - `RoleSkill` - Route the query to a catalog role
//! - `SufficiencySkill` - Decide whether clarifying questions are needed
//! - `AnswerSkill` - Generate the candidate answer
//! - `JudgeSkill` - Review the answer and return a verdict

pub mod prompts;

pub mod answer_skill;
pub mod image_skill;
pub mod judge_skill;
pub mod role_skill;
pub mod sufficiency_skill;

// Re-exports for convenience
pub use answer_skill::{AnswerInput, AnswerSkill};
pub use image_skill::{ImageAnalysis, ImageSkill};
pub use judge_skill::{JudgeSkill, Judgement};
pub use role_skill::RoleSkill;
pub use sufficiency_skill::{ClarifyDecision, SufficiencySkill};
