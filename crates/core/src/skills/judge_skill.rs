//! # Judge Skill
//!
//! Reviews a candidate answer and returns a pass/fail verdict with a short
//! justification. A failing verdict is not an error; the orchestrator decides
//! whether it earns a retry.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::completion::{generate_typed, CompletionClient, CompletionResult};
use crate::skills::prompts::{self, render};

pub const NO_EXTRA_CONTEXT: &str = "(none)";

/// Verdict on one answer
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Judgement {
    /// True when the answer needs no improvement
    #[serde(default)]
    pub judge: bool,
    /// Brief justification
    #[serde(default)]
    pub reason: String,
}

pub struct JudgeSkill;

impl JudgeSkill {
    pub async fn run(
        client: &dyn CompletionClient,
        query: &str,
        extra_context: &str,
        role: &str,
        answer: &str,
    ) -> CompletionResult<Judgement> {
        let extra_context = if extra_context.trim().is_empty() {
            NO_EXTRA_CONTEXT
        } else {
            extra_context
        };
        let prompt = render(
            prompts::JUDGE,
            &[
                ("role", role),
                ("query", query),
                ("extra_context", extra_context),
                ("answer", answer),
            ],
        );

        let mut judgement: Judgement = generate_typed(client, &prompt).await?;
        judgement.reason = judgement.reason.trim().to_string();
        tracing::info!(passed = judgement.judge, reason = %judgement.reason, "Answer judged");
        Ok(judgement)
    }
}
