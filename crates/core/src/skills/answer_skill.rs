//! # Answer Skill
//!
//! Produces the candidate answer. The full role catalog is always included
//! so the backend can frame its answer relative to the other roles.

use crate::completion::{CallOptions, CompletionClient, CompletionResult};
use crate::roles::RoleCatalog;
use crate::skills::prompts::{self, render};

pub const NO_IMAGE_PROVIDED: &str = "(no image provided)";
pub const NO_ADDITIONAL_INPUT: &str = "(no additional input)";

/// Everything the answer prompt is built from
#[derive(Debug, Clone, Copy)]
pub struct AnswerInput<'a> {
    pub role: &'a str,
    pub query: &'a str,
    pub image_description: &'a str,
    pub extra_context: &'a str,
    /// Previous judgement's reason; only set on a retry
    pub feedback: Option<&'a str>,
}

pub struct AnswerSkill;

impl AnswerSkill {
    pub async fn run(
        client: &dyn CompletionClient,
        catalog: &RoleCatalog,
        input: AnswerInput<'_>,
        options: CallOptions,
    ) -> CompletionResult<String> {
        let prompt = build_prompt(catalog, &input);
        tracing::debug!(
            chars = prompt.len(),
            retry = input.feedback.is_some(),
            "Generating answer"
        );

        let answer = client.generate_text(&prompt, options).await?;
        Ok(answer.trim().to_string())
    }
}

fn build_prompt(catalog: &RoleCatalog, input: &AnswerInput<'_>) -> String {
    let image_info = if input.image_description.trim().is_empty() {
        NO_IMAGE_PROVIDED.to_string()
    } else {
        format!("Image content:\n{}", input.image_description)
    };

    let extra_context = if input.extra_context.trim().is_empty() {
        NO_ADDITIONAL_INPUT
    } else {
        input.extra_context
    };

    let feedback_block = input
        .feedback
        .filter(|reason| !reason.trim().is_empty())
        .map(|reason| {
            format!(
                "## Quality feedback on the previous attempt (you must address it)\n- {}",
                reason.trim()
            )
        })
        .unwrap_or_default();

    render(
        prompts::ANSWER,
        &[
            ("role", input.role),
            ("role_details", &catalog.instruction_digest()),
            ("query", input.query),
            ("image_info", &image_info),
            ("extra_context", extra_context),
            ("feedback_block", &feedback_block),
        ],
    )
}
