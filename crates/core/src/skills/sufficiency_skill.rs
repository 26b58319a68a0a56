//! # Sufficiency Skill
//!
//! Decides whether a query plus the context gathered so far is answerable,
//! and if not, which clarifying questions to put back to the caller.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::completion::{generate_typed, CompletionClient, CompletionResult};
use crate::skills::prompts::{self, render};

/// Upper bound on questions returned to the caller
pub const MAX_CLARIFYING_QUESTIONS: usize = 3;

/// Placeholder used when no extra context has been gathered
pub const NO_CONTEXT_SUPPLIED: &str = "(none supplied)";

/// Structured verdict from the backend
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ClarifyDecision {
    /// True when follow-up questions are required
    pub need: bool,
    /// Why information is missing; informational only
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Concrete clarifying questions, at most three
    #[serde(default)]
    pub questions: Vec<String>,
}

impl ClarifyDecision {
    /// Trim questions, drop blanks and cap the list. `need` is kept as sent.
    fn normalized(mut self) -> Self {
        self.questions = self
            .questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_CLARIFYING_QUESTIONS)
            .collect();

        if self.need && self.questions.is_empty() {
            tracing::warn!("Sufficiency check asked for input without usable questions");
        }
        self
    }
}

pub struct SufficiencySkill;

impl SufficiencySkill {
    pub async fn run(
        client: &dyn CompletionClient,
        query: &str,
        extra_context: &str,
        role: &str,
    ) -> CompletionResult<ClarifyDecision> {
        let extra_context = if extra_context.trim().is_empty() {
            NO_CONTEXT_SUPPLIED
        } else {
            extra_context
        };
        let prompt = render(
            prompts::SUFFICIENCY,
            &[("query", query), ("extra_context", extra_context), ("role", role)],
        );

        let decision: ClarifyDecision = generate_typed(client, &prompt).await?;
        let decision = decision.normalized();
        tracing::debug!(
            need = decision.need,
            reasons = ?decision.reasons,
            questions = decision.questions.len(),
            "Sufficiency decided"
        );
        Ok(decision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallKind, ScriptedClient};

    #[tokio::test]
    async fn test_sufficient_query() {
        let client = ScriptedClient::new().sufficiency(false, &[]);
        let decision = SufficiencySkill::run(&client, "Capital of France?", "", "General")
            .await
            .unwrap();

        assert!(!decision.need);
        let prompt = &client.calls_of(CallKind::Structured)[0].prompt;
        assert!(prompt.contains(NO_CONTEXT_SUPPLIED));
        assert!(prompt.contains("Role: General"));
    }

    #[tokio::test]
    async fn test_questions_are_capped_and_cleaned() {
        let client = ScriptedClient::new().sufficiency(true, &["  Budget?  ", "", "City?", "Dates?", "Party size?"]);
        let decision = SufficiencySkill::run(&client, "Plan my trip", "", "General")
            .await
            .unwrap();

        assert!(decision.need);
        assert_eq!(decision.questions, vec!["Budget?", "City?", "Dates?"]);
    }

    #[tokio::test]
    async fn test_need_is_kept_without_usable_questions() {
        let client = ScriptedClient::new().sufficiency(true, &["   "]);
        let decision = SufficiencySkill::run(&client, "Plan my trip", "", "General")
            .await
            .unwrap();
        assert!(decision.need);
        assert!(decision.questions.is_empty());
    }

    #[tokio::test]
    async fn test_known_context_is_passed_through() {
        let client = ScriptedClient::new().sufficiency(false, &[]);
        SufficiencySkill::run(&client, "Plan my trip", "Kyoto\n3 days", "General")
            .await
            .unwrap();

        let prompt = &client.calls_of(CallKind::Structured)[0].prompt;
        assert!(prompt.contains("Kyoto\n3 days"));
        assert!(!prompt.contains(NO_CONTEXT_SUPPLIED));
    }
}
