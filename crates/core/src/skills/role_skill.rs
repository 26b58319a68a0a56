//! # Role Skill
//!
//! Routes a query to one catalog role with a single, tightly capped
//! completion call. Unparseable output falls back to the first role.

use crate::completion::{CallOptions, CompletionClient, CompletionResult};
use crate::roles::{RoleCatalog, RoleEntry};
use crate::skills::prompts::{self, render};

/// Token cap for the selector; one digit of signal is all that is needed
pub const ROLE_SELECTION_MAX_TOKENS: u32 = 3;

pub struct RoleSkill;

impl RoleSkill {
    /// Select a role for `query`. Only backend failures are errors.
    pub async fn run<'a>(
        client: &dyn CompletionClient,
        catalog: &'a RoleCatalog,
        query: &str,
    ) -> CompletionResult<&'a RoleEntry> {
        let prompt = render(
            prompts::ROLE_SELECTOR,
            &[
                ("ids", &catalog.id_list()),
                ("query", query),
                ("menu", &catalog.selection_menu()),
            ],
        );

        let raw = client
            .generate_text(&prompt, CallOptions::capped(ROLE_SELECTION_MAX_TOKENS))
            .await?;

        let role = catalog.resolve(raw.trim());
        if !raw.contains(role.id.as_str()) {
            tracing::warn!(raw = %raw.trim(), fallback = %role.name, "Role selector output had no catalog id");
        }
        Ok(role)
    }
}
