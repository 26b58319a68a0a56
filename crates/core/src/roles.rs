//! # Role Catalog
//!
//! The fixed, ordered set of expert roles a query can be routed to. The
//! catalog is built once at startup and shared read-only (`Arc<RoleCatalog>`)
//! by every request.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// One expert role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Single-digit identifier the selector emits
    pub id: String,
    /// Display name surfaced to callers
    pub name: String,
    /// Shown to the selector
    pub short_description: String,
    /// Shown to the answer generator
    pub long_instructions: String,
}

impl RoleEntry {
    pub fn new(id: &str, name: &str, short_description: &str, long_instructions: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            short_description: short_description.to_string(),
            long_instructions: long_instructions.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("role catalog must contain at least one role")]
    Empty,
    #[error("role id '{0}' must be a single digit 1-9")]
    InvalidId(String),
    #[error("duplicate role id '{0}'")]
    DuplicateId(String),
}

/// Ordered, non-empty catalog of roles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCatalog {
    roles: Vec<RoleEntry>,
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self {
            roles: vec![
                RoleEntry::new(
                    "1",
                    "General Knowledge Expert",
                    "Answers general questions across a wide range of topics",
                    "Provide accurate, easy-to-follow answers to general questions from any field.",
                ),
                RoleEntry::new(
                    "2",
                    "Generative AI Product Expert",
                    "Answers specialist questions about generative AI, related products and technology",
                    "Answer specialist questions about generative AI, related products and technology with current information and deep insight.",
                ),
                RoleEntry::new(
                    "3",
                    "Counselor",
                    "Supports people with personal worries and psychological difficulties",
                    "Respond to personal worries and psychological difficulties with empathy and support, offering suitable advice where possible.",
                ),
            ],
        }
    }
}

impl RoleCatalog {
    /// Build a catalog; ids must be unique single digits
    pub fn new(roles: Vec<RoleEntry>) -> Result<Self, CatalogError> {
        if roles.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (i, role) in roles.iter().enumerate() {
            let is_digit = role.id.len() == 1 && role.id.chars().all(|c| matches!(c, '1'..='9'));
            if !is_digit {
                return Err(CatalogError::InvalidId(role.id.clone()));
            }
            if roles[..i].iter().any(|r| r.id == role.id) {
                return Err(CatalogError::DuplicateId(role.id.clone()));
            }
        }
        Ok(Self { roles })
    }

    pub fn roles(&self) -> &[RoleEntry] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// First entry, the deterministic fallback
    pub fn first(&self) -> &RoleEntry {
        // Construction guarantees at least one role
        &self.roles[0]
    }

    pub fn get(&self, id: &str) -> Option<&RoleEntry> {
        self.roles.iter().find(|r| r.id == id)
    }

    /// Resolve a raw selector response to a role.
    ///
    /// The first catalog id appearing anywhere in the text wins; text with
    /// no catalog id resolves to [`RoleCatalog::first`]. Never fails.
    pub fn resolve(&self, raw: &str) -> &RoleEntry {
        static DIGIT: OnceLock<Regex> = OnceLock::new();
        let digit = DIGIT.get_or_init(|| Regex::new(r"[1-9]").expect("static regex"));

        digit
            .find_iter(raw)
            .find_map(|m| self.get(m.as_str()))
            .unwrap_or_else(|| self.first())
    }

    /// `id: name: short description` lines for the selector prompt
    pub fn selection_menu(&self) -> String {
        self.roles
            .iter()
            .map(|r| format!("{}: {}: {}", r.id, r.name, r.short_description))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// `- name: instructions` lines for the answer prompt
    pub fn instruction_digest(&self) -> String {
        self.roles
            .iter()
            .map(|r| format!("- {}: {}", r.name, r.long_instructions))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Slash-separated ids, e.g. `1/2/3`
    pub fn id_list(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.id.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_order() {
        let catalog = RoleCatalog::default();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.first().name, "General Knowledge Expert");
        assert_eq!(catalog.id_list(), "1/2/3");
    }

    #[test]
    fn test_resolve_picks_first_catalog_digit() {
        let catalog = RoleCatalog::default();
        assert_eq!(catalog.resolve("2").name, "Generative AI Product Expert");
        assert_eq!(catalog.resolve(" 3.").name, "Counselor");
        assert_eq!(catalog.resolve("Role 2, maybe 3").id, "2");
        // 7 is not a catalog id, so scanning continues to 3
        assert_eq!(catalog.resolve("7 or 3").id, "3");
    }

    #[test]
    fn test_resolve_defaults_to_first_role() {
        let catalog = RoleCatalog::default();
        assert_eq!(catalog.resolve("").id, "1");
        assert_eq!(catalog.resolve("counselor please").id, "1");
        assert_eq!(catalog.resolve("9").id, "1");
    }

    #[test]
    fn test_catalog_validation() {
        assert_eq!(RoleCatalog::new(vec![]), Err(CatalogError::Empty));

        let bad = RoleEntry::new("10", "x", "y", "z");
        assert_eq!(
            RoleCatalog::new(vec![bad]),
            Err(CatalogError::InvalidId("10".into()))
        );

        let a = RoleEntry::new("1", "a", "a", "a");
        let b = RoleEntry::new("1", "b", "b", "b");
        assert_eq!(
            RoleCatalog::new(vec![a, b]),
            Err(CatalogError::DuplicateId("1".into()))
        );
    }

    #[test]
    fn test_selection_menu_lists_every_role() {
        let menu = RoleCatalog::default().selection_menu();
        assert_eq!(menu.lines().count(), 3);
        assert!(menu.starts_with("1: General Knowledge Expert:"));
    }
}
