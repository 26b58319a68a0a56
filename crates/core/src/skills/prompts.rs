//! Prompt templates bundled at compile time.
//!
//! Templates use `{name}` placeholders filled by [`render`].

/// Single image description
pub const IMAGE_SINGLE: &str = include_str!("defaults/image_single.md");

/// Batched multi-image description
pub const IMAGE_MULTI: &str = include_str!("defaults/image_multi.md");

/// Role selector - emits one catalog digit
pub const ROLE_SELECTOR: &str = include_str!("defaults/role_selector.md");

/// Sufficiency checker - decides whether to ask clarifying questions
pub const SUFFICIENCY: &str = include_str!("defaults/sufficiency.md");

/// Answer generator
pub const ANSWER: &str = include_str!("defaults/answer.md");

/// Quality judge
pub const JUDGE: &str = include_str!("defaults/judge.md");

/// All templates with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("image_single", IMAGE_SINGLE),
        ("image_multi", IMAGE_MULTI),
        ("role_selector", ROLE_SELECTOR),
        ("sufficiency", SUFFICIENCY),
        ("answer", ANSWER),
        ("judge", JUDGE),
    ]
}

/// Fill `{name}` placeholders in a single pass.
///
/// Substituted values are never rescanned, so user text containing braces is
/// inserted verbatim. Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
