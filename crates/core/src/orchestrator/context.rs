//! # Request Context
//!
//! Per-request state threaded through the pipeline. Created once per query,
//! owned by a single orchestrator run and dropped with the response.

/// Quality retries allowed beyond the first answer
pub const MAX_QUALITY_RETRIES: u32 = 1;

/// Prefix of the judgement note appended to `extra_context` on retry
pub const QUALITY_FEEDBACK_MARKER: &str = "Quality feedback:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    query: String,
    selected_role: String,
    answers: Vec<String>,
    quality_passed: bool,
    quality_reason: String,
    retry_count: u32,
    max_retries: u32,
    needs_clarification: bool,
    clarifying_questions: Vec<String>,
    supplied_clarifications: Option<Vec<String>>,
    extra_context: String,
    image_description: String,
}

impl RequestContext {
    /// An empty list counts as none. Any non-empty list counts as supplied,
    /// though blank entries are not folded into `extra_context`.
    pub fn new(query: impl Into<String>, clarifications: Option<Vec<String>>) -> Self {
        let supplied_clarifications = clarifications
            .filter(|list| !list.is_empty())
            .map(|list| {
                list.into_iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            });

        Self {
            query: query.into(),
            selected_role: String::new(),
            answers: Vec::new(),
            quality_passed: false,
            quality_reason: String::new(),
            retry_count: 0,
            max_retries: MAX_QUALITY_RETRIES,
            needs_clarification: false,
            clarifying_questions: Vec::new(),
            supplied_clarifications,
            extra_context: String::new(),
            image_description: String::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn selected_role(&self) -> &str {
        &self.selected_role
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Most recent answer, the current candidate
    pub fn current_answer(&self) -> Option<&str> {
        self.answers.last().map(String::as_str)
    }

    pub fn quality_passed(&self) -> bool {
        self.quality_passed
    }

    pub fn quality_reason(&self) -> &str {
        &self.quality_reason
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn needs_clarification(&self) -> bool {
        self.needs_clarification
    }

    pub fn clarifying_questions(&self) -> &[String] {
        &self.clarifying_questions
    }

    pub fn supplied_clarifications(&self) -> Option<&[String]> {
        self.supplied_clarifications.as_deref()
    }

    pub fn has_clarifications(&self) -> bool {
        self.supplied_clarifications.is_some()
    }

    pub fn extra_context(&self) -> &str {
        &self.extra_context
    }

    pub fn image_description(&self) -> &str {
        &self.image_description
    }

    pub fn set_image_description(&mut self, description: impl Into<String>) {
        self.image_description = description.into();
    }

    /// Set the routed role. Only the first call takes effect.
    pub fn set_role(&mut self, role: impl Into<String>) {
        if self.selected_role.is_empty() {
            self.selected_role = role.into();
        } else {
            tracing::warn!(role = %self.selected_role, "Role already selected; ignoring reselection");
        }
    }

    /// Append supplied clarification answers to `extra_context`, one per line
    pub fn fold_clarifications(&mut self) {
        if let Some(clarifications) = &self.supplied_clarifications {
            let joined = clarifications.join("\n");
            self.append_context(&joined);
        }
    }

    pub fn record_sufficiency(&mut self, needs_clarification: bool, questions: Vec<String>) {
        self.needs_clarification = needs_clarification;
        self.clarifying_questions = if needs_clarification {
            questions
        } else {
            Vec::new()
        };
    }

    pub fn push_answer(&mut self, answer: impl Into<String>) {
        self.answers.push(answer.into());
    }

    pub fn record_judgement(&mut self, passed: bool, reason: impl Into<String>) {
        self.quality_passed = passed;
        self.quality_reason = reason.into();
    }

    /// True while another answering attempt is allowed
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Count a retry and append the last judgement reason to `extra_context`.
    ///
    /// Returns false, changing nothing, once the retry ceiling is reached.
    pub fn begin_retry(&mut self) -> bool {
        if !self.can_retry() {
            return false;
        }
        self.retry_count += 1;
        if !self.quality_reason.trim().is_empty() {
            let note = format!("{} {}", QUALITY_FEEDBACK_MARKER, self.quality_reason.trim());
            self.append_context(&note);
        }
        true
    }

    /// `extra_context` only ever grows
    fn append_context(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.extra_context.is_empty() {
            self.extra_context.push('\n');
        }
        self.extra_context.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_defaults() {
        let ctx = RequestContext::new("q", None);
        assert_eq!(ctx.query(), "q");
        assert!(ctx.selected_role().is_empty());
        assert!(ctx.answers().is_empty());
        assert_eq!(ctx.retry_count(), 0);
        assert_eq!(ctx.max_retries(), 1);
        assert!(!ctx.has_clarifications());
    }

    #[test]
    fn test_only_empty_clarification_list_counts_as_none() {
        let ctx = RequestContext::new("q", Some(vec![]));
        assert!(!ctx.has_clarifications());

        let mut ctx = RequestContext::new("q", Some(vec!["  ".into(), "".into()]));
        assert!(ctx.has_clarifications());
        ctx.fold_clarifications();
        assert!(ctx.extra_context().is_empty());

        let ctx = RequestContext::new("q", Some(vec![" Kyoto ".into(), "".into()]));
        assert_eq!(ctx.supplied_clarifications(), Some(&["Kyoto".to_string()][..]));
    }

    #[test]
    fn test_fold_clarifications_joins_lines() {
        let mut ctx = RequestContext::new("q", Some(vec!["answer1".into(), "answer2".into()]));
        ctx.fold_clarifications();
        assert_eq!(ctx.extra_context(), "answer1\nanswer2");
    }

    #[test]
    fn test_role_is_set_once() {
        let mut ctx = RequestContext::new("q", None);
        ctx.set_role("Counselor");
        ctx.set_role("Other");
        assert_eq!(ctx.selected_role(), "Counselor");
    }

    #[test]
    fn test_retry_appends_feedback_and_is_bounded() {
        let mut ctx = RequestContext::new("q", Some(vec!["ctx".into()]));
        ctx.fold_clarifications();
        ctx.record_judgement(false, "Missing sources");

        assert!(ctx.begin_retry());
        assert_eq!(ctx.retry_count(), 1);
        assert_eq!(ctx.extra_context(), "ctx\nQuality feedback: Missing sources");

        ctx.record_judgement(false, "Still vague");
        assert!(!ctx.can_retry());
        assert!(!ctx.begin_retry());
        assert_eq!(ctx.retry_count(), 1);
        assert_eq!(ctx.extra_context(), "ctx\nQuality feedback: Missing sources");
    }

    #[test]
    fn test_questions_cleared_when_sufficient() {
        let mut ctx = RequestContext::new("q", None);
        ctx.record_sufficiency(false, vec!["ignored".into()]);
        assert!(ctx.clarifying_questions().is_empty());

        ctx.record_sufficiency(true, vec!["Budget?".into()]);
        assert!(ctx.needs_clarification());
        assert_eq!(ctx.clarifying_questions(), ["Budget?".to_string()]);
    }
}
