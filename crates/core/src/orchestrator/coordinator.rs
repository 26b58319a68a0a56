//! # Orchestrator
//!
//! Drives one request through image fusion, role selection, the sufficiency
//! check and the answer/judge loop. The orchestrator itself is immutable and
//! shared across requests; all request state lives in a [`RequestContext`]
//! owned by the running call.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::completion::{CallOptions, CompletionClient, CompletionError, ImagePayload};
use crate::roles::RoleCatalog;
use crate::skills::{
    AnswerInput, AnswerSkill, ImageAnalysis, ImageSkill, JudgeSkill, RoleSkill, SufficiencySkill,
};

use super::context::RequestContext;
use super::events::{EventSink, PipelineEvent, PipelineEventKind};
use super::pipeline::{Pipeline, PipelineStage};

/// Role reported when image analysis aborts the request
pub const IMAGE_FAILURE_ROLE: &str = "error";

/// Reason reported when image analysis aborts the request
pub const IMAGE_FAILURE_REASON: &str = "image analysis failed";

/// Tunables for the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Skip the sufficiency call entirely when clarifications were supplied
    #[serde(default)]
    pub skip_sufficiency_on_followup: bool,
    /// Optional cap on answer length
    #[serde(default)]
    pub max_answer_tokens: Option<u32>,
}

/// One inbound query
#[derive(Debug, Clone, Default)]
pub struct AskRequest {
    pub query: String,
    /// Caller's answers to a previous round's clarifying questions
    pub clarifications: Option<Vec<String>>,
    /// Attached images in presentation order
    pub images: Vec<ImagePayload>,
}

impl AskRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_clarifications(mut self, clarifications: Vec<String>) -> Self {
        self.clarifications = Some(clarifications);
        self
    }

    pub fn with_images(mut self, images: Vec<ImagePayload>) -> Self {
        self.images = images;
        self
    }
}

/// Terminal outcome of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineResult {
    /// More input needed before answering
    NeedsClarification { role: String, questions: Vec<String> },
    /// Best available answer with its last verdict, passed or not
    Answered {
        role: String,
        answer: String,
        judge: bool,
        reason: String,
        /// Answer generations performed (1 or 2)
        attempts: usize,
    },
    /// Image analysis failed; no other stage ran
    ImageAnalysisFailed { detail: String },
}

impl PipelineResult {
    pub fn needs_clarification(&self) -> bool {
        matches!(self, PipelineResult::NeedsClarification { .. })
    }

    pub fn role(&self) -> &str {
        match self {
            PipelineResult::NeedsClarification { role, .. }
            | PipelineResult::Answered { role, .. } => role,
            PipelineResult::ImageAnalysisFailed { .. } => IMAGE_FAILURE_ROLE,
        }
    }

    pub fn questions(&self) -> Option<&[String]> {
        match self {
            PipelineResult::NeedsClarification { questions, .. } => Some(questions),
            _ => None,
        }
    }

    /// Answer text; for an image failure this describes the failure
    pub fn answer(&self) -> Option<String> {
        match self {
            PipelineResult::NeedsClarification { .. } => None,
            PipelineResult::Answered { answer, .. } => Some(answer.clone()),
            PipelineResult::ImageAnalysisFailed { detail } => {
                Some(format!("Image analysis failed: {}", detail))
            }
        }
    }

    pub fn judge(&self) -> Option<bool> {
        match self {
            PipelineResult::NeedsClarification { .. } => None,
            PipelineResult::Answered { judge, .. } => Some(*judge),
            PipelineResult::ImageAnalysisFailed { .. } => Some(false),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            PipelineResult::NeedsClarification { .. } => None,
            PipelineResult::Answered { reason, .. } => Some(reason),
            PipelineResult::ImageAnalysisFailed { .. } => Some(IMAGE_FAILURE_REASON),
        }
    }
}

/// Backend failure outside image analysis, tagged with where it happened
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: CompletionError,
}

/// The request orchestrator
pub struct Orchestrator {
    client: Arc<dyn CompletionClient>,
    catalog: Arc<RoleCatalog>,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(client: Arc<dyn CompletionClient>, catalog: Arc<RoleCatalog>) -> Self {
        Self {
            client,
            catalog,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request
    pub async fn run(&self, request: AskRequest) -> Result<PipelineResult, PipelineError> {
        self.execute(request, EventSink::new(None)).await
    }

    /// Run one request, streaming progress events to `tx`
    pub async fn run_with_events(
        &self,
        request: AskRequest,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineResult, PipelineError> {
        self.execute(request, EventSink::new(Some(tx))).await
    }

    #[tracing::instrument(
        name = "pipeline",
        skip(self, request, sink),
        fields(
            query_preview = %request.query.chars().take(50).collect::<String>(),
            images = request.images.len()
        )
    )]
    async fn execute(
        &self,
        request: AskRequest,
        mut sink: EventSink,
    ) -> Result<PipelineResult, PipelineError> {
        let client = self.client.as_ref();
        let mut ctx = RequestContext::new(request.query, request.clarifications);
        let images = request.images;
        let mut pipeline = Pipeline::new();
        let mut image_failure = None;

        sink.emit(PipelineEventKind::PipelineStarted, PipelineStage::Start, None)
            .await;

        while !pipeline.is_complete() {
            let stage = pipeline.stage();
            match stage {
                PipelineStage::Start => pipeline.advance(),

                PipelineStage::ImageFusion => {
                    if images.is_empty() {
                        pipeline.advance();
                        continue;
                    }
                    sink.emit(PipelineEventKind::StageStarted, stage, None).await;
                    match ImageSkill::run(client, &images).await {
                        ImageAnalysis::Described(description) => {
                            ctx.set_image_description(description);
                            sink.emit(PipelineEventKind::StageCompleted, stage, None)
                                .await;
                            pipeline.advance();
                        }
                        ImageAnalysis::Failed(detail) => {
                            sink.emit(
                                PipelineEventKind::ImageAnalysisFailed,
                                stage,
                                Some(serde_json::json!({ "error": detail })),
                            )
                            .await;
                            image_failure = Some(detail);
                            pipeline.fail();
                        }
                    }
                }

                PipelineStage::RoleSelection => {
                    sink.emit(PipelineEventKind::StageStarted, stage, None).await;
                    let role = match RoleSkill::run(client, &self.catalog, ctx.query()).await {
                        Ok(role) => role,
                        Err(e) => return Err(fail(&mut sink, stage, e).await),
                    };
                    tracing::info!(role = %role.name, "Role selected");
                    ctx.set_role(role.name.clone());
                    sink.emit(
                        PipelineEventKind::StageCompleted,
                        stage,
                        Some(serde_json::json!({ "role": role.name })),
                    )
                    .await;
                    pipeline.advance();
                }

                PipelineStage::SufficiencyCheck => {
                    ctx.fold_clarifications();

                    if ctx.has_clarifications() && self.config.skip_sufficiency_on_followup {
                        tracing::info!("Clarifications supplied; skipping sufficiency check");
                        pipeline.advance();
                        continue;
                    }

                    sink.emit(PipelineEventKind::StageStarted, stage, None).await;
                    let decision = match SufficiencySkill::run(
                        client,
                        ctx.query(),
                        ctx.extra_context(),
                        ctx.selected_role(),
                    )
                    .await
                    {
                        Ok(decision) => decision,
                        Err(e) => return Err(fail(&mut sink, stage, e).await),
                    };
                    ctx.record_sufficiency(decision.need, decision.questions);
                    sink.emit(
                        PipelineEventKind::StageCompleted,
                        stage,
                        Some(serde_json::json!({ "need": ctx.needs_clarification() })),
                    )
                    .await;

                    if ctx.needs_clarification() && !ctx.has_clarifications() {
                        tracing::info!(
                            questions = ctx.clarifying_questions().len(),
                            "Requesting clarification"
                        );
                        sink.emit(
                            PipelineEventKind::ClarificationRequested,
                            stage,
                            Some(serde_json::json!({
                                "questions": ctx.clarifying_questions()
                            })),
                        )
                        .await;
                        pipeline.request_clarification();
                    } else {
                        if ctx.needs_clarification() {
                            tracing::info!(
                                "Still insufficient after clarifications; answering anyway"
                            );
                        }
                        pipeline.advance();
                    }
                }

                PipelineStage::Answering => {
                    sink.emit(
                        PipelineEventKind::StageStarted,
                        stage,
                        Some(serde_json::json!({ "attempt": ctx.answers().len() + 1 })),
                    )
                    .await;
                    let feedback = (ctx.retry_count() > 0).then(|| ctx.quality_reason());
                    let input = AnswerInput {
                        role: ctx.selected_role(),
                        query: ctx.query(),
                        image_description: ctx.image_description(),
                        extra_context: ctx.extra_context(),
                        feedback,
                    };
                    let options = CallOptions {
                        max_tokens: self.config.max_answer_tokens,
                    };
                    let answer =
                        match AnswerSkill::run(client, &self.catalog, input, options).await {
                            Ok(answer) => answer,
                            Err(e) => return Err(fail(&mut sink, stage, e).await),
                        };
                    ctx.push_answer(answer);
                    sink.emit(PipelineEventKind::StageCompleted, stage, None)
                        .await;
                    pipeline.advance();
                }

                PipelineStage::Judging => {
                    sink.emit(PipelineEventKind::StageStarted, stage, None).await;
                    let answer = ctx.current_answer().unwrap_or_default();
                    let judgement = match JudgeSkill::run(
                        client,
                        ctx.query(),
                        ctx.extra_context(),
                        ctx.selected_role(),
                        answer,
                    )
                    .await
                    {
                        Ok(judgement) => judgement,
                        Err(e) => return Err(fail(&mut sink, stage, e).await),
                    };
                    ctx.record_judgement(judgement.judge, judgement.reason);
                    sink.emit(
                        PipelineEventKind::StageCompleted,
                        stage,
                        Some(serde_json::json!({
                            "passed": ctx.quality_passed(),
                            "reason": ctx.quality_reason()
                        })),
                    )
                    .await;
                    pipeline.judged(ctx.quality_passed(), ctx.can_retry());
                }

                PipelineStage::Retrying => {
                    ctx.begin_retry();
                    tracing::info!(retry = ctx.retry_count(), "Answer failed review; retrying");
                    sink.emit(
                        PipelineEventKind::RetryTriggered,
                        stage,
                        Some(serde_json::json!({
                            "retry_count": ctx.retry_count(),
                            "reason": ctx.quality_reason()
                        })),
                    )
                    .await;
                    pipeline.advance();
                }

                PipelineStage::ClarificationPending | PipelineStage::Done | PipelineStage::Failed => {}
            }
        }

        let result = match (pipeline.stage(), image_failure) {
            (PipelineStage::Failed, Some(detail)) => PipelineResult::ImageAnalysisFailed { detail },
            (PipelineStage::ClarificationPending, _) => PipelineResult::NeedsClarification {
                role: ctx.selected_role().to_string(),
                questions: ctx.clarifying_questions().to_vec(),
            },
            _ => PipelineResult::Answered {
                role: ctx.selected_role().to_string(),
                answer: ctx.current_answer().unwrap_or_default().to_string(),
                judge: ctx.quality_passed(),
                reason: ctx.quality_reason().to_string(),
                attempts: ctx.answers().len(),
            },
        };

        if let PipelineResult::Answered { judge, attempts, .. } = &result {
            tracing::info!(passed = judge, attempts, "Pipeline completed");
            sink.emit(
                PipelineEventKind::PipelineCompleted,
                pipeline.stage(),
                Some(serde_json::json!({ "passed": judge, "attempts": attempts })),
            )
            .await;
        }

        Ok(result)
    }
}

/// Emit a failure event and wrap the backend error
async fn fail(sink: &mut EventSink, stage: PipelineStage, source: CompletionError) -> PipelineError {
    tracing::warn!(%stage, "Backend call failed: {}", source);
    sink.emit(
        PipelineEventKind::PipelineFailed,
        stage,
        Some(serde_json::json!({ "error": source.to_string() })),
    )
    .await;
    PipelineError { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::context::QUALITY_FEEDBACK_MARKER;
    use crate::testing::{CallKind, ScriptedClient};

    const SUFFICIENCY: &str = "ClarifyDecision";
    const JUDGEMENT: &str = "Judgement";

    fn orchestrator(client: &Arc<ScriptedClient>) -> Orchestrator {
        Orchestrator::new(client.clone(), Arc::new(RoleCatalog::default()))
    }

    fn answer_calls(client: &ScriptedClient) -> usize {
        // Every text call after the role selector is an answer
        client.text_calls().saturating_sub(1)
    }

    #[tokio::test]
    async fn test_happy_path() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(false, &[])
                .text("Paris is the capital of France.")
                .judgement(true, "Direct and correct."),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("What is the capital of France?"))
            .await
            .unwrap();

        assert_eq!(
            result,
            PipelineResult::Answered {
                role: "General Knowledge Expert".into(),
                answer: "Paris is the capital of France.".into(),
                judge: true,
                reason: "Direct and correct.".into(),
                attempts: 1,
            }
        );
        assert_eq!(client.text_calls(), 2);
        assert_eq!(client.schema_calls(SUFFICIENCY), 1);
        assert_eq!(client.schema_calls(JUDGEMENT), 1);
        assert_eq!(client.vision_calls(), 0);
    }

    #[tokio::test]
    async fn test_happy_path_reports_failed_verdict_after_retry() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(false, &[])
                .text("first")
                .judgement(false, "Too short")
                .text("second")
                .judgement(false, "Still short"),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("What is the capital of France?"))
            .await
            .unwrap();

        assert!(!result.needs_clarification());
        assert_eq!(result.answer().as_deref(), Some("second"));
        assert_eq!(result.judge(), Some(false));
        assert_eq!(result.reason(), Some("Still short"));
    }

    #[tokio::test]
    async fn test_clarification_short_circuits() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(true, &["Which city?", "What dates?"]),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("Plan a trip for me"))
            .await
            .unwrap();

        assert_eq!(
            result,
            PipelineResult::NeedsClarification {
                role: "General Knowledge Expert".into(),
                questions: vec!["Which city?".into(), "What dates?".into()],
            }
        );
        assert!(result.answer().is_none());
        assert!(result.judge().is_none());
        assert_eq!(answer_calls(&client), 0);
        assert_eq!(client.schema_calls(JUDGEMENT), 0);
    }

    #[tokio::test]
    async fn test_empty_clarifications_still_ask() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(true, &["Which city?"]),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("Plan a trip").with_clarifications(vec![]))
            .await
            .unwrap();

        assert!(result.needs_clarification());
        assert!(result.questions().unwrap().len() <= 3);
    }

    #[tokio::test]
    async fn test_insufficiency_without_questions_still_stops() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(true, &[])
                .text("guessed answer")
                .judgement(true, "ok"),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("Plan a trip"))
            .await
            .unwrap();

        assert_eq!(
            result,
            PipelineResult::NeedsClarification {
                role: "General Knowledge Expert".into(),
                questions: vec![],
            }
        );
        assert_eq!(answer_calls(&client), 0);
        assert_eq!(client.schema_calls(JUDGEMENT), 0);
    }

    #[tokio::test]
    async fn test_blank_clarifications_still_proceed_to_answer() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(true, &["Which city?"])
                .text("Pick a city first; here are options.")
                .judgement(true, "ok"),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("Plan a trip").with_clarifications(vec!["  ".into()]))
            .await
            .unwrap();

        assert!(!result.needs_clarification());
        assert_eq!(
            result.answer().as_deref(),
            Some("Pick a city first; here are options.")
        );
        assert_eq!(answer_calls(&client), 1);
    }

    #[tokio::test]
    async fn test_clarification_round_trip() {
        // Round one: ambiguous query gets two questions back
        let first = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(true, &["Which city?", "What dates?"]),
        );
        let result = orchestrator(&first)
            .run(AskRequest::new("Plan a trip for me"))
            .await
            .unwrap();
        assert_eq!(result.questions().map(|q| q.len()), Some(2));

        // Round two: the backend still claims insufficiency, but we answer anyway
        let second = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(true, &["Budget?"])
                .text("Day 1: temples.")
                .judgement(true, "Good"),
        );
        let result = orchestrator(&second)
            .run(
                AskRequest::new("Plan a trip for me")
                    .with_clarifications(vec!["answer1".into(), "answer2".into()]),
            )
            .await
            .unwrap();

        assert!(!result.needs_clarification());
        assert_eq!(result.answer().as_deref(), Some("Day 1: temples."));

        let structured = second.calls_of(CallKind::Structured);
        assert!(structured[0].prompt.contains("answer1\nanswer2"));
        let answer_prompt = &second.calls_of(CallKind::Text)[1].prompt;
        assert!(answer_prompt.contains("answer1\nanswer2"));
    }

    #[tokio::test]
    async fn test_followup_can_skip_sufficiency_call() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("2")
                .text("Use a smaller model.")
                .judgement(true, "ok"),
        );
        let orchestrator = orchestrator(&client).with_config(PipelineConfig {
            skip_sufficiency_on_followup: true,
            ..PipelineConfig::default()
        });

        let result = orchestrator
            .run(AskRequest::new("Which LLM?").with_clarifications(vec!["cheap".into()]))
            .await
            .unwrap();

        assert_eq!(result.role(), "Generative AI Product Expert");
        assert_eq!(client.schema_calls(SUFFICIENCY), 0);
        assert!(client.calls_of(CallKind::Text)[1].prompt.contains("cheap"));
    }

    #[tokio::test]
    async fn test_single_retry_carries_feedback() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(false, &[])
                .text("Paris.")
                .judgement(false, "Add one supporting fact")
                .text("Paris, seat of the French government.")
                .judgement(true, "Better"),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("What is the capital of France?"))
            .await
            .unwrap();

        assert_eq!(
            result.answer().as_deref(),
            Some("Paris, seat of the French government.")
        );
        assert_eq!(result.judge(), Some(true));
        assert!(matches!(result, PipelineResult::Answered { attempts: 2, .. }));

        let texts = client.calls_of(CallKind::Text);
        assert!(!texts[1].prompt.contains("Quality feedback on the previous attempt"));
        assert!(texts[2].prompt.contains("Quality feedback on the previous attempt"));
        assert!(texts[2]
            .prompt
            .contains(&format!("{} Add one supporting fact", QUALITY_FEEDBACK_MARKER)));

        // The second judgement sees the accumulated context
        let judges = client.calls_of(CallKind::Structured);
        assert!(judges[2].prompt.contains("Add one supporting fact"));
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        // Queue more failing verdicts than the pipeline may consume
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(false, &[])
                .text("a1")
                .judgement(false, "bad")
                .text("a2")
                .judgement(false, "bad")
                .text("a3")
                .judgement(false, "bad"),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("q"))
            .await
            .unwrap();

        assert_eq!(result.answer().as_deref(), Some("a2"));
        assert_eq!(answer_calls(&client), 2);
        assert_eq!(client.schema_calls(JUDGEMENT), 2);
    }

    #[tokio::test]
    async fn test_answer_cap_applies_only_to_answer_calls() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(false, &[])
                .text("short")
                .judgement(true, "ok"),
        );
        let orchestrator = orchestrator(&client).with_config(PipelineConfig {
            max_answer_tokens: Some(256),
            ..PipelineConfig::default()
        });

        orchestrator.run(AskRequest::new("q")).await.unwrap();

        let texts = client.calls_of(CallKind::Text);
        assert_eq!(texts[0].max_tokens, Some(3));
        assert_eq!(texts[1].max_tokens, Some(256));
    }

    #[tokio::test]
    async fn test_role_default_on_garbage() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("I cannot decide")
                .sufficiency(false, &[])
                .text("answer")
                .judgement(true, "ok"),
        );

        let result = orchestrator(&client).run(AskRequest::new("q")).await.unwrap();
        assert_eq!(result.role(), "General Knowledge Expert");
    }

    #[tokio::test]
    async fn test_image_failure_short_circuits() {
        let client = Arc::new(
            ScriptedClient::new().vision_err(CompletionError::Status {
                status: 500,
                body: "vision backend down".into(),
            }),
        );

        let result = orchestrator(&client)
            .run(AskRequest::new("What is this?").with_images(vec![ImagePayload::jpeg(vec![1])]))
            .await
            .unwrap();

        assert!(!result.needs_clarification());
        assert_eq!(result.role(), IMAGE_FAILURE_ROLE);
        assert_eq!(result.judge(), Some(false));
        assert_eq!(result.reason(), Some(IMAGE_FAILURE_REASON));
        let answer = result.answer().unwrap();
        assert!(answer.contains("vision backend down"));
        assert_eq!(client.text_calls(), 0);
        assert_eq!(client.structured_calls(), 0);
    }

    #[tokio::test]
    async fn test_two_images_feed_the_answer() {
        let client = Arc::new(
            ScriptedClient::new()
                .vision("[Image 1] a receipt\n[Image 2] a menu")
                .text("1")
                .sufficiency(false, &[])
                .text("The receipt matches the menu.")
                .judgement(true, "ok"),
        );

        let images = vec![ImagePayload::jpeg(vec![1]), ImagePayload::jpeg(vec![2])];
        let result = orchestrator(&client)
            .run(AskRequest::new("Do these match?").with_images(images))
            .await
            .unwrap();

        assert_eq!(result.judge(), Some(true));
        let batched = client.calls_of(CallKind::Images);
        assert_eq!(batched.len(), 1);
        assert_eq!(batched[0].image_count, 2);
        let answer_prompt = &client.calls_of(CallKind::Text)[1].prompt;
        assert!(answer_prompt.contains("[Image 1] a receipt"));
        assert!(answer_prompt.contains("[Image 2] a menu"));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_with_stage() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .structured_err(CompletionError::Timeout(60)),
        );

        let err = orchestrator(&client)
            .run(AskRequest::new("q"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, PipelineStage::SufficiencyCheck);
        assert!(err.source.is_timeout());
        assert_eq!(answer_calls(&client), 0);
    }

    #[tokio::test]
    async fn test_events_trace_the_retry_loop() {
        let client = Arc::new(
            ScriptedClient::new()
                .text("1")
                .sufficiency(false, &[])
                .text("a1")
                .judgement(false, "bad")
                .text("a2")
                .judgement(true, "ok"),
        );
        let (tx, mut rx) = mpsc::channel(64);

        orchestrator(&client)
            .run_with_events(AskRequest::new("q"), tx)
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.first().unwrap().kind, PipelineEventKind::PipelineStarted);
        assert_eq!(events.last().unwrap().kind, PipelineEventKind::PipelineCompleted);
        let retries = events
            .iter()
            .filter(|e| e.kind == PipelineEventKind::RetryTriggered)
            .count();
        assert_eq!(retries, 1);
        let answering = events
            .iter()
            .filter(|e| {
                e.kind == PipelineEventKind::StageStarted && e.stage == PipelineStage::Answering
            })
            .count();
        assert_eq!(answering, 2);
        assert!(events.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    }
}
