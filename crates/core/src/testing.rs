//! Scripted completion backend for tests.
//!
//! Responses are queued per call kind and consumed in order; every call is
//! recorded so tests can assert how many times each stage hit the backend.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::completion::{
    CallOptions, CompletionClient, CompletionError, CompletionResult, ImagePayload,
    StructuredSchema,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Text,
    Structured,
    Image,
    Images,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub schema: Option<String>,
    pub image_count: usize,
}

#[derive(Default)]
pub struct ScriptedClient {
    text: Mutex<VecDeque<CompletionResult<String>>>,
    structured: Mutex<VecDeque<CompletionResult<serde_json::Value>>>,
    vision: Mutex<VecDeque<CompletionResult<String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(self, response: &str) -> Self {
        self.text.lock().unwrap().push_back(Ok(response.to_string()));
        self
    }

    pub fn text_err(self, err: CompletionError) -> Self {
        self.text.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn structured(self, value: serde_json::Value) -> Self {
        self.structured.lock().unwrap().push_back(Ok(value));
        self
    }

    pub fn structured_err(self, err: CompletionError) -> Self {
        self.structured.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn vision(self, response: &str) -> Self {
        self.vision
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
        self
    }

    pub fn vision_err(self, err: CompletionError) -> Self {
        self.vision.lock().unwrap().push_back(Err(err));
        self
    }

    /// Queue a sufficiency decision
    pub fn sufficiency(self, need: bool, questions: &[&str]) -> Self {
        self.structured(serde_json::json!({
            "need": need,
            "reasons": if need { vec!["missing detail"] } else { Vec::new() },
            "questions": questions,
        }))
    }

    /// Queue a quality judgement
    pub fn judgement(self, judge: bool, reason: &str) -> Self {
        self.structured(serde_json::json!({ "judge": judge, "reason": reason }))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect()
    }

    pub fn text_calls(&self) -> usize {
        self.calls_of(CallKind::Text).len()
    }

    pub fn structured_calls(&self) -> usize {
        self.calls_of(CallKind::Structured).len()
    }

    /// Structured calls made with the named schema
    pub fn schema_calls(&self, schema: &str) -> usize {
        self.calls_of(CallKind::Structured)
            .iter()
            .filter(|c| c.schema.as_deref() == Some(schema))
            .count()
    }

    pub fn vision_calls(&self) -> usize {
        self.calls_of(CallKind::Image).len() + self.calls_of(CallKind::Images).len()
    }

    fn record(
        &self,
        kind: CallKind,
        prompt: &str,
        max_tokens: Option<u32>,
        schema: Option<&str>,
        image_count: usize,
    ) {
        self.calls.lock().unwrap().push(RecordedCall {
            kind,
            prompt: prompt.to_string(),
            max_tokens,
            schema: schema.map(str::to_string),
            image_count,
        });
    }

    fn exhausted(kind: &str) -> CompletionError {
        CompletionError::MalformedResponse(format!("no scripted {} response left", kind))
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn generate_text(&self, prompt: &str, options: CallOptions) -> CompletionResult<String> {
        self.record(CallKind::Text, prompt, options.max_tokens, None, 0);
        self.text
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("text")))
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
    ) -> CompletionResult<serde_json::Value> {
        self.record(CallKind::Structured, prompt, None, Some(&schema.name), 0);
        self.structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("structured")))
    }

    async fn describe_image(&self, prompt: &str, _image: &ImagePayload) -> CompletionResult<String> {
        self.record(CallKind::Image, prompt, None, None, 1);
        self.vision
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("vision")))
    }

    async fn describe_images(
        &self,
        prompt: &str,
        images: &[ImagePayload],
    ) -> CompletionResult<String> {
        self.record(CallKind::Images, prompt, None, None, images.len());
        self.vision
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::exhausted("vision")))
    }
}
