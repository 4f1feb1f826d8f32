use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::errors::PipelineResult;
use crate::providers::base::{
    ChatRequest, Completion, FinishReason, GeneratedImage, ImageRequest, LlmClient,
    TranscriptionRequest,
};
use crate::telemetry::TraceContext;

/// A mock LLM that returns pre-configured completions and records what it was asked
pub struct MockLlm {
    responses: Mutex<VecDeque<Completion>>,
    fallback: Option<Completion>,
    requests: Mutex<Vec<ChatRequest>>,
    embeddings: Mutex<VecDeque<Vec<f32>>>,
}

fn stop(text: &str) -> Completion {
    Completion {
        content: Some(text.to_string()),
        finish_reason: FinishReason::Stop,
        usage: None,
    }
}

impl MockLlm {
    /// Create a mock with a sequence of responses
    pub fn new(responses: Vec<Completion>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            embeddings: Mutex::new(VecDeque::new()),
        }
    }

    /// Responses that all stopped naturally with the given texts
    pub fn with_texts<'a, I: IntoIterator<Item = &'a str>>(texts: I) -> Self {
        Self::new(texts.into_iter().map(stop).collect())
    }

    /// Answer every request with the same text
    pub fn repeating(text: &str) -> Self {
        Self {
            fallback: Some(stop(text)),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_embeddings(self, embeddings: Vec<Vec<f32>>) -> Self {
        *self.embeddings.lock().unwrap() = embeddings.into();
        self
    }

    /// Number of chat completions served so far
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        request: &ChatRequest,
        _trace: Option<&TraceContext>,
    ) -> PipelineResult<Completion> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        // Empty reply once the script runs out
        Ok(next
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| stop("")))
    }

    async fn transcribe(
        &self,
        request: TranscriptionRequest,
        _trace: Option<&TraceContext>,
    ) -> PipelineResult<String> {
        Ok(format!("transcript of {}", request.file_name))
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
        _trace: Option<&TraceContext>,
    ) -> PipelineResult<GeneratedImage> {
        Ok(GeneratedImage {
            url: Some(format!("https://images.example/{}.png", request.model)),
            revised_prompt: None,
        })
    }

    async fn embed(
        &self,
        _model: &str,
        input: &[String],
        _trace: Option<&TraceContext>,
    ) -> PipelineResult<Vec<Vec<f32>>> {
        let mut queue = self.embeddings.lock().unwrap();
        Ok(input.iter().filter_map(|_| queue.pop_front()).collect())
    }
}
