use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::decode;
use crate::errors::{PipelineError, PipelineResult};
use crate::models::message::Message;
use crate::pipeline::{try_execute_sync, ResultExt};
use crate::telemetry::TraceContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
/// How the model is asked to shape its reply
pub enum ResponseFormat {
    Text,
    JsonObject,
    /// `json_schema` is passed through as given: `{"name": ..., "schema": ..., "strict": ...}`
    JsonSchema { json_schema: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub response_format: Option<ResponseFormat>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl ChatRequest {
    pub fn new<S: Into<String>>(model: S, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            response_format: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    FunctionCall,
    #[serde(other)]
    Other,
}

/// The first choice of a chat completion that was not cut short
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    pub file_name: String,
    pub model: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: Option<String>,
    pub revised_prompt: Option<String>,
}

/// Base trait for LLM services speaking the OpenAI protocol
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run a chat completion and return its first choice
    async fn complete(
        &self,
        request: &ChatRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Completion>;

    /// Speech to text
    async fn transcribe(
        &self,
        request: TranscriptionRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<String>;

    async fn generate_image(
        &self,
        request: &ImageRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<GeneratedImage>;

    /// One vector per input, in input order
    async fn embed(
        &self,
        model: &str,
        input: &[String],
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Vec<Vec<f32>>>;

    /// Text of a completion that stopped naturally
    async fn completion_with_text(
        &self,
        request: &ChatRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<String> {
        let completion = self.complete(request, trace).await?;
        let text = match completion.finish_reason {
            FinishReason::Stop => Ok(completion.content.unwrap_or_default()),
            _ => Err(PipelineError::domain("No text content in response")),
        };
        text.log_pipe("Chat completion text")
    }
}

/// Complete, parse the reply as JSON and decode it into `T`
pub async fn completion_with_json<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: &ChatRequest,
    trace: Option<&TraceContext>,
) -> PipelineResult<T> {
    let text = client.completion_with_text(request, trace).await?;
    let value: Value = try_execute_sync("Parse JSON", || serde_json::from_str(&text))?;
    decode(&value)
}

/// Embed a single text
pub async fn embed_one(
    client: &dyn LlmClient,
    model: &str,
    text: &str,
    trace: Option<&TraceContext>,
) -> PipelineResult<Vec<f32>> {
    client
        .embed(model, &[text.to_string()], trace)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::domain("No embeddings in response"))
}
