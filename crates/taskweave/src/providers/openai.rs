use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::base::{
    ChatRequest, Completion, GeneratedImage, ImageRequest, LlmClient, TranscriptionRequest,
};
use super::configs::OpenAiProviderConfig;
use super::utils::{chat_request_to_payload, get_usage, openai_response_to_completion};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::{try_execute, ResultExt};
use crate::telemetry::TraceContext;

pub struct OpenAiClient {
    client: Client,
    config: OpenAiProviderConfig,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<GeneratedImage>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiProviderConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| PipelineError::execution("Build OpenAI client", e))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.host.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        if let Some(organization) = &self.config.organization {
            builder = builder.header("OpenAI-Organization", organization);
        }
        if let Some(project) = &self.config.project {
            builder = builder.header("OpenAI-Project", project);
        }
        builder
    }

    /// Read the body as JSON, turning error statuses into API errors
    async fn read_json(label: &str, response: Response) -> PipelineResult<Value> {
        let status = response.status();
        let body: Value = try_execute(label, response.json::<Value>()).await?;

        if status.is_success() {
            return Ok(body);
        }
        match body.get("error") {
            Some(error) => Err(PipelineError::domain(format!("OpenAI API error: {}", error))),
            None => Err(PipelineError::domain(format!("Request failed: {}", status))),
        }
    }

    async fn post(&self, label: &str, path: &str, payload: &Value) -> PipelineResult<Value> {
        let request = self.authorize(self.client.post(self.url(path))).json(payload);
        let response = try_execute(label, request.send()).await?;
        Self::read_json(label, response).await
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(
        &self,
        request: &ChatRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Completion> {
        let payload = chat_request_to_payload(request)?;
        let response = self
            .post("openai.chat.completions.create", "chat/completions", &payload)
            .await?;

        let completion = openai_response_to_completion(&response);

        if let (Some(trace), Ok(completion)) = (trace, &completion) {
            trace
                .record_generation(
                    "chat-completion",
                    &request.model,
                    &payload["messages"],
                    &json!(completion.content),
                    completion.usage.as_ref(),
                )
                .await;
        }

        completion.log_projection(|c| c.content.clone(), "Chat completion")
    }

    async fn transcribe(
        &self,
        request: TranscriptionRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<String> {
        info!(file = %request.file_name, model = %request.model, "transcribing audio");

        let part = Part::bytes(request.audio).file_name(request.file_name.clone());
        let mut form = Form::new()
            .part("file", part)
            .text("model", request.model.clone())
            .text("response_format", "json");
        if let Some(language) = &request.language {
            form = form.text("language", language.clone());
        }

        let builder = self
            .authorize(self.client.post(self.url("audio/transcriptions")))
            .multipart(form);
        let response = try_execute("OpenAI speech to text", builder.send()).await?;
        let body = Self::read_json("OpenAI speech to text", response).await?;
        let TranscriptionResponse { text } = crate::decode::decode(&body)?;

        if let Some(trace) = trace {
            trace
                .record_generation(
                    "transcription",
                    &request.model,
                    &json!({ "file": request.file_name }),
                    &json!(text),
                    None,
                )
                .await;
        }
        Ok(text)
    }

    async fn generate_image(
        &self,
        request: &ImageRequest,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<GeneratedImage> {
        let mut payload = json!({
            "model": request.model,
            "prompt": request.prompt,
            "n": 1,
            "response_format": "url",
        });
        if let Some(size) = &request.size {
            payload["size"] = json!(size);
        }

        let body = self
            .post("openai.images.create", "images/generations", &payload)
            .await?;
        let ImageResponse { data } = crate::decode::decode(&body)?;
        let image = data
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::domain("No image in response"))?;

        if let Some(trace) = trace {
            trace
                .record_generation(
                    "image-generation",
                    &request.model,
                    &json!(request.prompt),
                    &json!(image),
                    None,
                )
                .await;
        }
        Ok(image)
    }

    async fn embed(
        &self,
        model: &str,
        input: &[String],
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Vec<Vec<f32>>> {
        let payload = json!({ "model": model, "input": input });
        let body = self
            .post("openai.embeddings.create", "embeddings", &payload)
            .await?;
        let EmbeddingResponse { mut data } = crate::decode::decode(&body)?;
        data.sort_by_key(|d| d.index);

        if let Some(trace) = trace {
            trace
                .record_generation(
                    "embedding",
                    model,
                    &json!(input),
                    &json!({ "vectors": data.len() }),
                    get_usage(&body).as_ref(),
                )
                .await;
        }
        info!(count = data.len(), "Embeddings created");
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}
