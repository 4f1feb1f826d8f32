//! Traces and spans around units of work.
//!
//! Every scope is mirrored as a `tracing` span. When a Langfuse client is configured the
//! same scopes are also buffered as ingestion events and shipped when the top-level
//! trace completes.
pub mod langfuse;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::LangfuseSettings;
use crate::errors::PipelineResult;
use crate::providers::base::Usage;
use langfuse::{IngestionEvent, LangfuseClient};

/// Entry point for tracing a pipeline run
#[derive(Clone, Default)]
pub struct Tracer {
    client: Option<Arc<LangfuseClient>>,
}

impl Tracer {
    /// Local `tracing` output only
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn langfuse(settings: LangfuseSettings) -> PipelineResult<Self> {
        Ok(Self {
            client: Some(Arc::new(LangfuseClient::new(settings)?)),
        })
    }

    pub fn from_settings(settings: Option<&LangfuseSettings>) -> PipelineResult<Self> {
        match settings {
            Some(settings) => Self::langfuse(settings.clone()),
            None => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Run `f` under a fresh trace and flush the collected events afterwards.
    ///
    /// On success a flush failure becomes the result. On failure the flush is best effort
    /// and the error of `f` is returned.
    pub async fn with_trace<T, F, Fut>(&self, name: &str, f: F) -> PipelineResult<T>
    where
        F: FnOnce(TraceContext) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let context = TraceContext {
            trace_id: Uuid::new_v4().to_string(),
            parent_id: None,
            client: self.client.clone(),
        };
        let session_id = Uuid::new_v4().to_string();

        context
            .emit(IngestionEvent::new(
                "trace-create",
                json!({
                    "id": context.trace_id,
                    "name": name,
                    "sessionId": session_id,
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            ))
            .await;

        let span = info_span!("trace", scope = name, trace_id = %context.trace_id);
        let result = f(context).instrument(span).await;

        let Some(client) = &self.client else {
            return result;
        };

        match result {
            Ok(value) => {
                client.flush().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(flush_err) = client.flush().await {
                    warn!(error = %flush_err, "failed to flush trace of a failed pipeline");
                }
                Err(err)
            }
        }
    }
}

/// Handle to the current trace, passed down to traced operations
#[derive(Clone)]
pub struct TraceContext {
    trace_id: String,
    parent_id: Option<String>,
    client: Option<Arc<LangfuseClient>>,
}

impl TraceContext {
    /// A context that records nothing remotely
    pub fn detached() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            parent_id: None,
            client: None,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    async fn emit(&self, event: IngestionEvent) {
        if let Some(client) = &self.client {
            client.enqueue(event).await;
        }
    }

    /// Record `input`, run `f`, and on success end the span with its output.
    ///
    /// `f` receives the input back together with a context parented to the new span.
    pub async fn with_span<I, O, F, Fut>(&self, name: &str, input: I, f: F) -> PipelineResult<O>
    where
        I: Serialize,
        O: Serialize,
        F: FnOnce(I, TraceContext) -> Fut,
        Fut: Future<Output = PipelineResult<O>>,
    {
        let span_id = Uuid::new_v4().to_string();
        self.emit(IngestionEvent::new(
            "span-create",
            json!({
                "id": span_id,
                "traceId": self.trace_id,
                "parentObservationId": self.parent_id,
                "name": name,
                "startTime": Utc::now().to_rfc3339(),
                "input": to_json(&input),
            }),
        ))
        .await;

        let child = TraceContext {
            trace_id: self.trace_id.clone(),
            parent_id: Some(span_id.clone()),
            client: self.client.clone(),
        };
        let result = f(input, child)
            .instrument(info_span!("span", scope = name, span_id = %span_id))
            .await;

        if let Ok(output) = &result {
            self.emit(IngestionEvent::new(
                "span-update",
                json!({
                    "id": span_id,
                    "traceId": self.trace_id,
                    "endTime": Utc::now().to_rfc3339(),
                    "output": to_json(output),
                }),
            ))
            .await;
        }
        result
    }

    /// Record one model call
    pub async fn record_generation(
        &self,
        name: &str,
        model: &str,
        input: &Value,
        output: &Value,
        usage: Option<&Usage>,
    ) {
        let now = Utc::now().to_rfc3339();
        self.emit(IngestionEvent::new(
            "generation-create",
            json!({
                "id": Uuid::new_v4().to_string(),
                "traceId": self.trace_id,
                "parentObservationId": self.parent_id,
                "name": name,
                "model": model,
                "startTime": now,
                "endTime": now,
                "input": input,
                "output": output,
                "usage": usage.map(|u| json!({
                    "input": u.input_tokens,
                    "output": u.output_tokens,
                    "total": u.total_tokens,
                })),
            }),
        ))
        .await;
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(host: String) -> LangfuseSettings {
        LangfuseSettings {
            host,
            public_key: "pk".to_string(),
            secret_key: "sk".to_string(),
        }
    }

    async fn ingested_types(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .flat_map(|request| {
                let body: Value = serde_json::from_slice(&request.body).unwrap();
                body["batch"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|event| event["type"].as_str().unwrap().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[tokio::test]
    async fn test_disabled_tracer_passes_results_through() {
        let tracer = Tracer::disabled();

        let ok = tracer
            .with_trace("numbers", |trace| async move {
                trace
                    .with_span("double", 21, |n, _| async move { Ok(n * 2) })
                    .await
            })
            .await;
        assert_eq!(ok.unwrap(), 42);

        let err = tracer
            .with_trace("numbers", |_| async {
                Err::<u32, _>(PipelineError::domain("Answer not found"))
            })
            .await;
        assert_eq!(err.unwrap_err().to_string(), "Answer not found");
    }

    #[tokio::test]
    async fn test_span_ends_only_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .respond_with(ResponseTemplate::new(207).set_body_json(json!({"errors": []})))
            .mount(&server)
            .await;
        let tracer = Tracer::langfuse(settings(server.uri())).unwrap();

        let result = tracer
            .with_trace("calibration", |trace| async move {
                trace
                    .with_span("fix", "input", |_, _| async {
                        Err::<String, _>(PipelineError::domain("bad calibration"))
                    })
                    .await
            })
            .await;

        assert_eq!(result.unwrap_err().to_string(), "bad calibration");
        assert_eq!(
            ingested_types(&server).await,
            vec!["trace-create", "span-create"]
        );
    }

    #[tokio::test]
    async fn test_successful_trace_flushes_span_and_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .respond_with(ResponseTemplate::new(207).set_body_json(json!({"errors": []})))
            .expect(1)
            .mount(&server)
            .await;
        let tracer = Tracer::langfuse(settings(server.uri())).unwrap();

        let result = tracer
            .with_trace("softo", |trace| async move {
                trace
                    .with_span("answer", "q", |q, span| async move {
                        span.record_generation(
                            "chat",
                            "gpt-4o",
                            &json!([{"role": "user", "content": q}]),
                            &json!("a"),
                            None,
                        )
                        .await;
                        Ok("a".to_string())
                    })
                    .await
            })
            .await;

        assert_eq!(result.unwrap(), "a");
        assert_eq!(
            ingested_types(&server).await,
            vec!["trace-create", "span-create", "generation-create", "span-update"]
        );
    }

    #[tokio::test]
    async fn test_flush_failure_becomes_result_on_success_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let tracer = Tracer::langfuse(settings(server.uri())).unwrap();

        let ok_path = tracer.with_trace("t", |_| async { Ok(1) }).await;
        assert!(ok_path.unwrap_err().to_string().contains("500"));

        let err_path = tracer
            .with_trace("t", |_| async {
                Err::<u32, _>(PipelineError::domain("original"))
            })
            .await;
        assert_eq!(err_path.unwrap_err().to_string(), "original");
    }
}
