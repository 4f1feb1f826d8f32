use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LangfuseSettings;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::try_execute;

/// One entry of an ingestion batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionEvent {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub body: Value,
}

impl IngestionEvent {
    pub fn new<K: Into<String>>(kind: K, body: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.into(),
            body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestionError {
    id: String,
    status: u16,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IngestionResponse {
    #[serde(default)]
    errors: Vec<IngestionError>,
}

/// Buffers observations and ships them to the Langfuse ingestion endpoint on flush
pub struct LangfuseClient {
    client: Client,
    settings: LangfuseSettings,
    buffer: Mutex<Vec<IngestionEvent>>,
}

impl LangfuseClient {
    pub fn new(settings: LangfuseSettings) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::execution("Build Langfuse client", e))?;

        Ok(Self {
            client,
            settings,
            buffer: Mutex::new(Vec::new()),
        })
    }

    pub async fn enqueue(&self, event: IngestionEvent) {
        self.buffer.lock().await.push(event);
    }

    pub async fn pending(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Send every buffered event in one batch. An empty buffer sends nothing.
    pub async fn flush(&self) -> PipelineResult<()> {
        let batch: Vec<IngestionEvent> = std::mem::take(&mut *self.buffer.lock().await);
        if batch.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/api/public/ingestion",
            self.settings.host.trim_end_matches('/')
        );
        debug!(events = batch.len(), "flushing langfuse batch");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.settings.public_key, Some(&self.settings.secret_key))
            .json(&json!({ "batch": batch }))
            .send()
            .await
            .map_err(|e| PipelineError::execution("Flush Langfuse", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::domain(format!(
                "Langfuse ingestion failed: {}",
                status
            )));
        }

        if status == StatusCode::MULTI_STATUS {
            let body: IngestionResponse =
                try_execute("Read Langfuse ingestion result", response.json()).await?;
            for error in &body.errors {
                warn!(
                    event = %error.id,
                    status = error.status,
                    message = error.message.as_deref().unwrap_or(""),
                    "langfuse rejected event"
                );
            }
            if !body.errors.is_empty() {
                return Err(PipelineError::domain(format!(
                    "Langfuse rejected {} of {} events",
                    body.errors.len(),
                    batch.len()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(host: String) -> LangfuseSettings {
        LangfuseSettings {
            host,
            public_key: "pk-lf-test".to_string(),
            secret_key: "sk-lf-test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_flush_sends_buffered_batch_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(207).set_body_json(json!({"successes": [], "errors": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = LangfuseClient::new(settings(server.uri())).unwrap();
        client
            .enqueue(IngestionEvent::new("trace-create", json!({"id": "t1"})))
            .await;
        client
            .enqueue(IngestionEvent::new("span-create", json!({"id": "s1"})))
            .await;

        client.flush().await.unwrap();
        assert_eq!(client.pending().await, 0);

        // nothing left to send, so no second request
        client.flush().await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["batch"].as_array().unwrap().len(), 2);
        assert_eq!(body["batch"][0]["type"], "trace-create");
    }

    #[tokio::test]
    async fn test_flush_reports_rejected_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .respond_with(ResponseTemplate::new(207).set_body_json(json!({
                "successes": [],
                "errors": [{"id": "e1", "status": 400, "message": "invalid body"}]
            })))
            .mount(&server)
            .await;

        let client = LangfuseClient::new(settings(server.uri())).unwrap();
        client
            .enqueue(IngestionEvent::new("span-update", json!({"id": "s1"})))
            .await;

        let err = client.flush().await.unwrap_err();
        assert_eq!(err.to_string(), "Langfuse rejected 1 of 1 events");
    }

    #[tokio::test]
    async fn test_flush_fails_on_unreadable_partial_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/public/ingestion"))
            .respond_with(ResponseTemplate::new(207).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let client = LangfuseClient::new(settings(server.uri())).unwrap();
        client
            .enqueue(IngestionEvent::new("trace-create", json!({"id": "t1"})))
            .await;

        let err = client.flush().await.unwrap_err();
        assert_eq!(err.label(), Some("Read Langfuse ingestion result"));
    }

    #[tokio::test]
    async fn test_flush_fails_on_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = LangfuseClient::new(settings(server.uri())).unwrap();
        client
            .enqueue(IngestionEvent::new("trace-create", json!({"id": "t1"})))
            .await;

        let err = client.flush().await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
