//! Thin GET/POST helpers that read the body the way the caller declares and decode it.
use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::decode::decode;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::{try_execute, ResultExt};

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PipelineError::execution("Build HTTP client", e))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> PipelineResult<Response> {
        try_execute(&format!("get: {}", url), self.client.get(url).send()).await
    }

    /// GET and decode the JSON body into `T`; use `Value` to skip validation
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> PipelineResult<T> {
        let response = self.get(url).await?;
        let body: Value = try_execute("Get Json", response.json()).await?;
        decode(&body)
    }

    pub async fn get_text(&self, url: &str) -> PipelineResult<String> {
        let response = self.get(url).await?;
        try_execute("Get Text", response.text()).await
    }

    pub async fn get_bytes(&self, url: &str) -> PipelineResult<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = try_execute("Get Buffer", response.bytes()).await?;
        Ok(bytes.to_vec())
    }

    /// POST `payload` as JSON and decode the JSON reply into `T`
    pub async fn post_json<P, T>(&self, url: &str, payload: &P) -> PipelineResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = try_execute(
            &format!("post: {}", url),
            self.client.post(url).json(payload).send(),
        )
        .await?;
        let body: Value = try_execute("Get Json", response.json::<Value>())
            .await
            .log_pipe("POST Response")?;
        decode(&body)
    }
}
