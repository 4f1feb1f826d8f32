//! Minimal Qdrant REST client: collections, upsert and similarity search.
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::config::QdrantSettings;
use crate::decode::decode;
use crate::errors::{PipelineError, PipelineResult};
use crate::pipeline::try_execute;

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CollectionsList {
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Clone)]
pub struct QdrantClient {
    client: Client,
    settings: QdrantSettings,
}

impl QdrantClient {
    pub fn new(settings: QdrantSettings) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::execution("Build Qdrant client", e))?;
        Ok(Self { client, settings })
    }

    pub fn collection(&self) -> &str {
        &self.settings.collection
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.settings.url.trim_end_matches('/'), path);
        let builder = self.client.request(method, url);
        match &self.settings.api_key {
            Some(api_key) => builder.header("api-key", api_key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        label: &str,
        builder: RequestBuilder,
    ) -> PipelineResult<T> {
        let response = try_execute(label, builder.send()).await?;
        let status = response.status();
        let body: Value = try_execute(label, response.json::<Value>()).await?;

        if !status.is_success() {
            let reason = body["status"]["error"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| status.to_string());
            return Err(PipelineError::domain(format!("{} failed: {}", label, reason)));
        }
        let QdrantResponse { result } = decode(&body)?;
        Ok(result)
    }

    /// Create the collection with cosine distance unless it already exists
    pub async fn ensure_collection(&self) -> PipelineResult<()> {
        let list: CollectionsList = self
            .send("Get Qdrant collections", self.request(Method::GET, "collections"))
            .await?;
        if list.collections.iter().any(|c| c.name == self.settings.collection) {
            return Ok(());
        }

        info!(collection = %self.settings.collection, "Creating qdrant collection");
        let created: bool = self
            .send(
                "Create Qdrant collection",
                self.request(Method::PUT, &format!("collections/{}", self.collection()))
                    .json(&json!({
                        "vectors": {
                            "size": self.settings.vector_size,
                            "distance": "Cosine",
                        }
                    })),
            )
            .await?;

        if created {
            Ok(())
        } else {
            Err(PipelineError::domain("Failed to create qdrant collection"))
        }
    }

    /// Upsert one point under a fresh id and wait for the write; returns the operation status
    pub async fn upsert_point(
        &self,
        vector: Vec<f32>,
        payload: Map<String, Value>,
    ) -> PipelineResult<String> {
        self.ensure_collection().await?;
        let point = json!({
            "id": Uuid::new_v4().to_string(),
            "vector": vector,
            "payload": payload,
        });
        let result: UpdateResult = self
            .send(
                "Upsert point in Qdrant",
                self.request(
                    Method::PUT,
                    &format!("collections/{}/points?wait=true", self.collection()),
                )
                .json(&json!({ "points": [point] })),
            )
            .await?;
        Ok(result.status)
    }

    /// Payloads of the `limit` points nearest to `vector`
    pub async fn search_by_vector(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> PipelineResult<Vec<Map<String, Value>>> {
        self.ensure_collection().await?;
        let points: Vec<ScoredPoint> = self
            .send(
                "Search in Qdrant",
                self.request(
                    Method::POST,
                    &format!("collections/{}/points/search", self.collection()),
                )
                .json(&json!({
                    "vector": vector,
                    "limit": limit,
                    "with_payload": true,
                })),
            )
            .await?;
        Ok(points
            .into_iter()
            .map(|point| point.payload.unwrap_or_default())
            .collect())
    }

    /// Drop the collection and everything in it
    pub async fn reset(&self) -> PipelineResult<bool> {
        self.ensure_collection().await?;
        self.send(
            "Clear Qdrant",
            self.request(Method::DELETE, &format!("collections/{}", self.collection())),
        )
        .await
    }
}
