pub mod qdrant;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::chunks::ChunkService;
use crate::decode::decode;
use crate::errors::PipelineResult;
use crate::models::chunk::Chunk;
use crate::telemetry::TraceContext;
use qdrant::QdrantClient;

/// How a chunk is read back from a point payload: the chunk fields plus the rest as metadata
#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(rename = "chunkId")]
    chunk_id: String,
    #[serde(rename = "documentId")]
    document_id: String,
    text: String,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

/// Point payload of a chunk. Metadata goes in first so the chunk fields win on a key clash.
fn chunk_payload(chunk: Chunk) -> Map<String, Value> {
    let mut payload = chunk.metadata;
    payload.insert("chunkId".to_string(), Value::String(chunk.id));
    payload.insert("documentId".to_string(), Value::String(chunk.document_id));
    payload.insert("text".to_string(), Value::String(chunk.content));
    payload
}

impl From<ChunkPayload> for Chunk {
    fn from(payload: ChunkPayload) -> Self {
        Chunk {
            id: payload.chunk_id,
            document_id: payload.document_id,
            content: payload.text,
            metadata: payload.metadata,
        }
    }
}

/// Chunk-level access to the vector store
#[derive(Clone)]
pub struct VectorService {
    qdrant: QdrantClient,
    chunks: ChunkService,
}

impl VectorService {
    pub fn new(qdrant: QdrantClient, chunks: ChunkService) -> Self {
        Self { qdrant, chunks }
    }

    /// Embed and store a chunk
    pub async fn add_chunk(
        &self,
        chunk: Chunk,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<String> {
        let embedded = self.chunks.embed(chunk, trace).await?;
        let payload = chunk_payload(embedded.chunk);
        self.qdrant.upsert_point(embedded.embedding, payload).await
    }

    /// Chunks closest to `query`, best first
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Vec<Chunk>> {
        let embedding = self.chunks.embed_query(query, trace).await?;
        self.qdrant
            .search_by_vector(&embedding, limit)
            .await?
            .into_iter()
            .map(|payload| decode::<ChunkPayload>(&Value::Object(payload)).map(Chunk::from))
            .collect()
    }

    pub async fn reset(&self) -> PipelineResult<bool> {
        self.qdrant.reset().await
    }
}
