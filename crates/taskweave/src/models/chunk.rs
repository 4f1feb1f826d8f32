use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A fragment of a document prepared for embedding and retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Chunk {
    /// Create a chunk with a fresh id
    pub fn new<D: Into<String>, C: Into<String>>(document_id: D, content: C) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            content: content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_content<C: Into<String>>(self, content: C) -> Self {
        Self {
            content: content.into(),
            ..self
        }
    }
}

/// A chunk together with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkEmbedded {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}
