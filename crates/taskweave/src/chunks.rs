use std::sync::Arc;

use serde_json::json;

use crate::errors::PipelineResult;
use crate::models::chunk::{Chunk, ChunkEmbedded};
use crate::models::message::Message;
use crate::prompt_template::render_prompt;
use crate::providers::base::{embed_one, ChatRequest, LlmClient};
use crate::telemetry::TraceContext;

pub const CONTEXT_MODEL: &str = "gpt-4o-mini";

/// Prepares chunks for retrieval: situating context and embeddings
#[derive(Clone)]
pub struct ChunkService {
    llm: Arc<dyn LlmClient>,
    embedding_model: String,
    context_model: String,
}

impl ChunkService {
    pub fn new<S: Into<String>>(llm: Arc<dyn LlmClient>, embedding_model: S) -> Self {
        Self {
            llm,
            embedding_model: embedding_model.into(),
            context_model: CONTEXT_MODEL.to_string(),
        }
    }

    pub fn with_context_model<S: Into<String>>(mut self, model: S) -> Self {
        self.context_model = model.into();
        self
    }

    /// Replace the chunk content with a short context situating it inside `document`
    pub async fn contextualize(
        &self,
        chunk: Chunk,
        document: &str,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Chunk> {
        let system = render_prompt("contextual_chunk.md", &json!({ "document": document }))?;
        let request = ChatRequest::new(
            self.context_model.as_str(),
            vec![
                Message::system().with_text(system),
                Message::user().with_text(format!("<chunk>{}</chunk>", chunk.content)),
            ],
        );
        let context = self.llm.completion_with_text(&request, trace).await?;
        Ok(chunk.with_content(context))
    }

    pub async fn embed(
        &self,
        chunk: Chunk,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<ChunkEmbedded> {
        let embedding =
            embed_one(self.llm.as_ref(), &self.embedding_model, &chunk.content, trace).await?;
        Ok(ChunkEmbedded { chunk, embedding })
    }

    pub async fn embed_query(
        &self,
        query: &str,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<Vec<f32>> {
        embed_one(self.llm.as_ref(), &self.embedding_model, query, trace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use crate::providers::mock::MockLlm;

    #[tokio::test]
    async fn test_contextualize_replaces_content() {
        let llm = Arc::new(MockLlm::with_texts(["Raport z 21 lutego o kradzieży"]));
        let service = ChunkService::new(llm.clone(), "text-embedding-3-large");

        let chunk = Chunk::new("2024_02_21.txt", "Skradziono prototyp.").with_metadata("date", "2024-02-21");
        let contextual = service
            .contextualize(chunk.clone(), "Cały raport...", None)
            .await
            .unwrap();

        assert_eq!(contextual.content, "Raport z 21 lutego o kradzieży");
        assert_eq!(contextual.id, chunk.id);
        assert_eq!(contextual.metadata, chunk.metadata);

        let request = &llm.requests()[0];
        assert_eq!(request.model, CONTEXT_MODEL);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].text().contains("Cały raport..."));
        assert_eq!(
            request.messages[1].text(),
            "<chunk>Skradziono prototyp.</chunk>"
        );
    }

    #[tokio::test]
    async fn test_embed_attaches_vector() {
        let llm = Arc::new(MockLlm::new(vec![]).with_embeddings(vec![vec![0.1, 0.2]]));
        let service = ChunkService::new(llm, "text-embedding-3-large");

        let embedded = service.embed(Chunk::new("doc", "text"), None).await.unwrap();
        assert_eq!(embedded.embedding, vec![0.1, 0.2]);
        assert_eq!(embedded.chunk.content, "text");

        let err = service.embed_query("nothing left", None).await.unwrap_err();
        assert_eq!(err.to_string(), "No embeddings in response");
    }
}
