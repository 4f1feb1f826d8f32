use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use taskweave::agent::Assistant;
use taskweave::chunks::ChunkService;
use taskweave::config::Settings;
use taskweave::documents::DocumentService;
use taskweave::headquarters::Headquarters;
use taskweave::http::HttpClient;
use taskweave::providers::base::LlmClient;
use taskweave::providers::configs::OpenAiProviderConfig;
use taskweave::providers::openai::OpenAiClient;
use taskweave::telemetry::Tracer;
use taskweave::vector::qdrant::QdrantClient;
use taskweave::vector::VectorService;

/// Clients shared by every command, built once from the loaded settings
pub struct Context {
    pub settings: Settings,
    pub http: HttpClient,
    pub llm: Arc<dyn LlmClient>,
    pub tracer: Tracer,
}

impl Context {
    pub fn load(config: Option<PathBuf>) -> Result<Self> {
        let settings = match config {
            Some(path) => Settings::load(Some(path))?,
            None => Settings::new()?,
        };
        let http = HttpClient::new()?;
        let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(OpenAiProviderConfig::from(
            &settings.openai,
        ))?);
        let tracer = Tracer::from_settings(settings.langfuse.as_ref())?;

        Ok(Self {
            settings,
            http,
            llm,
            tracer,
        })
    }

    pub fn headquarters(&self) -> Result<Headquarters> {
        Ok(Headquarters::new(
            self.http.clone(),
            self.settings.headquarters()?.clone(),
        ))
    }

    /// The locally hosted model and its name
    pub fn local_llm(&self) -> Result<(OpenAiClient, String)> {
        let settings = self.settings.local_llm()?;
        let client = OpenAiClient::new(OpenAiProviderConfig::from(settings))?;
        Ok((client, settings.model.clone()))
    }

    pub fn assistant(&self) -> Assistant {
        Assistant::new(
            self.llm.clone(),
            DocumentService::new(self.http.clone()),
            &self.settings.assistant,
        )
    }

    pub fn chunks(&self) -> ChunkService {
        let openai = &self.settings.openai;
        ChunkService::new(self.llm.clone(), openai.embedding_model.as_str())
            .with_context_model(openai.chat_model.as_str())
    }

    pub fn vectors(&self) -> Result<VectorService> {
        let qdrant = QdrantClient::new(self.settings.qdrant()?.clone())?;
        Ok(VectorService::new(qdrant, self.chunks()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_context_reads_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[headquarters]\nurl = \"https://centrala.example/\"\napi_key = \"key-123\"\n",
        )
        .unwrap();

        let context = Context::load(Some(path)).unwrap();
        assert!(!context.tracer.is_enabled());
        assert_eq!(
            context.headquarters().unwrap().data_url("json.txt"),
            "https://centrala.example/data/key-123/json.txt"
        );

        let err = context.vectors().err().unwrap();
        assert!(err.to_string().contains("TASKWEAVE_QDRANT__URL"));
    }
}
