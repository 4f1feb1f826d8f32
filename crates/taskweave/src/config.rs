//! Layered settings: built-in defaults, an optional TOML file in the user's config
//! directory, then `TASKWEAVE_*` environment variables (`__` separates nested keys).
use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

pub const ENV_PREFIX: &str = "TASKWEAVE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration, set {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Environment variable that provides the dotted settings key `field`
pub fn to_env_var(field: &str) -> String {
    let nested = field.replace('.', "__").to_uppercase();
    format!("{}_{}", ENV_PREFIX, nested)
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingEnvVar {
        env_var: to_env_var(field),
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default = "default_openai_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            host: default_openai_host(),
            api_key: None,
            organization: None,
            project: None,
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            transcription_model: default_transcription_model(),
            image_model: default_image_model(),
        }
    }
}

/// An OpenAI-compatible server running a local model
#[derive(Debug, Clone, Deserialize)]
pub struct LocalLlmSettings {
    pub host: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadquartersSettings {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotSettings {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QdrantSettings {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vector_size")]
    pub vector_size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_neo4j_database")]
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LangfuseSettings {
    #[serde(default = "default_langfuse_host")]
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantSettings {
    #[serde(default = "default_step_limit")]
    pub step_limit: u32,
    #[serde(default = "default_assistant_model")]
    pub model: String,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            step_limit: default_step_limit(),
            model: default_assistant_model(),
        }
    }
}

/// Every section an episode may need. Sections other than `openai` and `assistant` are
/// optional at load time and checked by the accessor of the episode that uses them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai: OpenAiSettings,
    #[serde(default)]
    pub local_llm: Option<LocalLlmSettings>,
    #[serde(default)]
    pub headquarters: Option<HeadquartersSettings>,
    #[serde(default)]
    pub robot: Option<RobotSettings>,
    #[serde(default)]
    pub qdrant: Option<QdrantSettings>,
    #[serde(default)]
    pub neo4j: Option<Neo4jSettings>,
    #[serde(default)]
    pub langfuse: Option<LangfuseSettings>,
    #[serde(default)]
    pub assistant: AssistantSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(dirs::config_dir().map(|dir| dir.join("taskweave").join("config.toml")))
    }

    /// Load with an explicit settings file location; a missing file is skipped
    pub fn load(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if let Some(rest) = error_str.strip_prefix("missing field `") {
                    let field = rest.split('`').next().unwrap_or_default();
                    Err(missing(field))
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(missing(field))
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }

    pub fn headquarters(&self) -> Result<&HeadquartersSettings, ConfigError> {
        self.headquarters
            .as_ref()
            .ok_or_else(|| missing("headquarters.url"))
    }

    pub fn robot(&self) -> Result<&RobotSettings, ConfigError> {
        self.robot.as_ref().ok_or_else(|| missing("robot.url"))
    }

    pub fn local_llm(&self) -> Result<&LocalLlmSettings, ConfigError> {
        self.local_llm
            .as_ref()
            .ok_or_else(|| missing("local_llm.host"))
    }

    pub fn qdrant(&self) -> Result<&QdrantSettings, ConfigError> {
        self.qdrant.as_ref().ok_or_else(|| missing("qdrant.url"))
    }

    pub fn neo4j(&self) -> Result<&Neo4jSettings, ConfigError> {
        self.neo4j.as_ref().ok_or_else(|| missing("neo4j.url"))
    }
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_image_model() -> String {
    "dall-e-3".to_string()
}

fn default_collection() -> String {
    "ai_dev3".to_string()
}

fn default_vector_size() -> u64 {
    3072
}

fn default_neo4j_database() -> String {
    "neo4j".to_string()
}

fn default_langfuse_host() -> String {
    "https://cloud.langfuse.com".to_string()
}

fn default_step_limit() -> u32 {
    10
}

fn default_assistant_model() -> String {
    "gpt-4o".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("TASKWEAVE_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.openai.host, "https://api.openai.com");
        assert_eq!(settings.openai.api_key, None);
        assert_eq!(settings.openai.embedding_model, "text-embedding-3-large");
        assert_eq!(settings.assistant.step_limit, 10);
        assert_eq!(settings.assistant.model, "gpt-4o");
        assert!(settings.langfuse.is_none());
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("TASKWEAVE_OPENAI__API_KEY", "test-key");
        env::set_var("TASKWEAVE_OPENAI__HOST", "http://localhost:1234");
        env::set_var("TASKWEAVE_ASSISTANT__STEP_LIMIT", "3");
        env::set_var("TASKWEAVE_HEADQUARTERS__URL", "https://hq.example");
        env::set_var("TASKWEAVE_HEADQUARTERS__API_KEY", "hq-key");

        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.openai.api_key.as_deref(), Some("test-key"));
        assert_eq!(settings.openai.host, "http://localhost:1234");
        assert_eq!(settings.assistant.step_limit, 3);

        let hq = settings.headquarters().unwrap();
        assert_eq!(hq.url, "https://hq.example");
        assert_eq!(hq.api_key, "hq-key");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_missing_section_names_env_var() {
        clean_env();

        let settings = Settings::load(None).unwrap();
        match settings.neo4j() {
            Err(ConfigError::MissingEnvVar { env_var }) => {
                assert_eq!(env_var, "TASKWEAVE_NEO4J__URL")
            }
            other => panic!("expected missing env var, got {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_incomplete_section_names_missing_field() {
        clean_env();
        env::set_var("TASKWEAVE_HEADQUARTERS__URL", "https://hq.example");

        let err = Settings::load(None).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("api_key"));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_file_layer_is_overridden_by_environment() {
        clean_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[qdrant]\nurl = \"http://file:6333\"\ncollection = \"from_file\"\n",
        )
        .unwrap();
        env::set_var("TASKWEAVE_QDRANT__COLLECTION", "from_env");

        let settings = Settings::load(Some(path)).unwrap();
        let qdrant = settings.qdrant().unwrap();
        assert_eq!(qdrant.url, "http://file:6333");
        assert_eq!(qdrant.collection, "from_env");
        assert_eq!(qdrant.vector_size, 3072);

        clean_env();
    }

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("openai.api_key"), "TASKWEAVE_OPENAI__API_KEY");
        assert_eq!(to_env_var("robot"), "TASKWEAVE_ROBOT");
    }
}
