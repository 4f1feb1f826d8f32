use crate::config::{LocalLlmSettings, OpenAiSettings};

/// Connection details of an OpenAI-compatible server
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
}

impl OpenAiProviderConfig {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            api_key: None,
            organization: None,
            project: None,
        }
    }

    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl From<&OpenAiSettings> for OpenAiProviderConfig {
    fn from(settings: &OpenAiSettings) -> Self {
        Self {
            host: settings.host.clone(),
            api_key: settings.api_key.clone(),
            organization: settings.organization.clone(),
            project: settings.project.clone(),
        }
    }
}

impl From<&LocalLlmSettings> for OpenAiProviderConfig {
    fn from(settings: &LocalLlmSettings) -> Self {
        Self::new(settings.host.clone())
    }
}
