use serde::{Deserialize, Serialize};

use crate::config::HeadquartersSettings;
use crate::errors::PipelineResult;
use crate::http::HttpClient;

#[derive(Debug, Serialize)]
struct Report<'a, A: Serialize> {
    task: &'a str,
    apikey: &'a str,
    answer: &'a A,
}

/// Acknowledgement of a report; a negative code means the answer was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAck {
    pub code: i64,
    pub message: String,
}

/// The reporting sink that receives task answers
#[derive(Clone)]
pub struct Headquarters {
    http: HttpClient,
    settings: HeadquartersSettings,
}

impl Headquarters {
    pub fn new(http: HttpClient, settings: HeadquartersSettings) -> Self {
        Self { http, settings }
    }

    fn base(&self) -> &str {
        self.settings.url.trim_end_matches('/')
    }

    /// Location of an input file published for the api key
    pub fn data_url(&self, file: &str) -> String {
        format!("{}/data/{}/{}", self.base(), self.settings.api_key, file)
    }

    /// Endpoint on the headquarters host, e.g. `apidb`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base(), path.trim_start_matches('/'))
    }

    pub fn api_key(&self) -> &str {
        &self.settings.api_key
    }

    pub async fn report<A: Serialize>(&self, task: &str, answer: &A) -> PipelineResult<ReportAck> {
        let report = Report {
            task,
            apikey: &self.settings.api_key,
            answer,
        };
        self.http.post_json(&self.endpoint("report"), &report).await
    }
}
