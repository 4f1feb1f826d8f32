//! Anonymise a police report with a locally hosted model.
use serde_json::json;

use crate::errors::PipelineResult;
use crate::headquarters::{Headquarters, ReportAck};
use crate::http::HttpClient;
use crate::models::message::Message;
use crate::pipeline::ResultExt;
use crate::prompt_template::render_prompt;
use crate::providers::base::{ChatRequest, LlmClient};
use crate::telemetry::{TraceContext, Tracer};

pub const TASK: &str = "CENZURA";

/// Replace personal data in `text` with "CENZURA"
pub async fn anonymize(
    llm: &dyn LlmClient,
    model: &str,
    text: &str,
    trace: Option<&TraceContext>,
) -> PipelineResult<String> {
    let request = ChatRequest::new(
        model,
        vec![
            Message::system().with_text(render_prompt("censorship.md", &json!({}))?),
            Message::user().with_text(text),
        ],
    );
    llm.completion_with_text(&request, trace)
        .await
        .log_pipe("Anonymised")
}

pub async fn censor(
    http: &HttpClient,
    local_llm: &dyn LlmClient,
    model: &str,
    headquarters: &Headquarters,
    tracer: &Tracer,
) -> PipelineResult<ReportAck> {
    tracer
        .with_trace("AnonymizeData", |trace| async move {
            let text = http.get_text(&headquarters.data_url("cenzura.txt")).await?;
            let anonymized = anonymize(local_llm, model, &text, Some(&trace)).await?;
            headquarters.report(TASK, &anonymized).await
        })
        .await
}
