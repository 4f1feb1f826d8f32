//! Answer the headquarters questions by letting the assistant browse the company website.
use std::collections::BTreeMap;

use tracing::info;

use crate::agent::Assistant;
use crate::errors::PipelineResult;
use crate::headquarters::{Headquarters, ReportAck};
use crate::http::HttpClient;
use crate::telemetry::Tracer;

pub const TASK: &str = "softo";
const SITE: &str = "https://softo.ag3nts.org";

fn browse_prompt(question: &str) -> String {
    format!(
        "Przeszukaj strone {} i odpowiedz na pytanie: {}",
        SITE, question
    )
}

/// Answer each question in key order; the first failure aborts the batch
pub async fn answer_questions(
    assistant: &Assistant,
    tracer: &Tracer,
    questions: BTreeMap<String, String>,
) -> PipelineResult<BTreeMap<String, String>> {
    let mut answers = BTreeMap::new();
    for (id, question) in questions {
        let answer = tracer
            .with_trace(&format!("Softo question {}", id), |trace| {
                let prompt = browse_prompt(&question);
                async move { assistant.answer(&prompt, Some(&trace)).await }
            })
            .await?;
        info!(id = %id, answer = %answer, "Answered question");
        answers.insert(id, answer);
    }
    Ok(answers)
}

pub async fn solve(
    http: &HttpClient,
    assistant: &Assistant,
    headquarters: &Headquarters,
    tracer: &Tracer,
) -> PipelineResult<ReportAck> {
    let questions: BTreeMap<String, String> =
        http.get_json(&headquarters.data_url("softo.json")).await?;
    let answers = answer_questions(assistant, tracer, questions).await?;
    headquarters.report(TASK, &answers).await
}
