//! Let the model discover the headquarters database schema and query it until it can answer.
//!
//! Every model reply either asks for one more query or gives the final answer. Query results
//! go back to the model as the next user message, and the number of model calls is bounded.
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::decode::decode_str;
use crate::episodes::connections::query_database_raw;
use crate::errors::{PipelineError, PipelineResult};
use crate::headquarters::{Headquarters, ReportAck};
use crate::http::HttpClient;
use crate::models::message::Message;
use crate::pipeline::{try_execute_sync, ResultExt};
use crate::prompt_template::render_prompt;
use crate::providers::base::{completion_with_json, ChatRequest, LlmClient, ResponseFormat};
use crate::telemetry::{TraceContext, Tracer};

pub const TASK: &str = "database";
pub const QUERY_LIMIT: usize = 10;

const QUESTION: &str = "Które aktywne datacenter (DC_ID) są zarządzane przez pracowników, którzy są na urlopie (is_active=0)";
const TO_ARRAY_PROMPT: &str =
    "Convert the response to JSON array with DC_ID values. Return only the array nothing more";
const EMPTY_ANSWER: &str = "[empty response]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CollectData,
    FinalResponse,
}

/// One step of the analyst: a query to run or the final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystStep {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Ask the analyst `question`, allowing at most `limit` model calls.
///
/// The budget is checked before every call, so a model that never settles fails with
/// "Limit queries to LLM  is exhausted" after exactly `limit` calls.
pub async fn ask_analyst(
    http: &HttpClient,
    headquarters: &Headquarters,
    llm: &dyn LlmClient,
    model: &str,
    question: &str,
    limit: usize,
    trace: Option<&TraceContext>,
) -> PipelineResult<String> {
    let system = render_prompt("sql_analyst.md", &json!({}))?;
    let mut history = vec![Message::system().with_text(system)];
    let mut user_message = question.to_string();
    let mut remaining = limit;

    loop {
        if remaining == 0 {
            return Err(PipelineError::domain("Limit queries to LLM  is exhausted"));
        }
        let mut messages = history.clone();
        messages.push(Message::user().with_text(user_message.clone()));
        let request =
            ChatRequest::new(model, messages).with_response_format(ResponseFormat::JsonObject);
        let step: AnalystStep = completion_with_json(llm, &request, trace).await?;

        match step.action_type {
            ActionType::FinalResponse => {
                return Ok(step
                    .answer
                    .filter(|answer| !answer.is_empty())
                    .unwrap_or_else(|| EMPTY_ANSWER.to_string()));
            }
            ActionType::CollectData => {
                let query = step
                    .query
                    .as_deref()
                    .filter(|query| !query.is_empty())
                    .ok_or_else(|| PipelineError::domain("No query provided"))?;
                let response = query_database_raw(http, headquarters, query)
                    .await
                    .log_pipe("Database response")?;
                let data = try_execute_sync("Serialize database response", || {
                    serde_json::to_string_pretty(&response)
                })?;
                let echoed = try_execute_sync("Serialize analyst step", || {
                    serde_json::to_string_pretty(&step)
                })?;

                history.push(Message::user().with_text(user_message));
                history.push(Message::assistant().with_text(echoed));
                user_message = data;
                remaining -= 1;
            }
        }
    }
}

/// Turn the analyst's prose answer into a JSON array of DC_ID values
pub async fn to_dc_ids(
    llm: &dyn LlmClient,
    model: &str,
    answer: &str,
    trace: Option<&TraceContext>,
) -> PipelineResult<Vec<Value>> {
    let request = ChatRequest::new(
        model,
        vec![
            Message::system().with_text(TO_ARRAY_PROMPT),
            Message::user().with_text(answer),
        ],
    );
    let text = llm.completion_with_text(&request, trace).await?;
    decode_str(&text)
}

pub async fn solve(
    http: &HttpClient,
    headquarters: &Headquarters,
    llm: &dyn LlmClient,
    model: &str,
    tracer: &Tracer,
) -> PipelineResult<ReportAck> {
    let answer = tracer
        .with_trace("Answer Question", |trace| async move {
            ask_analyst(
                http,
                headquarters,
                llm,
                model,
                QUESTION,
                QUERY_LIMIT,
                Some(&trace),
            )
            .await
        })
        .await
        .log_pipe("Answer Question")?;
    let ids = to_dc_ids(llm, model, &answer, None).await?;
    headquarters.report(TASK, &ids).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadquartersSettings;
    use crate::providers::mock::MockLlm;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SHOW_TABLES: &str = r#"{"actionType": "COLLECT_DATA", "query": "SHOW TABLES"}"#;

    fn headquarters(url: String) -> Headquarters {
        Headquarters::new(
            HttpClient::new().unwrap(),
            HeadquartersSettings {
                url,
                api_key: "key".to_string(),
            },
        )
    }

    async fn mount_tables(server: &MockServer, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/apidb"))
            .and(body_partial_json(json!({"task": "database", "query": "SHOW TABLES"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reply": [{"Tables_in_banan": "datacenters"}, {"Tables_in_banan": "users"}],
                "error": "OK"
            })))
            .expect(expected)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_analyst_stops_at_query_budget() {
        let server = MockServer::start().await;
        mount_tables(&server, 3).await;

        let llm = MockLlm::repeating(SHOW_TABLES);
        let http = HttpClient::new().unwrap();
        let err = ask_analyst(
            &http,
            &headquarters(server.uri()),
            &llm,
            "gpt-4o",
            "Which datacenters?",
            3,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PipelineError::Domain(_)));
        assert_eq!(err.to_string(), "Limit queries to LLM  is exhausted");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test]
    async fn test_query_results_feed_the_next_step() {
        let server = MockServer::start().await;
        mount_tables(&server, 1).await;

        let llm = MockLlm::with_texts([
            SHOW_TABLES,
            r#"{"actionType": "FINAL_RESPONSE", "answer": "DC 4278 i 9294"}"#,
        ]);
        let http = HttpClient::new().unwrap();
        let answer = ask_analyst(
            &http,
            &headquarters(server.uri()),
            &llm,
            "gpt-4o",
            "Which datacenters?",
            QUERY_LIMIT,
            None,
        )
        .await
        .unwrap();
        assert_eq!(answer, "DC 4278 i 9294");

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(requests[0].messages.len(), 2);

        let second = &requests[1].messages;
        assert_eq!(second.len(), 4);
        assert_eq!(second[1].text(), "Which datacenters?");
        let echoed: AnalystStep = serde_json::from_str(&second[2].text()).unwrap();
        assert_eq!(echoed.action_type, ActionType::CollectData);
        assert_eq!(echoed.query.as_deref(), Some("SHOW TABLES"));
        let data: Value = serde_json::from_str(&second[3].text()).unwrap();
        assert_eq!(data["reply"][0]["Tables_in_banan"], "datacenters");
        assert_eq!(data["error"], "OK");
    }

    #[tokio::test]
    async fn test_empty_final_answer_is_marked() {
        let llm = MockLlm::with_texts([r#"{"actionType": "FINAL_RESPONSE", "answer": ""}"#]);
        let answer = ask_analyst(
            &HttpClient::new().unwrap(),
            &headquarters("http://127.0.0.1:9".to_string()),
            &llm,
            "gpt-4o",
            "Anything?",
            1,
            None,
        )
        .await
        .unwrap();
        assert_eq!(answer, "[empty response]");
    }

    #[tokio::test]
    async fn test_collect_step_without_query_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": []})))
            .expect(0)
            .mount(&server)
            .await;

        let llm = MockLlm::with_texts([r#"{"actionType": "COLLECT_DATA"}"#]);
        let err = ask_analyst(
            &HttpClient::new().unwrap(),
            &headquarters(server.uri()),
            &llm,
            "gpt-4o",
            "Anything?",
            QUERY_LIMIT,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "No query provided");
    }

    #[tokio::test]
    async fn test_solve_reports_dc_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/report"))
            .and(body_json(json!({
                "task": "database",
                "apikey": "key",
                "answer": [4278, 9294]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "OK"})))
            .expect(1)
            .mount(&server)
            .await;

        let llm = MockLlm::with_texts([
            r#"{"actionType": "FINAL_RESPONSE", "answer": "DC 4278 i 9294"}"#,
            "[4278, 9294]",
        ]);
        let http = HttpClient::new().unwrap();
        let ack = solve(
            &http,
            &headquarters(server.uri()),
            &llm,
            "gpt-4o",
            &Tracer::disabled(),
        )
        .await
        .unwrap();
        assert_eq!(ack.code, 0);

        let conversion = &llm.requests()[1];
        assert_eq!(conversion.messages[0].text(), TO_ARRAY_PROMPT);
        assert_eq!(conversion.messages[1].text(), "DC 4278 i 9294");
        assert_eq!(conversion.response_format, None);
    }
}
