//! Track a person down by alternating people and places lookups on the headquarters API.
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::errors::{PipelineError, PipelineResult};
use crate::headquarters::Headquarters;
use crate::http::HttpClient;
use crate::models::message::Message;
use crate::pipeline::{try_execute_sync, ResultExt};
use crate::prompt_template::render_prompt;
use crate::providers::base::{completion_with_json, ChatRequest, LlmClient, ResponseFormat};
use crate::telemetry::{TraceContext, Tracer};

pub const SEARCH_LIMIT: usize = 20;
pub const TARGET: &str = "Barbara";

/// Names found in the starting note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialNames {
    pub people: Vec<String>,
    pub places: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchAction {
    /// Places a person was seen in
    Places,
    /// People seen in a place
    People,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSearch {
    pub action: SearchAction,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct LookupReply {
    code: i64,
    message: String,
}

fn initial_names_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: json!({
            "name": "InitialNames",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "people": {"type": "array", "items": {"type": "string"}},
                    "places": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["people", "places"],
                "additionalProperties": false
            }
        }),
    }
}

fn location_search_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: json!({
            "name": "LocationSearch",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["people", "places", "response"]},
                    "message": {"type": "string"}
                },
                "required": ["action", "message"],
                "additionalProperties": false
            }
        }),
    }
}

/// Ask one of the lookup endpoints about `name`.
///
/// A rejected lookup is not an error: the model gets the rejection as text and can try
/// something else.
pub async fn lookup(
    http: &HttpClient,
    headquarters: &Headquarters,
    endpoint: &str,
    name: &str,
) -> PipelineResult<String> {
    let payload = json!({ "apikey": headquarters.api_key(), "query": name });
    let reply: LookupReply = http
        .post_json(&headquarters.endpoint(endpoint), &payload)
        .await?;
    Ok(if reply.code == 0 {
        format!("{} -> {}", name, reply.message)
    } else {
        format!("[ERROR: {} - {}]", reply.code, reply.message)
    })
}

pub async fn initial_names(
    llm: &dyn LlmClient,
    model: &str,
    note: &str,
    trace: Option<&TraceContext>,
) -> PipelineResult<InitialNames> {
    let request = ChatRequest::new(
        model,
        vec![
            Message::system().with_text(render_prompt("initial_names.md", &json!({}))?),
            Message::user().with_text(note),
        ],
    )
    .with_response_format(initial_names_format());
    completion_with_json(llm, &request, trace).await
}

/// Let the model drive the lookups, at most `limit` model calls
pub async fn search_location(
    http: &HttpClient,
    headquarters: &Headquarters,
    llm: &dyn LlmClient,
    model: &str,
    names: &InitialNames,
    limit: usize,
    trace: Option<&TraceContext>,
) -> PipelineResult<LocationSearch> {
    let system = render_prompt("find_location.md", &json!({ "target": TARGET }))?;
    let initial = try_execute_sync("Serialize initial names", || serde_json::to_string(names))?;

    let mut messages = vec![Message::system().with_text(system)];
    let mut user_message = initial;
    let mut remaining = limit;

    loop {
        if remaining == 0 {
            return Err(PipelineError::domain("Limit queries to LLM  is exhausted"));
        }
        messages.push(Message::user().with_text(user_message));
        let request = ChatRequest::new(model, messages.clone())
            .with_response_format(location_search_format());
        let search: LocationSearch = completion_with_json(llm, &request, trace).await?;

        let endpoint = match search.action {
            SearchAction::Response => return Ok(search),
            SearchAction::Places => "people",
            SearchAction::People => "places",
        };
        info!(action = ?search.action, input = %search.message, "Looking up");
        user_message = lookup(http, headquarters, endpoint, &search.message).await?;
        messages.push(Message::assistant().with_text(search.message));
        remaining -= 1;
    }
}

pub async fn find_location(
    http: &HttpClient,
    headquarters: &Headquarters,
    llm: &dyn LlmClient,
    model: &str,
    tracer: &Tracer,
) -> PipelineResult<String> {
    tracer
        .with_trace("Find Location", |trace| async move {
            let note = http.get_text(&headquarters.endpoint("dane/barbara.txt")).await?;
            let names = initial_names(llm, model, &note, Some(&trace)).await?;
            let found = search_location(
                http,
                headquarters,
                llm,
                model,
                &names,
                SEARCH_LIMIT,
                Some(&trace),
            )
            .await
            .log_pipe("Barbara Location")?;
            Ok(found.message)
        })
        .await
}
