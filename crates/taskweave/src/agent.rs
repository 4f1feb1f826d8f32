//! An assistant that decides turn by turn whether to fetch pages, answer or give up.
pub mod action;
pub mod state;

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info};

use crate::config::AssistantSettings;
use crate::documents::DocumentService;
use crate::errors::{PipelineError, PipelineResult};
use crate::models::document::Document;
use crate::models::message::Message;
use crate::pipeline::sequence;
use crate::prompt_template::render_prompt;
use crate::providers::base::{completion_with_json, ChatRequest, LlmClient, ResponseFormat};
use crate::telemetry::TraceContext;
use action::{NextAction, NextActionResponse};
use state::ConversationState;

pub struct Assistant {
    llm: Arc<dyn LlmClient>,
    documents: DocumentService,
    model: String,
    step_limit: u32,
}

impl Assistant {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        documents: DocumentService,
        settings: &AssistantSettings,
    ) -> Self {
        Self {
            llm,
            documents,
            model: settings.model.clone(),
            step_limit: settings.step_limit,
        }
    }

    pub fn with_step_limit(mut self, step_limit: u32) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Answer one user question, fetching at most `step_limit` times.
    ///
    /// Every decision turn consumes budget only when it fetches. When the budget is
    /// gone before a terminal action the loop fails with
    /// [`PipelineError::ProcessingLimitExceeded`].
    pub async fn answer(
        &self,
        question: &str,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<String> {
        let mut state = ConversationState::new(self.step_limit).with_user_message(question);

        loop {
            if state.limit_exceeded() {
                return Err(PipelineError::ProcessingLimitExceeded);
            }

            match self.next_action(&state, trace).await? {
                NextAction::Fetch { urls } => {
                    let fetched = self.fetch_documents(&urls, &state).await?;
                    state = state.with_documents(fetched).with_decreased_limit();
                }
                NextAction::Solved { query } => {
                    return self.answer_query(&query, &state, trace).await;
                }
                NextAction::Resign { explanation } => return Ok(explanation),
            }
        }
    }

    async fn next_action(
        &self,
        state: &ConversationState,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<NextAction> {
        let request = ChatRequest::new(self.model.as_str(), state.conversation()?)
            .with_response_format(ResponseFormat::JsonObject);
        let response: NextActionResponse =
            completion_with_json(self.llm.as_ref(), &request, trace).await?;

        info!(
            remaining = state.remaining(),
            thinking = %response.thinking,
            action = ?response.next_action,
            "Next action"
        );
        Ok(response.next_action)
    }

    /// Fetch every requested page that is not in the state yet, in request order
    async fn fetch_documents(
        &self,
        urls: &[String],
        state: &ConversationState,
    ) -> PipelineResult<Vec<Document>> {
        let mut pending: Vec<&str> = Vec::new();
        for url in urls {
            if state.has_document(url) || pending.contains(&url.as_str()) {
                debug!(url = %url, "Skipping already fetched document");
            } else {
                pending.push(url);
            }
        }

        sequence(
            pending
                .into_iter()
                .map(|url| self.documents.web_page_as_document(url)),
        )
        .await
    }

    async fn answer_query(
        &self,
        query: &str,
        state: &ConversationState,
        trace: Option<&TraceContext>,
    ) -> PipelineResult<String> {
        let system = render_prompt(
            "answer.md",
            &json!({ "documents": state.documents(), "query": query }),
        )?;
        let request = ChatRequest::new(
            self.model.as_str(),
            vec![
                Message::system().with_text(system),
                Message::user().with_text(query),
            ],
        );
        self.llm.completion_with_text(&request, trace).await
    }
}
