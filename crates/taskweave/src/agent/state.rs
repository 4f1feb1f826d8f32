use serde_json::json;

use crate::errors::PipelineResult;
use crate::models::document::Document;
use crate::models::message::Message;
use crate::prompt_template::render_prompt;

/// Everything one question has gathered so far.
///
/// Values are never mutated in place; every update returns a new state.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    history: Vec<Message>,
    documents: Vec<Document>,
    remaining: u32,
}

impl ConversationState {
    pub fn new(step_limit: u32) -> Self {
        Self {
            history: Vec::new(),
            documents: Vec::new(),
            remaining: step_limit,
        }
    }

    pub fn with_user_message<S: Into<String>>(&self, text: S) -> Self {
        let mut history = self.history.clone();
        history.push(Message::user().with_text(text));
        Self {
            history,
            ..self.clone()
        }
    }

    /// Append documents whose URL is not collected yet
    pub fn with_documents<I: IntoIterator<Item = Document>>(&self, documents: I) -> Self {
        let mut collected = self.documents.clone();
        for document in documents {
            if !collected.iter().any(|known| known.url == document.url) {
                collected.push(document);
            }
        }
        Self {
            documents: collected,
            ..self.clone()
        }
    }

    pub fn with_decreased_limit(&self) -> Self {
        Self {
            remaining: self.remaining.saturating_sub(1),
            ..self.clone()
        }
    }

    pub fn limit_exceeded(&self) -> bool {
        self.remaining == 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn has_document(&self, url: &str) -> bool {
        self.documents.iter().any(|document| document.url == url)
    }

    /// Messages for a decision turn: the next-action system prompt, then the history
    pub fn conversation(&self) -> PipelineResult<Vec<Message>> {
        let system = render_prompt("next_action.md", &json!({ "documents": self.documents }))?;
        let mut messages = vec![Message::system().with_text(system)];
        messages.extend(self.history.iter().cloned());
        Ok(messages)
    }
}
