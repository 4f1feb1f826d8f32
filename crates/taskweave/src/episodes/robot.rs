//! Pass the verification robot's questionnaire and collect its flag.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::errors::{PipelineError, PipelineResult};
use crate::http::HttpClient;
use crate::models::message::Message;
use crate::prompt_template::render_prompt;
use crate::providers::base::{ChatRequest, LlmClient};

pub const TURN_LIMIT: u32 = 10;
const MODEL: &str = "gpt-4o-mini";

lazy_static! {
    static ref FLAG: Regex = Regex::new(r"\{\{FLG:[^}]*\}\}").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotMessage {
    #[serde(rename = "msgID")]
    pub msg_id: i64,
    pub text: String,
}

/// The robot either keeps talking or rejects the last message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RobotResponse {
    Message(RobotMessage),
    Rejection { code: i64, message: String },
}

pub fn contains_flag(text: &str) -> bool {
    FLAG.is_match(text)
}

/// Talk to the robot at `endpoint` until it reveals a flag, starting with `READY`.
///
/// Returns the robot message carrying the flag.
pub async fn talk_with_robot(
    http: &HttpClient,
    llm: &dyn LlmClient,
    endpoint: &str,
    turn_limit: u32,
) -> PipelineResult<RobotMessage> {
    let mut outgoing = RobotMessage {
        msg_id: 0,
        text: "READY".to_string(),
    };
    let mut remaining = turn_limit;

    loop {
        info!(msg_id = outgoing.msg_id, text = %outgoing.text, "Me to robot");
        let response: RobotResponse = http.post_json(endpoint, &outgoing).await?;

        let RobotMessage { msg_id, text } = match response {
            RobotResponse::Message(message) => message,
            RobotResponse::Rejection { code, message } => {
                return Err(PipelineError::domain(format!(
                    "Incorrect response from robot: code: {}, {}",
                    code, message
                )));
            }
        };

        if contains_flag(&text) {
            info!(flag = %text, "Flag is");
            return Ok(RobotMessage { msg_id, text });
        }
        if msg_id == 0 {
            return Err(PipelineError::domain("Robot doesn't want to talk with me!"));
        }
        if remaining == 0 {
            return Err(PipelineError::domain("Conversation finished without success"));
        }

        let answer = find_the_answer(llm, &text).await?;
        outgoing = RobotMessage {
            msg_id,
            text: answer,
        };
        remaining -= 1;
    }
}

async fn find_the_answer(llm: &dyn LlmClient, question: &str) -> PipelineResult<String> {
    let request = ChatRequest::new(
        MODEL,
        vec![
            Message::system().with_text(render_prompt("robot.md", &json!({}))?),
            Message::user().with_text(question),
        ],
    );
    llm.completion_with_text(&request, None).await
}
