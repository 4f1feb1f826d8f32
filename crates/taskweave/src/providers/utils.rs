use serde_json::{json, Map, Value};

use super::base::{ChatRequest, Completion, FinishReason, Usage};
use crate::errors::{PipelineError, PipelineResult};
use crate::models::message::{Message, MessageContent};

/// Convert internal Message format to OpenAI's API message specification
///   text-only messages collapse into a plain string, mixed messages become a part list
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let text_only = message
                .content
                .iter()
                .all(|content| content.as_text().is_some());

            let content = if text_only {
                json!(message.text())
            } else {
                Value::Array(message.content.iter().map(content_to_part).collect())
            };

            json!({
                "role": message.role,
                "content": content,
            })
        })
        .collect()
}

fn content_to_part(content: &MessageContent) -> Value {
    match content {
        MessageContent::Text { text } => json!({"type": "text", "text": text}),
        MessageContent::ImageUrl { url } => json!({
            "type": "image_url",
            "image_url": {"url": url}
        }),
    }
}

/// Build the chat completion payload, leaving out unset optional parameters
pub fn chat_request_to_payload(request: &ChatRequest) -> PipelineResult<Value> {
    let mut payload = Map::new();
    payload.insert("model".to_string(), json!(request.model));
    payload.insert(
        "messages".to_string(),
        Value::Array(messages_to_openai_spec(&request.messages)),
    );

    if let Some(format) = &request.response_format {
        let format = serde_json::to_value(format)
            .map_err(|e| PipelineError::execution("Serialize response format", e))?;
        payload.insert("response_format".to_string(), format);
    }
    if let Some(temp) = request.temperature {
        payload.insert("temperature".to_string(), json!(temp));
    }
    if let Some(tokens) = request.max_tokens {
        payload.insert("max_tokens".to_string(), json!(tokens));
    }

    Ok(Value::Object(payload))
}

pub fn get_usage(data: &Value) -> Option<Usage> {
    let usage = data.get("usage")?;

    let input_tokens = usage
        .get("prompt_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let output_tokens = usage
        .get("completion_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok());

    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_i64())
        .and_then(|v| i32::try_from(v).ok())
        .or_else(|| match (input_tokens, output_tokens) {
            (Some(input), Some(output)) => input.checked_add(output),
            _ => None,
        });

    Some(Usage::new(input_tokens, output_tokens, total_tokens))
}

/// Pick the first choice of a chat completion response and reject truncated ones
pub fn openai_response_to_completion(response: &Value) -> PipelineResult<Completion> {
    if let Some(error) = response.get("error") {
        return Err(PipelineError::domain(format!("OpenAI API error: {}", error)));
    }

    let choice = response
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| PipelineError::domain("No content in response"))?;

    let finish_reason: FinishReason = choice
        .get("finish_reason")
        .cloned()
        .and_then(|reason| serde_json::from_value(reason).ok())
        .unwrap_or(FinishReason::Other);

    match finish_reason {
        FinishReason::ContentFilter => {
            Err(PipelineError::domain("Content Filter blocked content"))
        }
        FinishReason::Length => Err(PipelineError::domain(
            "Not enough token to generate response",
        )),
        finish_reason => Ok(Completion {
            content: choice["message"]["content"].as_str().map(String::from),
            finish_reason,
            usage: get_usage(response),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::base::ResponseFormat;

    #[test]
    fn test_messages_to_openai_spec() {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_messages_with_images_become_parts() {
        let message = Message::user()
            .with_text("Describe")
            .with_image_url("data:image/jpeg;base64,AAAA");
        let spec = messages_to_openai_spec(&[Message::system().with_text("Be brief"), message]);

        assert_eq!(spec[0]["role"], "system");
        assert_eq!(
            spec[1]["content"],
            json!([
                {"type": "text", "text": "Describe"},
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
            ])
        );
    }

    #[test]
    fn test_payload_omits_unset_options() {
        let request = ChatRequest::new("gpt-4o", vec![Message::user().with_text("hi")]);
        let payload = chat_request_to_payload(&request).unwrap();
        assert!(payload.get("temperature").is_none());
        assert!(payload.get("response_format").is_none());

        let request = request
            .with_response_format(ResponseFormat::JsonObject)
            .with_max_tokens(100);
        let payload = chat_request_to_payload(&request).unwrap();
        assert_eq!(payload["response_format"], json!({"type": "json_object"}));
        assert_eq!(payload["max_tokens"], 100);
    }

    #[test]
    fn test_completion_failures() {
        let cases = [
            (json!({"choices": []}), "No content in response"),
            (
                json!({"choices": [{"message": {"content": ""}, "finish_reason": "content_filter"}]}),
                "Content Filter blocked content",
            ),
            (
                json!({"choices": [{"message": {"content": "cut"}, "finish_reason": "length"}]}),
                "Not enough token to generate response",
            ),
        ];

        for (response, expected) in cases {
            let err = openai_response_to_completion(&response).unwrap_err();
            assert_eq!(err.to_string(), expected);
        }

        let err = openai_response_to_completion(&json!({"error": {"message": "bad key"}}))
            .unwrap_err();
        assert!(err.to_string().starts_with("OpenAI API error:"));
    }

    #[test]
    fn test_usage_total_falls_back_to_sum() {
        let usage = get_usage(&json!({"usage": {"prompt_tokens": 3, "completion_tokens": 4}}));
        assert_eq!(usage, Some(Usage::new(Some(3), Some(4), Some(7))));
        assert_eq!(get_usage(&json!({})), None);
    }

    #[test]
    fn test_usage_out_of_range_counts_are_dropped() {
        let usage = get_usage(&json!({"usage": {
            "prompt_tokens": 5_000_000_000i64,
            "completion_tokens": 4
        }}));
        assert_eq!(usage, Some(Usage::new(None, Some(4), None)));

        let usage = get_usage(&json!({"usage": {
            "prompt_tokens": i32::MAX,
            "completion_tokens": 1
        }}));
        assert_eq!(usage, Some(Usage::new(Some(i32::MAX), Some(1), None)));
    }
}
