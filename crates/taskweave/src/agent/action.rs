use serde::{Deserialize, Serialize};

/// What the model wants to do next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NextAction {
    /// Load the given pages into the conversation
    Fetch { urls: Vec<String> },
    /// Answer the rephrased query from the collected documents
    Solved { query: String },
    /// Give up with an explanation for the user
    Resign { explanation: String },
}

/// The JSON object the model replies with on every decision turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextActionResponse {
    #[serde(rename = "_thinking", default)]
    pub thinking: String,
    #[serde(rename = "nextAction")]
    pub next_action: NextAction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use serde_json::json;

    #[test]
    fn test_decode_each_variant() {
        let fetch: NextActionResponse = decode(&json!({
            "_thinking": "need the portfolio page",
            "nextAction": {"type": "fetch", "urls": ["https://softo.ag3nts.org/portfolio"]}
        }))
        .unwrap();
        assert_eq!(
            fetch.next_action,
            NextAction::Fetch {
                urls: vec!["https://softo.ag3nts.org/portfolio".to_string()]
            }
        );

        let solved: NextActionResponse = decode(&json!({
            "nextAction": {"type": "solved", "query": "What is the email?"}
        }))
        .unwrap();
        assert_eq!(solved.thinking, "");
        assert!(matches!(solved.next_action, NextAction::Solved { .. }));

        let resign: NextActionResponse = decode(&json!({
            "_thinking": "",
            "nextAction": {"type": "resign", "explanation": "nothing found"}
        }))
        .unwrap();
        assert_eq!(
            resign.next_action,
            NextAction::Resign {
                explanation: "nothing found".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_or_incomplete_action_is_rejected() {
        let unknown = decode::<NextActionResponse>(&json!({
            "_thinking": "",
            "nextAction": {"type": "search", "query": "x"}
        }))
        .unwrap_err();
        assert!(unknown.to_string().contains("nextAction"));

        let missing = decode::<NextActionResponse>(&json!({
            "nextAction": {"type": "fetch"}
        }))
        .unwrap_err();
        assert!(missing.to_string().contains("urls"));
    }
}
