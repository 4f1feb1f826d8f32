//! Fix the arithmetic of a calibration file and fill in its open test questions.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::errors::{PipelineError, PipelineResult};
use crate::headquarters::{Headquarters, ReportAck};
use crate::http::HttpClient;
use crate::models::message::Message;
use crate::providers::base::{ChatRequest, LlmClient};
use crate::telemetry::{TraceContext, Tracer};

pub const TASK: &str = "JSON";
const MODEL: &str = "gpt-4o";

lazy_static! {
    static ref MATH_TEST: Regex = Regex::new(r"\d+\s*[\+\-\*/]\s*\d+").unwrap();
    static ref MATH_OPERATION: Regex = Regex::new(r"(\d+)\s*([\+\-\*/])\s*(\d+)").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenQuestion {
    pub q: String,
    pub a: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    pub question: String,
    pub answer: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<OpenQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    pub apikey: String,
    pub description: String,
    pub copyright: String,
    #[serde(rename = "test-data")]
    pub test_data: Vec<TestData>,
}

fn invalid_question(question: &str) -> PipelineError {
    PipelineError::domain(format!(
        "Invalid math question: {}",
        serde_json::Value::from(question)
    ))
}

/// Compute `a <op> b` found in `question`, e.g. "What is 2+3?" gives 5.
///
/// Division that does not come out even yields a float.
pub fn recalculate_math(question: &str) -> PipelineResult<Number> {
    let parts = MATH_OPERATION
        .captures(question)
        .ok_or_else(|| invalid_question(question))?;
    let left: i64 = parts[1].parse().map_err(|_| invalid_question(question))?;
    let right: i64 = parts[3].parse().map_err(|_| invalid_question(question))?;

    let result = match &parts[2] {
        "+" => left.checked_add(right).map(Number::from),
        "-" => left.checked_sub(right).map(Number::from),
        "*" => left.checked_mul(right).map(Number::from),
        "/" if right != 0 && left % right == 0 => Some(Number::from(left / right)),
        "/" => Number::from_f64(left as f64 / right as f64),
        operator => {
            return Err(PipelineError::domain(format!(
                "Invalid operator: {} in question: {}",
                operator, question
            )))
        }
    };
    result.ok_or_else(|| invalid_question(question))
}

async fn answer_open_question(
    llm: &dyn LlmClient,
    question: &str,
    trace: &TraceContext,
) -> PipelineResult<String> {
    let request = ChatRequest::new(
        MODEL,
        vec![
            Message::system().with_text("Answer the user question, be precise and concise"),
            Message::user().with_text(question),
        ],
    );
    llm.completion_with_text(&request, Some(trace)).await
}

/// Recompute one entry; entries without an arithmetic question are rejected
pub async fn recalibrate_entry(
    llm: &dyn LlmClient,
    entry: TestData,
    trace: &TraceContext,
) -> PipelineResult<TestData> {
    if !MATH_TEST.is_match(&entry.question) {
        let json = serde_json::to_string(&entry).unwrap_or_default();
        return Err(PipelineError::domain(format!(
            "Invalid Test Data data: {}",
            json
        )));
    }

    let answer = recalculate_math(&entry.question)?;
    let test = match entry.test {
        Some(test) => {
            let a = answer_open_question(llm, &test.q, trace).await?;
            Some(OpenQuestion { a, ..test })
        }
        None => None,
    };
    Ok(TestData {
        answer,
        test,
        ..entry
    })
}

/// Recompute every entry in order, stopping at the first invalid one
pub async fn recalibrate_data(
    llm: &dyn LlmClient,
    data: CalibrationData,
    apikey: &str,
    trace: &TraceContext,
) -> PipelineResult<CalibrationData> {
    let mut test_data = Vec::with_capacity(data.test_data.len());
    for entry in data.test_data {
        test_data.push(recalibrate_entry(llm, entry, trace).await?);
    }
    Ok(CalibrationData {
        apikey: apikey.to_string(),
        test_data,
        ..data
    })
}

pub async fn recalibrate(
    http: &HttpClient,
    llm: &dyn LlmClient,
    headquarters: &Headquarters,
    tracer: &Tracer,
) -> PipelineResult<ReportAck> {
    tracer
        .with_trace("RecalibrateData", |trace| async move {
            let input: CalibrationData = http.get_json(&headquarters.data_url("json.txt")).await?;
            let calibrated = recalibrate_data(llm, input, headquarters.api_key(), &trace).await?;
            trace
                .with_span("Report to Headquarter", calibrated, |data, _| async move {
                    headquarters.report(TASK, &data).await
                })
                .await
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockLlm;
    use serde_json::json;

    #[test]
    fn test_recalculate_math() {
        assert_eq!(recalculate_math("What is 2+3?").unwrap(), Number::from(5));
        assert_eq!(recalculate_math("12 - 20").unwrap(), Number::from(-8));
        assert_eq!(recalculate_math("6 * 7").unwrap(), Number::from(42));
        assert_eq!(recalculate_math("9 / 3").unwrap(), Number::from(3));
        assert_eq!(
            recalculate_math("7 / 2").unwrap(),
            Number::from_f64(3.5).unwrap()
        );
        assert!(recalculate_math("no numbers here").is_err());
        assert!(recalculate_math("1 / 0").is_err());
    }

    #[tokio::test]
    async fn test_entries_are_fixed_and_open_questions_answered() {
        let llm = MockLlm::with_texts(["Warsaw"]);
        let data: CalibrationData = serde_json::from_value(json!({
            "apikey": "%PUT-YOUR-API-KEY-HERE%",
            "description": "calibration",
            "copyright": "Copyright (C) 2238 by BanAN",
            "test-data": [
                {"question": "45 + 86", "answer": 1},
                {"question": "97 + 34", "answer": 131, "test": {"q": "capital city of Poland?", "a": "???"}}
            ]
        }))
        .unwrap();

        let fixed = recalibrate_data(&llm, data, "key-123", &TraceContext::detached())
            .await
            .unwrap();

        assert_eq!(fixed.apikey, "key-123");
        assert_eq!(fixed.test_data[0].answer, Number::from(131));
        assert_eq!(fixed.test_data[1].test.as_ref().unwrap().a, "Warsaw");
        assert_eq!(llm.calls(), 1);
        assert_eq!(
            serde_json::to_value(&fixed).unwrap()["test-data"][0],
            json!({"question": "45 + 86", "answer": 131})
        );
    }

    #[tokio::test]
    async fn test_non_arithmetic_entry_is_rejected() {
        let llm = MockLlm::new(vec![]);
        let entry = TestData {
            question: "What is the answer?".to_string(),
            answer: Number::from(42),
            test: None,
        };

        let err = recalibrate_entry(&llm, entry, &TraceContext::detached())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"Invalid Test Data data: {"question":"What is the answer?","answer":42}"#
        );
    }
}
