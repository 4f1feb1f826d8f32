//! Transcribe witness recordings and deduce an answer from the testimonials.
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::info;

use crate::errors::{PipelineError, PipelineResult};
use crate::filesystem::{
    get_binary_file_content, get_file_names, get_text_files_content, save_text_file,
};
use crate::headquarters::{Headquarters, ReportAck};
use crate::models::file::FileRef;
use crate::models::message::Message;
use crate::prompt_template::render_prompt;
use crate::providers::base::{ChatRequest, LlmClient, TranscriptionRequest};
use crate::telemetry::{TraceContext, Tracer};

pub const TASK: &str = "mp3";
const MODEL: &str = "gpt-4o";
const QUESTION: &str = "Andrzej Maj works on university, try to deduce the street name of his faculty or institute where he belongs. Answer only with street name";

lazy_static! {
    static ref ANSWER: Regex = Regex::new(r"<ANSWER>(.*?)</ANSWER>").unwrap();
}

/// Payload of the first `<ANSWER>...</ANSWER>` tag
pub fn extract_answer(text: &str) -> PipelineResult<String> {
    ANSWER
        .captures(text)
        .map(|captures| captures[1].to_string())
        .ok_or_else(|| PipelineError::domain("Answer not found"))
}

async fn transcribe_testimonial(
    llm: &dyn LlmClient,
    file: &FileRef,
    model: &str,
    trace: &TraceContext,
) -> PipelineResult<PathBuf> {
    let audio = get_binary_file_content(file).await?;
    let transcript = llm
        .transcribe(
            TranscriptionRequest {
                audio: audio.bytes,
                file_name: file.name.clone(),
                model: model.to_string(),
                language: Some("pl".to_string()),
            },
            Some(trace),
        )
        .await?;
    save_text_file(&file.parent, &format!("{}.txt", file.name), &transcript).await
}

/// Transcribe every `.m4a` recording in `dir` into a sibling `.txt` file, one at a time
pub async fn transcribe_testimonials(
    llm: &dyn LlmClient,
    dir: &Path,
    model: &str,
    tracer: &Tracer,
) -> PipelineResult<Vec<PathBuf>> {
    tracer
        .with_trace("Transcribe testimonials", |trace| async move {
            let recordings = get_file_names(dir, ".m4a").await?;
            let mut written = Vec::with_capacity(recordings.len());
            for recording in &recordings {
                written.push(transcribe_testimonial(llm, recording, model, &trace).await?);
            }
            info!(count = written.len(), "Transcribed testimonials");
            Ok(written)
        })
        .await
}

/// Ask the investigator prompt about the testimonials found in `dir`
pub async fn question_witnesses(
    llm: &dyn LlmClient,
    dir: &Path,
    trace: Option<&TraceContext>,
) -> PipelineResult<String> {
    let testimonials: Vec<String> = get_text_files_content(dir, ".txt")
        .await?
        .into_iter()
        .map(|file| file.text)
        .collect();

    let system = render_prompt(
        "testimonials.md",
        &json!({ "testimonials": testimonials.join("\n\n") }),
    )?;
    let request = ChatRequest::new(
        MODEL,
        vec![
            Message::system().with_text(system),
            Message::user().with_text(QUESTION),
        ],
    );
    let reply = llm.completion_with_text(&request, trace).await?;
    extract_answer(&reply)
}

pub async fn solve(
    llm: &dyn LlmClient,
    headquarters: &Headquarters,
    tracer: &Tracer,
    dir: &Path,
    transcription_model: Option<&str>,
) -> PipelineResult<ReportAck> {
    if let Some(model) = transcription_model {
        transcribe_testimonials(llm, dir, model, tracer).await?;
    }
    let answer = tracer
        .with_trace("Witnesses questioning", |trace| async move {
            question_witnesses(llm, dir, Some(&trace)).await
        })
        .await?;
    headquarters.report(TASK, &answer).await
}
