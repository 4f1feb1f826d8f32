//! Index weapon test reports in the vector store and find the one about a stolen prototype.
use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::chunks::ChunkService;
use crate::errors::{PipelineError, PipelineResult};
use crate::filesystem::get_text_files_content;
use crate::headquarters::{Headquarters, ReportAck};
use crate::models::chunk::Chunk;
use crate::models::file::TextFileContent;
use crate::telemetry::{TraceContext, Tracer};
use crate::vector::VectorService;

pub const TASK: &str = "wektory";
const QUESTION: &str =
    "W raporcie, z którego dnia znajduje się wzmianka o kradzieży prototypu broni";

/// `2024_02_21.txt` is the report of `2024-02-21`
fn report_date(name: &str) -> String {
    name.split('.').next().unwrap_or(name).replace('_', "-")
}

/// One chunk per non-empty line of the report
pub fn extract_chunks(document: &TextFileContent) -> Vec<Chunk> {
    document
        .text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            Chunk::new(document.name.as_str(), line)
                .with_metadata("date", report_date(&document.name))
                .with_metadata("docPath", document.parent.display().to_string())
                .with_metadata("docName", document.name.as_str())
        })
        .collect()
}

async fn index_reports(
    chunks: &ChunkService,
    vectors: &VectorService,
    dir: &Path,
    trace: &TraceContext,
) -> PipelineResult<usize> {
    let documents = get_text_files_content(dir, ".txt").await?;
    let mut indexed = 0;
    for document in &documents {
        for chunk in extract_chunks(document) {
            let contextual = chunks.contextualize(chunk, &document.text, Some(trace)).await?;
            vectors.add_chunk(contextual, Some(trace)).await?;
            indexed += 1;
        }
    }
    info!(indexed, "Indexed report chunks");
    Ok(indexed)
}

/// Date of the report that best matches the question
pub async fn find_report_date(
    vectors: &VectorService,
    trace: &TraceContext,
) -> PipelineResult<String> {
    let hits = vectors.search(QUESTION, 1, Some(trace)).await?;
    let best = hits
        .first()
        .ok_or_else(|| PipelineError::domain("No matching report"))?;
    match best.metadata.get("date") {
        Some(Value::String(date)) => Ok(date.clone()),
        _ => Err(PipelineError::validation("metadata.date", "missing report date")),
    }
}

pub async fn solve(
    chunks: &ChunkService,
    vectors: &VectorService,
    headquarters: &Headquarters,
    tracer: &Tracer,
    dir: &Path,
) -> PipelineResult<ReportAck> {
    tracer
        .with_trace("Play with Vectors", |trace| async move {
            vectors.reset().await?;
            index_reports(chunks, vectors, dir, &trace).await?;
            let date = find_report_date(vectors, &trace).await?;
            info!(date = %date, "Date of the report");
            headquarters.report(TASK, &date).await
        })
        .await
}
