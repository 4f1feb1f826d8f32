//! Combinators for threading [`PipelineResult`] through asynchronous steps.
//!
//! `map` and `chain` are the ones the standard library and `futures` already provide
//! (`Result::map`, `Result::and_then`, `TryFutureExt::map_ok`, `TryFutureExt::and_then`
//! and `?`). This module adds the pieces they don't: labelled wrapping of foreign
//! failures, fail-fast sequencing, named fan-out with a join, logging adapters and the
//! conversion to the CLI's native outcome at the program edge.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::future::Future;

use futures::future::try_join_all;
use serde::Serialize;
use tracing::{error, info};

use crate::errors::{BoxError, PipelineError, PipelineResult};

/// Await a fallible foreign operation and wrap its failure with a descriptive label.
pub async fn try_execute<T, E, F>(label: &str, operation: F) -> PipelineResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    operation.await.map_err(|err| {
        let err: BoxError = err.into();
        error!(label, error = %err, "step failed");
        PipelineError::execution(label, err)
    })
}

/// Synchronous counterpart of [`try_execute`] for parsers and other pure fallible calls.
pub fn try_execute_sync<T, E, F>(label: &str, operation: F) -> PipelineResult<T>
where
    F: FnOnce() -> Result<T, E>,
    E: Into<BoxError>,
{
    operation().map_err(|err| {
        let err: BoxError = err.into();
        error!(label, error = %err, "step failed");
        PipelineError::execution(label, err)
    })
}

/// Run steps one after another, stopping at the first error.
///
/// Steps are awaited in iteration order; a step after a failed one is never polled.
pub async fn sequence<T, I>(steps: I) -> PipelineResult<Vec<T>>
where
    I: IntoIterator,
    I::Item: Future<Output = PipelineResult<T>>,
{
    let mut values = Vec::new();
    for step in steps {
        values.push(step.await?);
    }
    Ok(values)
}

/// Run independent named branches concurrently and join them into a record.
///
/// The first error wins and no partial record is ever returned. Branch names have to be
/// unique; a repeated name is rejected before any branch is polled.
pub async fn parallel_all<K, T, I, F>(branches: I) -> PipelineResult<BTreeMap<K, T>>
where
    K: Ord + Debug,
    I: IntoIterator<Item = (K, F)>,
    F: Future<Output = PipelineResult<T>>,
{
    let (keys, futures): (Vec<K>, Vec<F>) = branches.into_iter().unzip();
    let mut seen = BTreeSet::new();
    if let Some(duplicate) = keys.iter().find(|key| !seen.insert(*key)) {
        return Err(PipelineError::validation(
            format!("{:?}", duplicate),
            "duplicate branch name",
        ));
    }
    let values = try_join_all(futures).await?;
    Ok(keys.into_iter().zip(values).collect())
}

/// Convert a pipeline result into the binary's native outcome.
///
/// Only `main` and tests should call this; pipeline stages keep the typed error.
pub fn to_outcome<T>(result: PipelineResult<T>) -> anyhow::Result<T> {
    result.map_err(|err| {
        error!(error = %err, "pipeline failed");
        anyhow::Error::new(err)
    })
}

/// Observation adapters for results flowing through a pipeline
pub trait ResultExt<T> {
    /// Run a side effect on the success value and pass the result through
    fn tap<F: FnOnce(&T)>(self, f: F) -> Self;

    /// Log the success value as JSON, or the error, and pass the result through
    fn log_pipe(self, msg: &str) -> Self
    where
        T: Serialize;

    /// Like [`ResultExt::log_pipe`] but logs a projection of the success value
    fn log_projection<K: Serialize, P: FnOnce(&T) -> K>(self, projection: P, msg: &str) -> Self;
}

impl<T> ResultExt<T> for PipelineResult<T> {
    fn tap<F: FnOnce(&T)>(self, f: F) -> Self {
        if let Ok(value) = &self {
            f(value);
        }
        self
    }

    fn log_pipe(self, msg: &str) -> Self
    where
        T: Serialize,
    {
        self.log_projection(|value| serde_json::to_value(value).ok(), msg)
    }

    fn log_projection<K: Serialize, P: FnOnce(&T) -> K>(self, projection: P, msg: &str) -> Self {
        match &self {
            Ok(value) => {
                let rendered = serde_json::to_string_pretty(&projection(value))
                    .unwrap_or_else(|e| format!("<unserializable: {}>", e));
                info!("{}: {}", msg, rendered);
            }
            Err(err) => error!("{}: {}", msg, err),
        }
        self
    }
}
