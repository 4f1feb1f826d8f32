use thiserror::Error;

/// Boxed cause carried by [`PipelineError::Execution`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error side of every pipeline step.
///
/// Transport and IO failures are wrapped with the label of the operation that produced
/// them, decode failures keep the offending field path, and intentional business failures
/// carry only their message.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{label}: {source}")]
    Execution {
        label: String,
        #[source]
        source: BoxError,
    },

    #[error("Validation failed at `{path}`: {message}")]
    Validation { path: String, message: String },

    #[error("{0}")]
    Domain(String),

    #[error("Processing limit exceeded")]
    ProcessingLimitExceeded,
}

impl PipelineError {
    pub fn execution<L, E>(label: L, source: E) -> Self
    where
        L: Into<String>,
        E: Into<BoxError>,
    {
        PipelineError::Execution {
            label: label.into(),
            source: source.into(),
        }
    }

    pub fn validation<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        PipelineError::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn domain<S: Into<String>>(message: S) -> Self {
        PipelineError::Domain(message.into())
    }

    /// Label of the failed operation, for execution errors only
    pub fn label(&self) -> Option<&str> {
        match self {
            PipelineError::Execution { label, .. } => Some(label),
            _ => None,
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
