//! Error types for each pipeline stage.
//!
//! Every stage returns its own error enum; [`PipelineError`] wraps them so a
//! run can be propagated with `?` and reported once at the top.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum CondenseError {
    #[error("Cannot reach summarizer at {host}: {message}")]
    Unreachable { host: String, message: String },

    #[error("Summarizer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Summarizer response is not valid JSON: {0}")]
    Malformed(String),

    #[error("Summarizer response has no output field")]
    MissingOutput,

    #[error("Summarizer returned an empty summary")]
    EmptyOutput,

    #[error("Invalid summarizer client setup: {0}")]
    Client(String),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("Cannot synthesize an empty script")]
    EmptyScript,

    #[error("Speech backend produced no audio")]
    EmptyAudio,

    #[error("Speech service request failed: {0}")]
    Network(String),

    #[error("Speech service returned HTTP {status}")]
    Status { status: u16 },

    #[error("Speech engine '{binary}' is not available: {message}")]
    EngineUnavailable { binary: String, message: String },

    #[error("Speech engine failed: {0}")]
    Engine(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid run metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Invalid run identifier: {0}")]
    InvalidId(String),

    #[error("No stored podcast for '{0}'")]
    NotFound(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("No article text found at {url}")]
    EmptyContent { url: String },

    #[error("Summarization failed: {0}")]
    Condense(#[from] CondenseError),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Saving podcast failed: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Short stage name used in history records and API responses.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::EmptyContent { .. } => "extract",
            Self::Condense(_) => "condense",
            Self::Synthesis(_) => "synthesize",
            Self::Store(_) => "store",
        }
    }

    /// True when the failure was caused by the input URL rather than a backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Fetch(FetchError::InvalidUrl { .. })
                | Self::Fetch(FetchError::Status { .. })
                | Self::EmptyContent { .. }
        )
    }
}
