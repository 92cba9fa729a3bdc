use thiserror::Error;

/// Reasons a pressure session (or a single frame of one) is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("missing source: {0}")]
    MissingSource(String),

    #[error("out of range: {0}")]
    Range(String),
}

impl PipelineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn missing(msg: impl Into<String>) -> Self {
        Self::MissingSource(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput(_) => "MalformedInput",
            PipelineError::MissingSource(_) => "MissingSource",
            PipelineError::Range(_) => "Range",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
