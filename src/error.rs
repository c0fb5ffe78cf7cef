//! Error taxonomy shared by every pipeline step

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An external tool produced no usable output. Carries the tool's stderr.
    #[error("no data produced by `{tool}`. Error?\n{stderr}")]
    UpstreamToolFailure { tool: String, stderr: String },

    #[error("malformed input in {source_name}: {detail}")]
    MalformedInput { source_name: String, detail: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    pub fn malformed(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedInput {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }
}
