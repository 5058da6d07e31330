//! Error types for the analysis pipeline

use heatsense_core::CoreError;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an external data provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("nothing found for {0}")]
    NotFound(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("{0}")]
    Other(String),
}

impl From<CoreError> for ProviderError {
    fn from(err: CoreError) -> Self {
        ProviderError::Other(err.to_string())
    }
}

/// Error that fails a pipeline run or one of its branches
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Rejected before any I/O
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{stage} failed: {source}")]
    Provider {
        stage: String,
        #[source]
        source: ProviderError,
    },

    #[error("{stage} timed out after {timeout:?}")]
    Timeout { stage: String, timeout: Duration },

    #[error("{stage} returned no data")]
    EmptyResult { stage: String },

    /// An analysis branch could not produce its result
    #[error("{branch} branch failed: {reason}")]
    Branch { branch: String, reason: String },

    /// A spawned task panicked or was cancelled
    #[error("{task} task did not complete: {reason}")]
    Join { task: String, reason: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    pub fn provider(stage: impl Into<String>, source: ProviderError) -> Self {
        PipelineError::Provider {
            stage: stage.into(),
            source,
        }
    }

    pub fn timeout(stage: impl Into<String>, timeout: Duration) -> Self {
        PipelineError::Timeout {
            stage: stage.into(),
            timeout,
        }
    }

    pub fn empty(stage: impl Into<String>) -> Self {
        PipelineError::EmptyResult {
            stage: stage.into(),
        }
    }

    pub fn branch(branch: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::Branch {
            branch: branch.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::Timeout {
            stage: "temperature".to_string(),
            timeout: Duration::from_secs(120),
        };
        assert_eq!(err.to_string(), "temperature timed out after 120s");

        let err = PipelineError::provider("land cover fetch", ProviderError::NotFound("Leipzig".to_string()));
        assert_eq!(err.to_string(), "land cover fetch failed: nothing found for Leipzig");

        let err = PipelineError::branch("hotspots", "no grid");
        assert!(err.to_string().contains("hotspots branch failed"));
    }

    #[test]
    fn test_core_error_conversion() {
        let err: PipelineError = CoreError::ConfigError("bad".to_string()).into();
        assert!(matches!(err, PipelineError::Core(_)));
    }
}
