use crate::verifier::VerificationResult;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlqError {
    #[error("Metadata fetch error: {0}")]
    MetadataFetch(String),

    #[error("Generation error: {message}")]
    Generation {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    /// A generated candidate was rejected by the safety gate. Not an
    /// infrastructure fault; callers may re-prompt.
    #[error("Query verification failed: {}", .0.failed_checks().join(", "))]
    Verification(VerificationResult),

    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NlqError {
    pub fn generation(message: impl Into<String>) -> Self {
        NlqError::Generation {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        NlqError::QueryExecution {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn is_verification_failure(&self) -> bool {
        matches!(self, NlqError::Verification(_))
    }

    /// Upstream HTTP status, when the fault came from a remote response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            NlqError::Generation { status, .. } | NlqError::QueryExecution { status, .. } => *status,
            _ => None,
        }
    }

    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            NlqError::Generation { body, .. } | NlqError::QueryExecution { body, .. } => body.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NlqError>;
