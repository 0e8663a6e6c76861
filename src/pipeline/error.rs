//! Pipeline error types.

use axum::http::StatusCode;
use thiserror::Error;

use crate::pipeline::transport::TransportError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request to {target} blocked: {reason}")]
    PolicyViolation { target: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("upstream responded with status {status}")]
    UpstreamServer { status: u16, preview: String },

    #[error("{message}")]
    Internal { message: String },
}

impl PipelineError {
    pub fn internal(message: impl Into<String>) -> Self {
        PipelineError::Internal {
            message: message.into(),
        }
    }

    /// Machine-readable `CATEGORY-NNNN` code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::PolicyViolation { .. } => "POLICY-1001",
            PipelineError::Transport(_) => "TRANSPORT-2001",
            PipelineError::UpstreamServer { .. } => "UPSTREAM-2002",
            PipelineError::Internal { .. } => "PIPELINE-5001",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::PolicyViolation { .. } => StatusCode::BAD_REQUEST,
            PipelineError::Transport(_) | PipelineError::UpstreamServer { .. } => StatusCode::BAD_GATEWAY,
            PipelineError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            PipelineError::PolicyViolation { .. } => "The request was blocked by proxy policy.",
            PipelineError::Transport(_) => "The site could not be reached.",
            PipelineError::UpstreamServer { .. } => "The site returned a server error.",
            PipelineError::Internal { .. } => "The proxy failed to process the request.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let policy = PipelineError::PolicyViolation {
            target: "http://proxy.test/".to_string(),
            reason: "same origin".to_string(),
        };
        assert_eq!(policy.code(), "POLICY-1001");
        assert_eq!(policy.status(), StatusCode::BAD_REQUEST);

        let upstream = PipelineError::UpstreamServer {
            status: 503,
            preview: String::new(),
        };
        assert_eq!(upstream.code(), "UPSTREAM-2002");
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(PipelineError::internal("x").status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
