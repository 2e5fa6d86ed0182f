use std::time::Duration;

use thiserror::Error;

/// Failures talking to the synthesis service.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("request to synthesis service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("synthesis service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("audio stream interrupted: {0}")]
    Stream(String),

    #[error("synthesis service sent no audio within {0:?}")]
    Timeout(Duration),
}

impl SynthesisError {
    /// True when the service answered but refused the request, as opposed to
    /// a transport failure.
    pub fn is_upstream_rejection(&self) -> bool {
        matches!(self, SynthesisError::Upstream { .. })
    }
}
