use thiserror::Error;

use crate::transport::TransportError;

/// Why an attempt, or a whole execution, did not produce a usable response.
///
/// Attached to error responses as the underlying cause; never serialized.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("upstream responded with status {0}")]
    UpstreamStatus(u16),
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FailureCause {
    /// Status code observed from the dependency, if it answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            FailureCause::UpstreamStatus(status) => Some(*status),
            _ => None,
        }
    }
}
