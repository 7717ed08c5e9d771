//! Outbound call interface used by the breaker to reach the dependency.

mod http;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{OutboundRequest, TransportResponse};

pub use self::http::ReqwestTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Other(String),
}

/// One request/response exchange. Implementations must not retry; the
/// breaker owns retry and backoff.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}
