use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FailureCause;

pub const CIRCUIT_OPEN_CODE: u16 = 503;
pub const INTERNAL_ERROR_CODE: u16 = 500;

pub const CIRCUIT_OPEN_MESSAGE: &str = "Circuit is open";
pub const DECODE_FAILED_MESSAGE: &str = "Failed to decode response body";
pub const EXECUTION_FAILED_MESSAGE: &str = "Failed to execute request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Success,
    Fallback,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub message: String,
    #[serde(skip)]
    pub cause: Option<Arc<FailureCause>>,
}

/// Outcome of one guarded execution. Callers branch on `response_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerResponse {
    #[serde(rename = "http-status")]
    pub http_status: u16,
    #[serde(rename = "response-type")]
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl BreakerResponse {
    pub fn success(http_status: u16, data: Option<Value>, raw: String) -> Self {
        Self {
            http_status,
            response_type: ResponseType::Success,
            data,
            error: None,
            raw: Some(raw),
        }
    }

    /// Convenience for fallback hooks returning a canned payload.
    pub fn fallback(http_status: u16, data: Value) -> Self {
        Self {
            http_status,
            response_type: ResponseType::Fallback,
            data: Some(data),
            error: None,
            raw: None,
        }
    }

    pub fn error(
        http_status: u16,
        code: u16,
        message: impl Into<String>,
        cause: Option<FailureCause>,
    ) -> Self {
        Self {
            http_status,
            response_type: ResponseType::Error,
            data: None,
            error: Some(ErrorDetail {
                code,
                message: message.into(),
                cause: cause.map(Arc::new),
            }),
            raw: None,
        }
    }

    pub fn circuit_open() -> Self {
        Self::error(CIRCUIT_OPEN_CODE, CIRCUIT_OPEN_CODE, CIRCUIT_OPEN_MESSAGE, None)
    }

    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        self.error.as_ref()?.cause.as_deref()
    }
}
