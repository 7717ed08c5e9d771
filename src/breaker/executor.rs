use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::Breaker;
use crate::error::FailureCause;
use crate::transport::TransportError;
use crate::types::{
    BreakerResponse, CircuitState, DECODE_FAILED_MESSAGE, EXECUTION_FAILED_MESSAGE,
    INTERNAL_ERROR_CODE, OutboundRequest, TransportResponse,
};

const SINGLE_ATTEMPT: &[Duration] = &[Duration::ZERO];

impl Breaker {
    /// Sends `request` through the breaker.
    ///
    /// Never fails: circuit-open, exhausted retries and undecodable bodies all
    /// come back as error responses unless a fallback is registered.
    pub async fn execute(&self, request: OutboundRequest) -> BreakerResponse {
        let name = self.name();

        if self.state().await == CircuitState::Open {
            return match self.fallback() {
                Some(fallback) => {
                    debug!(breaker = %name, url = %request.url, "circuit open, serving fallback");
                    fallback(&request)
                }
                None => {
                    debug!(breaker = %name, url = %request.url, "circuit open, rejecting request");
                    BreakerResponse::circuit_open()
                }
            };
        }

        let intervals = &self.config().retry_intervals;
        let schedule = if intervals.is_empty() {
            SINGLE_ATTEMPT
        } else {
            intervals.as_slice()
        };

        let mut last_cause = None;
        for (index, backoff) in schedule.iter().enumerate() {
            let attempt = index + 1;
            debug!(breaker = %name, attempt, method = %request.method, url = %request.url, "sending request");

            match self.attempt(&request).await {
                Ok(response) => {
                    self.record_success().await;
                    return decode_response(response);
                }
                Err(cause) => {
                    warn!(
                        breaker = %name,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %cause,
                        "request attempt failed"
                    );
                    self.record_failure().await;
                    last_cause = Some(cause);
                    tokio::time::sleep(*backoff).await;
                }
            }
        }

        if let Some(fallback) = self.fallback() {
            debug!(breaker = %name, "retries exhausted, serving fallback");
            return fallback(&request);
        }

        let http_status = last_cause
            .as_ref()
            .and_then(FailureCause::upstream_status)
            .unwrap_or(INTERNAL_ERROR_CODE);
        BreakerResponse::error(
            http_status,
            INTERNAL_ERROR_CODE,
            EXECUTION_FAILED_MESSAGE,
            last_cause,
        )
    }

    /// One bounded call; 5xx answers count as failures.
    async fn attempt(&self, request: &OutboundRequest) -> Result<TransportResponse, FailureCause> {
        let timeout = self.config().timeout;
        let response = tokio::time::timeout(timeout, self.inner.transport.send(request))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;

        if response.status >= 500 {
            return Err(FailureCause::UpstreamStatus(response.status));
        }
        Ok(response)
    }
}

fn decode_response(response: TransportResponse) -> BreakerResponse {
    let raw = String::from_utf8_lossy(&response.body).into_owned();

    if response.body.iter().all(u8::is_ascii_whitespace) {
        return BreakerResponse::success(response.status, None, raw);
    }

    match serde_json::from_slice::<Value>(&response.body) {
        Ok(data) => BreakerResponse::success(response.status, Some(data), raw),
        Err(err) => {
            let mut failed = BreakerResponse::error(
                response.status,
                INTERNAL_ERROR_CODE,
                DECODE_FAILED_MESSAGE,
                Some(FailureCause::Decode(err)),
            );
            failed.raw = Some(raw);
            failed
        }
    }
}
