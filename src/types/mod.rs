pub mod breaker_response;
pub mod circuit_state;
pub mod outbound;

pub use breaker_response::{
    BreakerResponse, CIRCUIT_OPEN_CODE, CIRCUIT_OPEN_MESSAGE, DECODE_FAILED_MESSAGE,
    EXECUTION_FAILED_MESSAGE, ErrorDetail, INTERNAL_ERROR_CODE, ResponseType,
};
pub use circuit_state::CircuitState;
pub use outbound::{OutboundRequest, TransportResponse};
