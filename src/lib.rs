pub mod breaker;
pub mod error;
pub mod store;
pub mod transport;
pub mod types;

pub use breaker::{Breaker, BreakerConfig, BreakerCounters};
pub use error::FailureCause;
pub use store::{MemoryStateStore, RedisStateStore, SqliteStateStore, StateStore, StoreError};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{BreakerResponse, CircuitState, ErrorDetail, OutboundRequest, ResponseType};
