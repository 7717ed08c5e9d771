//! The breaker: a Closed/Open/Half-Open state machine whose state label is
//! shared through a [`StateStore`](crate::store::StateStore), plus the
//! retrying executor that feeds it.

mod config;
mod engine;
mod executor;

pub use config::BreakerConfig;
pub use engine::{Breaker, BreakerCounters, FAILURE_DECAY_WINDOW, FallbackFn};
