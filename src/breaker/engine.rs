use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::breaker::BreakerConfig;
use crate::store::StateStore;
use crate::transport::{ReqwestTransport, Transport, TransportError};
use crate::types::{BreakerResponse, CircuitState, OutboundRequest};

/// A closed-state failure older than this restarts the failure count at one.
pub const FAILURE_DECAY_WINDOW: Duration = Duration::from_secs(60);

pub type FallbackFn = Arc<dyn Fn(&OutboundRequest) -> BreakerResponse + Send + Sync>;

/// Handle to one breaker instance. Clones share counters, timer and fallback.
///
/// The state label lives in the [`StateStore`] under the breaker name and is
/// re-read on every decision, so instances in other processes pointed at the
/// same store and name observe each other's transitions. Counters are local.
#[derive(Clone)]
pub struct Breaker {
    pub(super) inner: Arc<BreakerInner>,
}

pub(super) struct BreakerInner {
    pub(super) name: String,
    pub(super) config: BreakerConfig,
    pub(super) transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    tracker: Mutex<Tracker>,
    fallback: RwLock<Option<FallbackFn>>,
}

#[derive(Default)]
struct Tracker {
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    probe: Option<ProbeTimer>,
    next_probe_id: u64,
}

struct ProbeTimer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Snapshot of the instance-local counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BreakerCounters {
    pub failures: u32,
    pub successes: u32,
}

impl Breaker {
    /// Creates a breaker that calls out through a reqwest client bounded by
    /// `config.timeout`, then synchronizes with the stored state.
    pub async fn new(
        config: BreakerConfig,
        name: impl Into<String>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, name, store, Arc::new(transport)).await)
    }

    pub async fn with_transport(
        config: BreakerConfig,
        name: impl Into<String>,
        store: Arc<dyn StateStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let breaker = Self {
            inner: Arc::new(BreakerInner {
                name: name.into(),
                config,
                transport,
                store,
                tracker: Mutex::new(Tracker::default()),
                fallback: RwLock::new(None),
            }),
        };
        breaker.inner.sync_initial_state().await;
        breaker
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.inner.config
    }

    /// Current state as seen in the store. Read failures report Closed.
    pub async fn state(&self) -> CircuitState {
        self.inner.read_state().await
    }

    pub async fn counters(&self) -> BreakerCounters {
        let tracker = self.inner.tracker.lock().await;
        BreakerCounters {
            failures: tracker.failures,
            successes: tracker.successes,
        }
    }

    /// Whether this instance holds a pending Open to Half-Open timer.
    pub async fn probe_armed(&self) -> bool {
        let tracker = self.inner.tracker.lock().await;
        tracker
            .probe
            .as_ref()
            .is_some_and(|probe| !probe.handle.is_finished())
    }

    pub fn set_fallback<F>(&self, fallback: F)
    where
        F: Fn(&OutboundRequest) -> BreakerResponse + Send + Sync + 'static,
    {
        *self
            .inner
            .fallback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(fallback));
    }

    pub fn clear_fallback(&self) {
        *self
            .inner
            .fallback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(super) fn fallback(&self) -> Option<FallbackFn> {
        self.inner
            .fallback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn record_success(&self) {
        let inner = &self.inner;
        let mut tracker = inner.tracker.lock().await;

        if inner.read_state().await != CircuitState::HalfOpen {
            return;
        }

        tracker.successes = tracker.successes.saturating_add(1);
        if tracker.successes >= inner.config.half_open_max_success {
            inner
                .transition(&mut tracker, CircuitState::HalfOpen, CircuitState::Closed)
                .await;
        }
    }

    pub async fn record_failure(&self) {
        let inner = &self.inner;
        let mut tracker = inner.tracker.lock().await;
        let now = Instant::now();

        match inner.read_state().await {
            CircuitState::Closed => {
                let decayed = tracker
                    .last_failure
                    .is_some_and(|last| now.duration_since(last) > FAILURE_DECAY_WINDOW);
                tracker.failures = if decayed {
                    1
                } else {
                    tracker.failures.saturating_add(1)
                };
                tracker.last_failure = Some(now);

                if tracker.failures >= inner.config.max_failures {
                    inner
                        .transition(&mut tracker, CircuitState::Closed, CircuitState::Open)
                        .await;
                }
            }
            CircuitState::HalfOpen => {
                tracker.failures = tracker.failures.saturating_add(1);
                if tracker.failures >= inner.config.half_open_max_failures {
                    inner
                        .transition(&mut tracker, CircuitState::HalfOpen, CircuitState::Open)
                        .await;
                }
            }
            CircuitState::Open => {}
        }
    }
}

impl fmt::Debug for Breaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Breaker")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl BreakerInner {
    async fn sync_initial_state(self: &Arc<Self>) {
        let mut tracker = self.tracker.lock().await;

        match self.store.get(&self.name).await {
            Ok(None) => self.persist(CircuitState::Closed).await,
            Ok(Some(label)) => match CircuitState::from_label(&label) {
                Some(CircuitState::Open) => {
                    self.arm_probe(&mut tracker);
                    info!(breaker = %self.name, "circuit breaker starting OPEN, re-probe armed");
                }
                Some(state) => debug!(breaker = %self.name, %state, "circuit breaker synchronized"),
                None => warn!(
                    breaker = %self.name,
                    label = %label,
                    "unrecognised stored state, treating as CLOSED"
                ),
            },
            Err(err) => warn!(
                breaker = %self.name,
                error = %err,
                "failed to read breaker state during startup, treating as CLOSED"
            ),
        }
    }

    async fn read_state(&self) -> CircuitState {
        match self.store.get(&self.name).await {
            Ok(Some(label)) => CircuitState::from_label(&label).unwrap_or_else(|| {
                warn!(
                    breaker = %self.name,
                    label = %label,
                    "unrecognised stored state, treating as CLOSED"
                );
                CircuitState::Closed
            }),
            Ok(None) => CircuitState::Closed,
            Err(err) => {
                warn!(
                    breaker = %self.name,
                    error = %err,
                    "failed to read breaker state, treating as CLOSED"
                );
                CircuitState::Closed
            }
        }
    }

    async fn persist(&self, state: CircuitState) {
        if let Err(err) = self
            .store
            .set(&self.name, state.as_label(), Duration::ZERO)
            .await
        {
            warn!(
                breaker = %self.name,
                %state,
                error = %err,
                "failed to persist breaker state"
            );
        }
    }

    /// Caller holds the tracker lock.
    async fn transition(
        self: &Arc<Self>,
        tracker: &mut Tracker,
        from: CircuitState,
        to: CircuitState,
    ) {
        tracker.failures = 0;
        tracker.successes = 0;
        tracker.last_failure = None;

        self.persist(to).await;

        match to {
            CircuitState::Open => self.arm_probe(tracker),
            CircuitState::Closed => disarm_probe(tracker),
            CircuitState::HalfOpen => {}
        }

        info!(breaker = %self.name, %from, %to, "circuit breaker transitioned");
    }

    fn arm_probe(self: &Arc<Self>, tracker: &mut Tracker) {
        disarm_probe(tracker);

        tracker.next_probe_id += 1;
        let id = tracker.next_probe_id;
        let wait = self.config.open_to_half_open_wait;
        let weak = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire_probe(id).await;
            }
        });

        tracker.probe = Some(ProbeTimer { id, handle });
    }

    async fn fire_probe(self: &Arc<Self>, id: u64) {
        let mut tracker = self.tracker.lock().await;

        if tracker.probe.as_ref().map(|probe| probe.id) != Some(id) {
            return;
        }
        tracker.probe = None;

        // Only a readable, known label other than OPEN makes the timer stale.
        match self.store.get(&self.name).await {
            Ok(Some(label)) => {
                if let Some(state) = CircuitState::from_label(&label)
                    && state != CircuitState::Open
                {
                    debug!(
                        breaker = %self.name,
                        %state,
                        "re-probe timer fired after circuit left OPEN, ignoring"
                    );
                    return;
                }
            }
            Ok(None) => {}
            Err(err) => warn!(
                breaker = %self.name,
                error = %err,
                "failed to read breaker state on re-probe, moving to HALF OPEN"
            ),
        }

        self.transition(&mut tracker, CircuitState::Open, CircuitState::HalfOpen)
            .await;
    }
}

impl Drop for BreakerInner {
    fn drop(&mut self) {
        disarm_probe(self.tracker.get_mut());
    }
}

fn disarm_probe(tracker: &mut Tracker) {
    if let Some(probe) = tracker.probe.take() {
        probe.handle.abort();
    }
}
