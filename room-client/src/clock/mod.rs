//! Clock synchronization against a remote time authority.
//!
//! [`ClockSynchronizer`] drives the pure estimator in
//! [`room_core::ClockState`]: it captures local timestamps around each
//! [`TimeSource`] round trip, records the outcome, and runs the probe loop
//! (back-to-back while converging, then every steady interval).
//!
//! ```text
//! probe(): send_ts = now + avg ──▶ TimeSource ──▶ server date
//!                                                 │
//!            ClockState::record_sample(send_ts, date, now) ◀──┘
//! ```

mod http;
mod mock;

pub use http::{parse_http_date, HttpTimeSource, DEFAULT_PROBE_TIMEOUT};
pub use mock::MockTimeSource;

use crate::config::ClockConfig;
use crate::lock;
use async_trait::async_trait;
use room_core::{ClockState, ProbeOutcome, ProbeTiming, SyncPhase};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Time probe errors.
#[derive(Debug, Error)]
pub enum ClockError {
    /// HTTP request failed.
    #[error("time request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response carried no `Date` header.
    #[error("response has no Date header")]
    MissingDate,

    /// `Date` header could not be parsed.
    #[error("invalid Date header: {0}")]
    InvalidDate(String),

    /// Time authority unreachable for another reason.
    #[error("time source unavailable: {0}")]
    Unavailable(String),
}

/// A remote clock that can be queried with one round trip.
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// Remote time in Unix milliseconds.
    ///
    /// May be truncated to the source's precision (whole seconds for HTTP).
    async fn server_date_ms(&self) -> Result<i64, ClockError>;
}

/// Local wall clock in Unix milliseconds.
pub fn local_now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Drives clock-offset probes and answers server-time queries.
///
/// Cheap to clone; clones share the same estimator.
pub struct ClockSynchronizer<S> {
    source: Arc<S>,
    state: Arc<Mutex<ClockState>>,
}

impl<S> Clone for ClockSynchronizer<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: TimeSource + 'static> ClockSynchronizer<S> {
    /// Create a synchronizer with the default policy.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_state(source, ClockState::new())
    }

    /// Create a synchronizer with the policy from `config`.
    pub fn from_config(source: Arc<S>, config: &ClockConfig) -> Self {
        Self::with_state(source, config.clock_state())
    }

    fn with_state(source: Arc<S>, state: ClockState) -> Self {
        Self {
            source,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Run one probe and record its outcome.
    ///
    /// Failures are logged and leave the current offset in place.
    pub async fn probe(&self) -> ProbeOutcome {
        let local_send_ms = lock(&self.state).send_timestamp(local_now_ms());

        match self.source.server_date_ms().await {
            Ok(server_date_ms) => {
                let timing = ProbeTiming {
                    local_send_ms,
                    server_date_ms,
                    local_receive_ms: local_now_ms(),
                };
                let mut state = lock(&self.state);
                let offset_ms = state.record_sample(timing);
                tracing::debug!(
                    offset_ms,
                    avg_offset_ms = state.avg_offset_ms(),
                    probes = state.probes(),
                    "Clock probe sampled"
                );
                ProbeOutcome::Sampled { offset_ms }
            }
            Err(e) => {
                let mut state = lock(&self.state);
                state.record_failure();
                tracing::warn!(
                    probes = state.probes(),
                    "Clock probe failed, keeping offset {}ms: {}",
                    state.avg_offset_ms(),
                    e
                );
                ProbeOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Spawn the background probe loop.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn(&self) -> JoinHandle<()> {
        let clock = self.clone();
        tokio::spawn(async move {
            let mut phase = clock.phase();
            tracing::debug!("Clock sync loop started ({:?})", phase);

            loop {
                let delay = clock.next_delay();
                if delay.is_zero() {
                    tokio::task::yield_now().await;
                } else {
                    tokio::time::sleep(delay).await;
                }

                clock.probe().await;

                let now = clock.phase();
                if now != phase {
                    tracing::info!(
                        "Clock sync converged (avg offset {}ms)",
                        clock.avg_offset_ms()
                    );
                    phase = now;
                }
            }
        })
    }

    /// Estimated remote time (Unix ms): local clock plus the average offset.
    pub fn server_time(&self) -> i64 {
        lock(&self.state).server_time_ms(local_now_ms())
    }

    /// Current average offset (ms).
    pub fn avg_offset_ms(&self) -> f64 {
        lock(&self.state).avg_offset_ms()
    }

    /// Current scheduling phase.
    pub fn phase(&self) -> SyncPhase {
        lock(&self.state).phase()
    }

    /// Delay before the next scheduled probe.
    pub fn next_delay(&self) -> Duration {
        lock(&self.state).next_delay()
    }

    /// Copy of the estimator state.
    pub fn snapshot(&self) -> ClockState {
        lock(&self.state).clone()
    }
}
