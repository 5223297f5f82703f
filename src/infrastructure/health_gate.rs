//! Circuit breaker guarding `SearchBackend` usage from the query path.
//!
//! Holds `{status, last_check_at, consecutive_failures}` behind a `Mutex` so
//! the only process-global instance lives in [`crate::AppState`], created
//! once at startup — no hidden statics.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::infrastructure::search_backend::SearchBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unknown,
    Up,
    Down,
}

struct Inner {
    status: Status,
    last_check_at: Option<Instant>,
    consecutive_failures: u32,
    probe_in_flight: bool,
}

pub struct HealthGate {
    inner: Mutex<Inner>,
    probe_timeout: Duration,
}

fn backoff_interval(consecutive_failures: u32) -> Duration {
    let secs = 30 + 10 * consecutive_failures as u64;
    Duration::from_secs(secs.min(300))
}

impl HealthGate {
    pub fn new(probe_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: Status::Unknown,
                last_check_at: None,
                consecutive_failures: 0,
                probe_in_flight: false,
            }),
            probe_timeout,
        }
    }

    /// `true` without any I/O when a cached verdict is fresh; otherwise
    /// probes the backend (single-flight: a probe already in progress is
    /// skipped and the stale cached verdict is returned).
    pub async fn is_available(&self, backend: &SearchBackend) -> bool {
        let should_probe = {
            let mut guard = self.inner.lock().expect("health gate mutex poisoned");
            let due = match guard.last_check_at {
                None => true,
                Some(last) => last.elapsed() >= backoff_interval(guard.consecutive_failures),
            };
            if due && !guard.probe_in_flight {
                guard.probe_in_flight = true;
                true
            } else {
                false
            }
        };

        if should_probe {
            self.probe(backend).await;
        }

        let guard = self.inner.lock().expect("health gate mutex poisoned");
        guard.status == Status::Up
    }

    async fn probe(&self, backend: &SearchBackend) {
        let outcome = backend.cluster_health(None, self.probe_timeout).await;
        let mut guard = self.inner.lock().expect("health gate mutex poisoned");
        guard.probe_in_flight = false;
        guard.last_check_at = Some(Instant::now());
        match outcome {
            Ok(health) if health.status.is_usable() && health.elapsed_ms < self.probe_timeout.as_millis() as u64 => {
                guard.consecutive_failures = 0;
                guard.status = Status::Up;
                info!(elapsed_ms = health.elapsed_ms, "search backend health probe succeeded");
            }
            Ok(health) => {
                guard.consecutive_failures += 1;
                guard.status = Status::Down;
                warn!(
                    status = ?health.status,
                    elapsed_ms = health.elapsed_ms,
                    consecutive_failures = guard.consecutive_failures,
                    "search backend degraded"
                );
            }
            Err(err) => {
                guard.consecutive_failures += 1;
                guard.status = Status::Down;
                warn!(
                    error = %err,
                    consecutive_failures = guard.consecutive_failures,
                    "search backend health probe failed"
                );
            }
        }
    }

    #[cfg(test)]
    fn snapshot(&self) -> (Status, u32) {
        let guard = self.inner.lock().expect("health gate mutex poisoned");
        (guard.status, guard.consecutive_failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_failures_and_caps_at_300s() {
        assert_eq!(backoff_interval(0), Duration::from_secs(30));
        assert_eq!(backoff_interval(5), Duration::from_secs(80));
        assert_eq!(backoff_interval(1000), Duration::from_secs(300));
    }

    #[test]
    fn starts_unknown_with_zero_failures() {
        let gate = HealthGate::new(Duration::from_secs(5));
        let (status, failures) = gate.snapshot();
        assert_eq!(status, Status::Unknown);
        assert_eq!(failures, 0);
    }
}
