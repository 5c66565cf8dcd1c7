//! The single upstream connection record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolwright_core::backend::GenerationParams;

/// Health and usage bookkeeping for the one backend this process talks to.
///
/// Mutated by every completed or failed generation call and by the periodic
/// health probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConnection {
    pub id: String,

    /// Where the backend lives (e.g. `http://127.0.0.1:8080`)
    pub endpoint: String,

    /// Default generation parameters, including the model identifier
    pub params: GenerationParams,

    pub healthy: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,

    pub request_count: u64,

    /// Duration of the most recent successful call
    pub response_time: Duration,

    /// Sum over all successful calls, for averaging
    pub total_response_time: Duration,

    /// Probe failures since the last successful probe
    pub consecutive_probe_failures: u32,
}

impl BackendConnection {
    /// A fresh record. Starts unhealthy until the first probe succeeds.
    pub fn new(endpoint: impl Into<String>, params: GenerationParams) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            endpoint: endpoint.into(),
            params,
            healthy: false,
            last_used: None,
            request_count: 0,
            response_time: Duration::ZERO,
            total_response_time: Duration::ZERO,
            consecutive_probe_failures: 0,
        }
    }

    pub fn record_success(&mut self, elapsed: Duration) {
        self.last_used = Some(Utc::now());
        self.request_count += 1;
        self.response_time = elapsed;
        self.total_response_time += elapsed;
    }

    /// Trip the circuit after a failed generation call.
    pub fn record_failure(&mut self) {
        self.last_used = Some(Utc::now());
        self.healthy = false;
    }

    /// Apply the outcome of a health probe. Returns `true` if the health flag
    /// changed.
    pub fn record_probe(&mut self, healthy: bool) -> bool {
        let changed = self.healthy != healthy;
        self.healthy = healthy;
        if healthy {
            self.consecutive_probe_failures = 0;
        } else {
            self.consecutive_probe_failures += 1;
        }
        changed
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            return Duration::ZERO;
        }
        let avg_nanos = self.total_response_time.as_nanos() / self.request_count as u128;
        Duration::from_nanos(avg_nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> BackendConnection {
        BackendConnection::new(
            "http://127.0.0.1:8080",
            GenerationParams {
                model: "qwen".into(),
                max_tokens: 256,
                temperature: 0.2,
                top_p: 0.9,
                stop: vec![],
            },
        )
    }

    #[test]
    fn starts_unhealthy_and_unused() {
        let conn = connection();
        assert!(!conn.healthy);
        assert!(conn.last_used.is_none());
        assert_eq!(conn.average_response_time(), Duration::ZERO);
    }

    #[test]
    fn success_updates_usage() {
        let mut conn = connection();
        conn.record_success(Duration::from_millis(100));
        conn.record_success(Duration::from_millis(300));
        assert_eq!(conn.request_count, 2);
        assert_eq!(conn.response_time, Duration::from_millis(300));
        assert_eq!(conn.average_response_time(), Duration::from_millis(200));
        assert!(conn.last_used.is_some());
    }

    #[test]
    fn failure_trips_health() {
        let mut conn = connection();
        conn.record_probe(true);
        conn.record_failure();
        assert!(!conn.healthy);
        assert_eq!(conn.request_count, 0);
    }

    #[test]
    fn probe_tracks_consecutive_failures() {
        let mut conn = connection();
        assert!(conn.record_probe(true));
        assert!(conn.record_probe(false));
        assert!(!conn.record_probe(false));
        assert_eq!(conn.consecutive_probe_failures, 2);
        conn.record_probe(true);
        assert_eq!(conn.consecutive_probe_failures, 0);
    }
}
