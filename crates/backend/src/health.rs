//! Connection health monitor — periodic liveness probing.
//!
//! The probe loop runs independently of request traffic. Probe errors and
//! timeouts only ever flip the health flag; nothing escapes the loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use toolwright_core::backend::Backend;
use tracing::{debug, info, warn};
use crate::connection::BackendConnection;

#[derive(Clone)]
pub struct HealthMonitor {
    backend: Arc<dyn Backend>,
    connection: Arc<RwLock<BackendConnection>>,
    timeout: Duration,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(
        backend: Arc<dyn Backend>,
        connection: Arc<RwLock<BackendConnection>>,
        timeout: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            backend,
            connection,
            timeout,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Probe once and record the outcome. Returns the new health state.
    pub async fn probe(&self) -> bool {
        let healthy = match tokio::time::timeout(self.timeout, self.backend.health_check()).await {
            Ok(Ok(ok)) => ok,
            Ok(Err(e)) => {
                debug!(backend = %self.backend.name(), error = %e, "Health probe failed");
                false
            }
            Err(_) => {
                debug!(
                    backend = %self.backend.name(),
                    timeout_secs = self.timeout.as_secs(),
                    "Health probe timed out"
                );
                false
            }
        };

        let mut connection = self.connection.write().await;
        if connection.record_probe(healthy) {
            if healthy {
                info!(endpoint = %connection.endpoint, "Backend is healthy");
            } else {
                warn!(
                    endpoint = %connection.endpoint,
                    failures = connection.consecutive_probe_failures,
                    "Backend is unhealthy"
                );
            }
        }
        healthy
    }

    /// Start the background probe loop. The first probe fires one interval
    /// from now.
    pub fn spawn(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(Instant::now() + monitor.interval, monitor.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe().await;
            }
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
