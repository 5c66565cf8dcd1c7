//! Backend connection supervisor — owns the single upstream connection and
//! gates every call to it.
//!
//! Every generation call goes through the [`AdmissionQueue`]. The health flag
//! is re-checked *inside* the queued unit of work, because the probe loop can
//! flip it while a task is waiting for a slot. Any failed call trips the flag
//! immediately; only a successful probe clears it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use toolwright_config::{AppConfig, SupervisorConfig};
use toolwright_core::backend::{Backend, GenerationOptions};
use toolwright_core::error::BackendError;
use toolwright_core::message::ChatMessage;
use tracing::{debug, info, warn};
use crate::connection::BackendConnection;
use crate::health::HealthMonitor;
use crate::http::HttpBackend;
use crate::queue::AdmissionQueue;

/// Queue limits and timeouts.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub max_concurrent: usize,
    pub max_starts_per_window: usize,
    pub window: Duration,
    pub generation_timeout: Duration,
    pub probe_timeout: Duration,
    pub probe_interval: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&SupervisorConfig::default())
    }
}

impl From<&SupervisorConfig> for SupervisorSettings {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            max_starts_per_window: config.max_starts_per_window,
            window: config.window(),
            generation_timeout: config.generation_timeout(),
            probe_timeout: config.probe_timeout(),
            probe_interval: config.probe_interval(),
        }
    }
}

/// Observability snapshot. Never used for control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorMetrics {
    pub healthy_instances: usize,
    pub total_instances: usize,
    pub request_count: u64,
    pub average_response_time_ms: u64,
    /// Tasks waiting in the admission queue
    pub queue_depth: usize,
    /// Tasks currently executing
    pub pending: usize,
}

enum GenerationRequest<'a> {
    Completion(&'a str),
    Chat(&'a [ChatMessage]),
}

pub struct BackendSupervisor {
    backend: Arc<dyn Backend>,
    connection: Arc<RwLock<BackendConnection>>,
    queue: AdmissionQueue,
    monitor: HealthMonitor,
    settings: SupervisorSettings,
    probe_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BackendSupervisor {
    /// Build a supervisor over any backend. Nothing runs until
    /// [`BackendSupervisor::initialize`].
    pub fn new(
        backend: Arc<dyn Backend>,
        connection: BackendConnection,
        settings: SupervisorSettings,
    ) -> Self {
        let connection = Arc::new(RwLock::new(connection));
        let monitor = HealthMonitor::new(
            backend.clone(),
            connection.clone(),
            settings.probe_timeout,
            settings.probe_interval,
        );
        let queue = AdmissionQueue::new(
            settings.max_concurrent,
            settings.max_starts_per_window,
            settings.window,
        );

        Self {
            backend,
            connection,
            queue,
            monitor,
            settings,
            probe_task: std::sync::Mutex::new(None),
        }
    }

    /// Build a supervisor over the HTTP backend described by `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        let settings = SupervisorSettings::from(&config.supervisor);
        let endpoint = config.backend.base_url();
        let backend = HttpBackend::new(&endpoint).with_probe_timeout(settings.probe_timeout);
        let connection = BackendConnection::new(endpoint, config.generation_params());
        Self::new(Arc::new(backend), connection, settings)
    }

    /// Probe once, then start the background probe loop. Returns whether the
    /// backend answered the first probe. Calling this twice does not start a
    /// second loop.
    pub async fn initialize(&self) -> bool {
        let healthy = self.monitor.probe().await;

        let mut task = self
            .probe_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if task.is_none() {
            *task = Some(self.monitor.spawn());
        }
        drop(task);

        let connection = self.connection.read().await;
        info!(
            connection_id = %connection.id,
            endpoint = %connection.endpoint,
            model = %connection.params.model,
            healthy,
            probe_interval_secs = self.monitor.interval().as_secs(),
            "Backend supervisor initialized"
        );
        healthy
    }

    /// Submit a prompt to the completion endpoint.
    pub async fn submit_completion(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String, BackendError> {
        self.queue
            .submit(self.generate(GenerationRequest::Completion(prompt), &options))
            .await?
    }

    /// Submit an ordered message list to the chat-completion endpoint.
    pub async fn submit_chat_completion(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String, BackendError> {
        self.queue
            .submit(self.generate(GenerationRequest::Chat(messages), &options))
            .await?
    }

    /// The unit of work that runs once the queue admits it.
    async fn generate(
        &self,
        request: GenerationRequest<'_>,
        options: &GenerationOptions,
    ) -> Result<String, BackendError> {
        let params = {
            let connection = self.connection.read().await;
            if !connection.healthy {
                return Err(BackendError::Unavailable(format!(
                    "{} failed its last health check",
                    connection.endpoint
                )));
            }
            options.resolve(&connection.params)
        };

        let started = Instant::now();
        let call = async {
            match request {
                GenerationRequest::Completion(prompt) => self.backend.complete(prompt, &params).await,
                GenerationRequest::Chat(messages) => self.backend.chat(messages, &params).await,
            }
        };
        let outcome = match tokio::time::timeout(self.settings.generation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.settings.generation_timeout.as_secs())),
        };

        let mut connection = self.connection.write().await;
        match outcome {
            Ok(text) => {
                let elapsed = started.elapsed();
                connection.record_success(elapsed);
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    chars = text.len(),
                    requests = connection.request_count,
                    "Backend call completed"
                );
                Ok(text)
            }
            Err(e) => {
                connection.record_failure();
                warn!(
                    endpoint = %connection.endpoint,
                    error = %e,
                    "Backend call failed, marking connection unhealthy"
                );
                Err(e)
            }
        }
    }

    /// Run one health probe right now.
    pub async fn probe(&self) -> bool {
        self.monitor.probe().await
    }

    pub async fn is_available(&self) -> bool {
        self.connection.read().await.healthy
    }

    /// A snapshot of the connection record.
    pub async fn connection(&self) -> BackendConnection {
        self.connection.read().await.clone()
    }

    pub async fn get_metrics(&self) -> SupervisorMetrics {
        let connection = self.connection.read().await;
        SupervisorMetrics {
            healthy_instances: usize::from(connection.healthy),
            total_instances: 1,
            request_count: connection.request_count,
            average_response_time_ms: connection.average_response_time().as_millis() as u64,
            queue_depth: self.queue.waiting(),
            pending: self.queue.active(),
        }
    }

    /// Stop probing and wait for every queued and in-flight call to finish.
    pub async fn shutdown(&self) {
        let task = self
            .probe_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }

        self.queue.drain().await;
        info!("Backend supervisor shut down");
    }
}

impl Drop for BackendSupervisor {
    fn drop(&mut self) {
        if let Ok(task) = self.probe_task.get_mut()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }
}
