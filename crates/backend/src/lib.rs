//! Backend connection management for Toolwright.
//!
//! Everything that touches the single upstream text-generation service lives
//! here: the HTTP client, the connection record, the admission queue that
//! bounds concurrency and start rate, the periodic health monitor, and the
//! supervisor that composes them.

pub mod connection;
pub mod health;
pub mod http;
pub mod queue;
pub mod supervisor;

pub use connection::BackendConnection;
pub use health::HealthMonitor;
pub use http::HttpBackend;
pub use queue::AdmissionQueue;
pub use supervisor::{BackendSupervisor, SupervisorMetrics, SupervisorSettings};
