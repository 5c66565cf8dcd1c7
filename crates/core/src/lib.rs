//! # Toolwright Core
//!
//! Domain types, traits, and error definitions for the Toolwright tool
//! orchestrator. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two seams of the system are traits defined here:
//! - [`Backend`] — the single upstream text-generation service
//! - [`Tool`] — a callable capability registered in the [`ToolRegistry`]
//!
//! Implementations live in their respective crates, so tests can swap in
//! fakes without touching global state.

pub mod backend;
pub mod error;
pub mod message;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use backend::{Backend, GenerationOptions, GenerationParams};
pub use error::{BackendError, Error, Result, ToolError};
pub use message::{ChatMessage, Role};
pub use tool::{
    Complexity, Tool, ToolCategory, ToolExecutionRequest, ToolMetadata, ToolRegistry, ToolResult,
    ToolResultMetadata,
};
