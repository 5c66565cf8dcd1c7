//! Per-call context: the bounded interaction log, the category-driven
//! assembler that reads it, and token estimation.

pub mod assembler;
pub mod token;
pub mod window;

pub use assembler::{ContextAssembler, Fallback, PeerLink, peer_link};
pub use window::{ContextWindow, ContextWindowEntry};
