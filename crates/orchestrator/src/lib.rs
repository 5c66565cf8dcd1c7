//! Request orchestration for Toolwright.
//!
//! Turns a tool request into a backend generation and back into a
//! structured result:
//! - **Context** — the interaction window and per-category context assembly
//! - **Prompt** — deterministic instruction template with an output budget
//! - **Resolver** — sanitizing and extracting JSON from generated text
//! - **Cache** — LRU memoization of successful results
//! - **Orchestrator** — `execute_tool`, composing all of the above

pub mod cache;
pub mod canonical;
pub mod context;
pub mod orchestrator;
pub mod prompt;
pub mod resolver;

pub use cache::{CacheStats, ResultCache, canonical_key};
pub use context::{ContextAssembler, ContextWindow, ContextWindowEntry};
pub use orchestrator::{EXECUTED_ROLE, OrchestratorMetrics, RequestOrchestrator};
pub use prompt::{Prompt, PromptBuilder, output_budget};
pub use resolver::{OutputResolver, Resolved, extract_structured, sanitize, truncate_words};
