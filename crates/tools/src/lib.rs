//! Built-in tool implementations for Toolwright.
//!
//! Each tool gathers facts from the working tree locally; the orchestrator
//! hands those facts and the caller's arguments to the backend model. Tools
//! are also invoked directly as peers while assembling context for one
//! another.

pub mod build_dependency_graph;
pub mod detect_patterns;
pub mod map_architecture;
pub mod search_by_query;
pub mod walk;

use std::path::Path;
use std::sync::Arc;
use toolwright_core::tool::ToolRegistry;

pub use build_dependency_graph::BuildDependencyGraphTool;
pub use detect_patterns::DetectPatternsTool;
pub use map_architecture::MapArchitectureTool;
pub use search_by_query::SearchByQueryTool;
pub use walk::{DirectorySnapshot, directory_snapshot};

/// Create a registry with every built-in tool rooted at `root`.
pub fn default_registry(root: impl AsRef<Path>) -> ToolRegistry {
    let root = root.as_ref();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchByQueryTool::new(root)));
    registry.register(Arc::new(DetectPatternsTool::new(root)));
    registry.register(Arc::new(MapArchitectureTool::new(root)));
    registry.register(Arc::new(BuildDependencyGraphTool::new(root)));
    registry
}
