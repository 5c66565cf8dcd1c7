//! Context assembly — the per-call context object handed to the prompt
//! builder.
//!
//! Every context carries the tool's name, description, raw arguments and a
//! timestamp, plus the output of the tool's own handler under `tool_result`
//! (or `tool_error`). On top of that each category adds:
//!
//! | Category | Peer tool | Keyword | Fallback |
//! |----------|-----------|---------|----------|
//! | repo-search | `detect_patterns` | `search` | directory snapshot |
//! | code-analysis | `detect_patterns` | `analysis` | directory snapshot |
//! | architectural | `map_architecture` | `architecture` | directory snapshot |
//! | dependency-analysis | `build_dependency_graph` | `dependenc` | directory snapshot |
//!
//! Both handlers run through the same registry that serves top-level
//! requests. Recent context-window entries mentioning the keyword are
//! attached alongside. Assembly never fails: a failed handler is recorded
//! under `tool_error`, a failed peer under `peer_error` with the fallback
//! attached instead.

use chrono::{Duration, Utc};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use toolwright_core::tool::{ToolCategory, ToolMetadata, ToolRegistry};
use toolwright_tools::walk::directory_snapshot;
use tracing::{debug, warn};
use crate::context::window::ContextWindow;

/// Related entries older than this are ignored.
pub const RELATED_MAX_AGE_SECS: i64 = 60 * 60;

/// At most this many related entries are attached.
pub const RELATED_LIMIT: usize = 10;

/// What to attach when the peer step is skipped or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    DirectorySnapshot,
}

/// How one category augments its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerLink {
    pub peer_tool: &'static str,
    pub keyword: &'static str,
    pub fallback: Fallback,
}

/// The category → peer coupling.
pub fn peer_link(category: ToolCategory) -> PeerLink {
    let (peer_tool, keyword) = match category {
        ToolCategory::RepoSearch => ("detect_patterns", "search"),
        ToolCategory::CodeAnalysis => ("detect_patterns", "analysis"),
        ToolCategory::Architectural => ("map_architecture", "architecture"),
        ToolCategory::DependencyAnalysis => ("build_dependency_graph", "dependenc"),
    };
    PeerLink {
        peer_tool,
        keyword,
        fallback: Fallback::DirectorySnapshot,
    }
}

pub struct ContextAssembler {
    registry: Arc<ToolRegistry>,
    window: Arc<RwLock<ContextWindow>>,
    workspace_root: PathBuf,
}

impl ContextAssembler {
    pub fn new(
        registry: Arc<ToolRegistry>,
        window: Arc<RwLock<ContextWindow>>,
        workspace_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            window,
            workspace_root: workspace_root.into(),
        }
    }

    /// Build the context object for one call of `tool`.
    pub async fn assemble(&self, tool: &ToolMetadata, arguments: &Value) -> Map<String, Value> {
        let now = Utc::now();
        let link = peer_link(tool.category);

        let mut context = Map::new();
        context.insert("tool".into(), json!(tool.name));
        context.insert("description".into(), json!(tool.description));
        context.insert("arguments".into(), arguments.clone());
        context.insert("timestamp".into(), json!(now.to_rfc3339()));

        let related = self.window.read().await.related(
            link.keyword,
            now,
            Duration::seconds(RELATED_MAX_AGE_SECS),
            RELATED_LIMIT,
        );
        let related_count = related.len();
        context.insert("related_context".into(), json!(related));

        match self.registry.execute(&tool.name, arguments.clone()).await {
            Ok(result) => {
                context.insert("tool_result".into(), result);
            }
            Err(e) => {
                warn!(tool = %tool.name, error = %e, "Tool handler failed");
                context.insert(
                    "tool_error".into(),
                    json!({ "message": e.to_string(), "kind": e.kind() }),
                );
            }
        }

        let use_fallback = if link.peer_tool == tool.name {
            debug!(tool = %tool.name, "Tool is its own peer, skipping peer step");
            true
        } else {
            match self
                .registry
                .execute(link.peer_tool, Self::peer_arguments(arguments))
                .await
            {
                Ok(result) => {
                    context.insert(
                        "peer".into(),
                        json!({ "tool": link.peer_tool, "result": result }),
                    );
                    false
                }
                Err(e) => {
                    warn!(
                        tool = %tool.name,
                        peer = link.peer_tool,
                        error = %e,
                        "Peer tool failed, attaching fallback context"
                    );
                    context.insert(
                        "peer_error".into(),
                        json!({
                            "tool": link.peer_tool,
                            "message": e.to_string(),
                            "kind": e.kind(),
                        }),
                    );
                    true
                }
            }
        };

        if use_fallback {
            match link.fallback {
                Fallback::DirectorySnapshot => {
                    let root = self.workspace_root.clone();
                    match tokio::task::spawn_blocking(move || directory_snapshot(&root)).await {
                        Ok(snapshot) => {
                            context.insert("directory_snapshot".into(), json!(snapshot));
                        }
                        Err(e) => {
                            warn!(error = %e, "Directory snapshot failed");
                            context.insert("snapshot_error".into(), json!(e.to_string()));
                        }
                    }
                }
            }
        }

        debug!(
            tool = %tool.name,
            category = %tool.category,
            related = related_count,
            keys = context.len(),
            "Context assembled"
        );
        context
    }

    /// Peers only see the caller's `path`, when one was given.
    fn peer_arguments(arguments: &Value) -> Value {
        match arguments.get("path").and_then(Value::as_str) {
            Some(path) => json!({ "path": path }),
            None => json!({}),
        }
    }
}
