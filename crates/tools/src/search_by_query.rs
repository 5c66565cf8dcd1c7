//! Query search — case-insensitive text search over the working tree.

use async_trait::async_trait;
use regex::RegexBuilder;
use serde_json::json;
use std::path::PathBuf;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Complexity, Tool, ToolCategory};
use crate::walk;

const DEFAULT_MAX_RESULTS: usize = 50;

pub struct SearchByQueryTool {
    root: PathBuf,
}

impl SearchByQueryTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for SearchByQueryTool {
    fn name(&self) -> &str {
        "search_by_query"
    }

    fn description(&self) -> &str {
        "Search the repository for lines matching a text query and summarize where it occurs."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::RepoSearch
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to look for (case-insensitive)"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search, relative to the workspace root"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of matching lines to return (default 50)"
                }
            },
            "required": ["query"]
        })
    }

    fn tags(&self) -> &[&str] {
        &["search", "text", "grep"]
    }

    fn complexity(&self) -> Complexity {
        Complexity::Low
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("'query' must be a non-empty string".into()))?
            .to_string();
        let max_results = arguments["max_results"]
            .as_u64()
            .map(|n| n.clamp(1, 1000) as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        let root = self.root.clone();
        let target = walk::resolve_target(self.name(), &root, &arguments)?;

        walk::blocking(self.name(), move || {
            let pattern = RegexBuilder::new(&regex::escape(&query))
                .case_insensitive(true)
                .build()
                .map_err(|e| ToolError::InvalidArguments(format!("Bad query: {e}")))?;

            let mut matches = Vec::new();
            let mut files_scanned = 0usize;
            let mut truncated = false;

            'files: for file in walk::source_files(&target) {
                let Some(text) = walk::read_text(&file) else {
                    continue;
                };
                files_scanned += 1;
                for (idx, line) in text.lines().enumerate() {
                    if !pattern.is_match(line) {
                        continue;
                    }
                    if matches.len() >= max_results {
                        truncated = true;
                        break 'files;
                    }
                    matches.push(json!({
                        "file": walk::display_path(&root, &file),
                        "line": idx + 1,
                        "text": line.trim(),
                    }));
                }
            }

            Ok(json!({
                "query": query,
                "matches": matches,
                "files_scanned": files_scanned,
                "truncated": truncated,
            }))
        })
        .await
    }
}
