//! Pattern detector — flags common code-smell markers line by line.

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolCategory};
use crate::walk;

/// Built-in detectors: (name, expression).
const CATALOG: &[(&str, &str)] = &[
    ("todo", r"\b(TODO|FIXME|XXX|HACK)\b"),
    ("unwrap", r"\.unwrap\(\)"),
    ("expect", r"\.expect\("),
    ("panic", r"\b(panic|unimplemented|todo)!\("),
    ("unsafe", r"\bunsafe\s*\{"),
    ("debug_print", r"\b(dbg!\(|console\.log\(|print\()"),
    ("hardcoded_secret", r#"(?i)\b(password|secret|api_key|token)\s*[:=]\s*["'][^"']+["']"#),
];

const MAX_FINDINGS: usize = 200;

pub struct DetectPatternsTool {
    root: PathBuf,
}

impl DetectPatternsTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Names of the built-in detectors.
    pub fn pattern_names() -> Vec<&'static str> {
        CATALOG.iter().map(|(name, _)| *name).collect()
    }

    fn compile(selected: Option<&[serde_json::Value]>) -> Result<Vec<(&'static str, Regex)>, ToolError> {
        let wanted: Option<Vec<&str>> =
            selected.map(|names| names.iter().filter_map(|n| n.as_str()).collect());

        if let Some(names) = &wanted
            && let Some(unknown) = names.iter().find(|n| !CATALOG.iter().any(|(c, _)| c == *n))
        {
            return Err(ToolError::InvalidArguments(format!(
                "Unknown pattern '{unknown}'. Available: {}",
                Self::pattern_names().join(", ")
            )));
        }

        CATALOG
            .iter()
            .filter(|(name, _)| wanted.as_ref().is_none_or(|w| w.contains(name)))
            .map(|(name, expr)| {
                Regex::new(expr)
                    .map(|re| (*name, re))
                    .map_err(|e| ToolError::ExecutionFailed {
                        tool_name: "detect_patterns".into(),
                        reason: format!("pattern '{name}' failed to compile: {e}"),
                    })
            })
            .collect()
    }
}

#[async_trait]
impl Tool for DetectPatternsTool {
    fn name(&self) -> &str {
        "detect_patterns"
    }

    fn description(&self) -> &str {
        "Detect code patterns such as TODO markers, unchecked unwraps, panics, unsafe blocks and hard-coded secrets."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::CodeAnalysis
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to analyze, relative to the workspace root"
                },
                "patterns": {
                    "type": "array",
                    "description": "Subset of detectors to run (default: all)"
                }
            }
        })
    }

    fn tags(&self) -> &[&str] {
        &["analysis", "patterns", "lint"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let detectors = Self::compile(arguments["patterns"].as_array().map(Vec::as_slice))?;
        let root = self.root.clone();
        let target = walk::resolve_target(self.name(), &root, &arguments)?;

        walk::blocking(self.name(), move || {
            let mut findings = Vec::new();
            let mut summary: BTreeMap<&str, usize> =
                detectors.iter().map(|(name, _)| (*name, 0)).collect();
            let mut files_scanned = 0usize;

            for file in walk::source_files(&target) {
                let Some(text) = walk::read_text(&file) else {
                    continue;
                };
                files_scanned += 1;
                let shown = walk::display_path(&root, &file);

                for (idx, line) in text.lines().enumerate() {
                    for (name, re) in &detectors {
                        if !re.is_match(line) {
                            continue;
                        }
                        *summary.entry(*name).or_default() += 1;
                        if findings.len() < MAX_FINDINGS {
                            findings.push(json!({
                                "pattern": name,
                                "file": shown,
                                "line": idx + 1,
                                "text": line.trim(),
                            }));
                        }
                    }
                }
            }

            let total: usize = summary.values().sum();
            Ok(json!({
                "findings": findings,
                "summary": summary,
                "total": total,
                "files_scanned": files_scanned,
                "truncated": total > findings.len(),
            }))
        })
        .await
    }
}
