//! Architecture mapper — summarizes how a repository is laid out.
//!
//! Groups source files into modules by directory, counts languages by file
//! extension, and picks out entry points and build manifests. The result is
//! raw material for the model to describe the architecture.

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Complexity, Tool, ToolCategory};
use crate::walk;

const ENTRY_POINTS: &[&str] = &[
    "main.rs", "lib.rs", "main.go", "main.py", "__main__.py", "app.py", "index.js", "index.ts",
    "main.ts", "server.js", "Main.java",
];

const MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "go.mod",
    "pyproject.toml",
    "requirements.txt",
    "pom.xml",
    "build.gradle",
    "Makefile",
    "Dockerfile",
];

/// File extension → language name. Anything else is not counted.
fn language_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let lang = match ext.as_str() {
        "rs" => "rust",
        "go" => "go",
        "py" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "kt" => "kotlin",
        "c" | "h" => "c",
        "cc" | "cpp" | "hpp" => "cpp",
        "rb" => "ruby",
        "sh" => "shell",
        "toml" | "yaml" | "yml" | "json" => "config",
        "md" => "docs",
        _ => return None,
    };
    Some(lang)
}

#[derive(Default)]
struct ModuleSummary {
    files: usize,
    languages: BTreeMap<&'static str, usize>,
}

pub struct MapArchitectureTool {
    root: PathBuf,
}

impl MapArchitectureTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for MapArchitectureTool {
    fn name(&self) -> &str {
        "map_architecture"
    }

    fn description(&self) -> &str {
        "Map the repository architecture: modules, languages, entry points and build manifests."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Architectural
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to map, relative to the workspace root"
                },
                "focus": {
                    "type": "string",
                    "description": "Optional aspect for the model to emphasize (e.g. layering, data flow)"
                }
            }
        })
    }

    fn tags(&self) -> &[&str] {
        &["architecture", "structure", "modules"]
    }

    fn complexity(&self) -> Complexity {
        Complexity::High
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let root = self.root.clone();
        let target = walk::resolve_target(self.name(), &root, &arguments)?;

        walk::blocking(self.name(), move || {
            let mut modules: BTreeMap<String, ModuleSummary> = BTreeMap::new();
            let mut languages: BTreeMap<&'static str, usize> = BTreeMap::new();
            let mut entry_points = Vec::new();
            let mut manifests = Vec::new();
            let mut total_files = 0usize;

            for file in walk::source_files(&target) {
                total_files += 1;
                let shown = walk::display_path(&root, &file);
                let name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();

                if ENTRY_POINTS.contains(&name.as_str()) {
                    entry_points.push(shown.clone());
                }
                if MANIFESTS.contains(&name.as_str()) {
                    manifests.push(shown.clone());
                }

                let directory = match shown.rsplit_once('/') {
                    Some((dir, _)) => dir.to_string(),
                    None => ".".to_string(),
                };
                let module = modules.entry(directory).or_default();
                module.files += 1;
                if let Some(lang) = language_of(&file) {
                    *module.languages.entry(lang).or_default() += 1;
                    *languages.entry(lang).or_default() += 1;
                }
            }

            let modules: Vec<serde_json::Value> = modules
                .into_iter()
                .map(|(directory, summary)| {
                    json!({
                        "directory": directory,
                        "files": summary.files,
                        "languages": summary.languages,
                    })
                })
                .collect();

            let primary_language = languages
                .iter()
                .filter(|(lang, _)| !matches!(**lang, "config" | "docs"))
                .max_by_key(|(_, count)| **count)
                .map(|(lang, _)| *lang);

            let mut shown_root = walk::display_path(&root, &target);
            if shown_root.is_empty() {
                shown_root.push('.');
            }

            Ok(json!({
                "root": shown_root,
                "total_files": total_files,
                "primary_language": primary_language,
                "languages": languages,
                "modules": modules,
                "entry_points": entry_points,
                "manifests": manifests,
            }))
        })
        .await
    }
}
