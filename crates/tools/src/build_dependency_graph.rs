//! Dependency graph builder — reads package manifests and links local
//! packages to each other.
//!
//! Understands `Cargo.toml` (including `[workspace.dependencies]`) and
//! `package.json`. Dependencies that name another package found in the tree
//! become internal edges; everything else is listed as external.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use toolwright_core::error::ToolError;
use toolwright_core::tool::{Tool, ToolCategory};
use tracing::debug;
use crate::walk;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageNode {
    pub name: String,
    pub manifest: String,
    pub ecosystem: &'static str,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub dev: bool,
}

/// (package name, dependencies, dev-dependencies)
type ParsedManifest = (String, Vec<String>, Vec<String>);

type ManifestParser = fn(&str, &str) -> Option<ParsedManifest>;

fn table_keys(value: Option<&toml::Value>) -> Vec<String> {
    value
        .and_then(toml::Value::as_table)
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

fn object_keys(value: &serde_json::Value) -> Vec<String> {
    let mut keys: Vec<String> = value
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

/// Parse a `Cargo.toml`. A virtual workspace manifest yields a node named
/// after its directory carrying the shared workspace dependencies.
fn parse_cargo(text: &str, fallback_name: &str) -> Option<ParsedManifest> {
    let doc: toml::Value = toml::from_str(text).ok()?;

    let name = doc
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(toml::Value::as_str)
        .map(str::to_string);

    let mut deps = table_keys(doc.get("dependencies"));
    deps.extend(table_keys(doc.get("build-dependencies")));
    let dev = table_keys(doc.get("dev-dependencies"));

    match name {
        Some(name) => Some((name, deps, dev)),
        None => {
            let workspace = doc.get("workspace")?;
            Some((
                fallback_name.to_string(),
                table_keys(workspace.get("dependencies")),
                Vec::new(),
            ))
        }
    }
}

fn parse_package_json(text: &str, fallback_name: &str) -> Option<ParsedManifest> {
    let doc: serde_json::Value = serde_json::from_str(text).ok()?;
    let name = doc["name"].as_str().unwrap_or(fallback_name).to_string();
    let mut deps = object_keys(&doc["dependencies"]);
    deps.extend(object_keys(&doc["peerDependencies"]));
    Some((name, deps, object_keys(&doc["devDependencies"])))
}

fn directory_name(manifest: &Path) -> String {
    manifest
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".into())
}

/// Collect every manifest under `target` into package nodes.
pub fn collect_packages(root: &Path, target: &Path) -> Vec<PackageNode> {
    let mut packages = Vec::new();

    for file in walk::source_files(target) {
        let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let (ecosystem, parse): (&'static str, ManifestParser) = match file_name {
            "Cargo.toml" => ("cargo", parse_cargo),
            "package.json" => ("npm", parse_package_json),
            _ => continue,
        };
        let Some(text) = walk::read_text(&file) else {
            continue;
        };
        let manifest = walk::display_path(root, &file);
        match parse(&text, &directory_name(&file)) {
            Some((name, mut dependencies, mut dev_dependencies)) => {
                dependencies.sort();
                dependencies.dedup();
                dev_dependencies.sort();
                dev_dependencies.dedup();
                packages.push(PackageNode {
                    name,
                    manifest,
                    ecosystem,
                    dependencies,
                    dev_dependencies,
                });
            }
            None => debug!(manifest = %manifest, "Skipping unparseable manifest"),
        }
    }

    packages
}

/// Split dependencies into edges between local packages and the set of
/// external package names.
pub fn link_packages(packages: &[PackageNode]) -> (Vec<DependencyEdge>, Vec<String>) {
    let local: BTreeSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
    let mut edges = BTreeSet::new();
    let mut external = BTreeSet::new();

    for package in packages {
        let all = package
            .dependencies
            .iter()
            .map(|d| (d, false))
            .chain(package.dev_dependencies.iter().map(|d| (d, true)));
        for (dep, dev) in all {
            if local.contains(dep.as_str()) && dep != &package.name {
                edges.insert(DependencyEdge {
                    from: package.name.clone(),
                    to: dep.clone(),
                    dev,
                });
            } else if !local.contains(dep.as_str()) {
                external.insert(dep.clone());
            }
        }
    }

    (edges.into_iter().collect(), external.into_iter().collect())
}

pub struct BuildDependencyGraphTool {
    root: PathBuf,
}

impl BuildDependencyGraphTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for BuildDependencyGraphTool {
    fn name(&self) -> &str {
        "build_dependency_graph"
    }

    fn description(&self) -> &str {
        "Build the package dependency graph from Cargo.toml and package.json manifests."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::DependencyAnalysis
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to analyze, relative to the workspace root"
                },
                "include_dev": {
                    "type": "boolean",
                    "description": "Include dev-dependencies in the edge list (default true)"
                }
            }
        })
    }

    fn tags(&self) -> &[&str] {
        &["dependencies", "graph", "manifests"]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let include_dev = arguments["include_dev"].as_bool().unwrap_or(true);
        let root = self.root.clone();
        let target = walk::resolve_target(self.name(), &root, &arguments)?;

        walk::blocking(self.name(), move || {
            let packages = collect_packages(&root, &target);
            let (mut edges, external) = link_packages(&packages);
            if !include_dev {
                edges.retain(|e| !e.dev);
            }

            let mut fan_in: BTreeMap<&str, usize> = BTreeMap::new();
            for edge in &edges {
                *fan_in.entry(edge.to.as_str()).or_default() += 1;
            }

            Ok(json!({
                "packages": packages,
                "edges": edges,
                "external": external,
                "fan_in": fan_in,
            }))
        })
        .await
    }
}
