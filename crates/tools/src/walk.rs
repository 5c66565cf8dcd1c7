//! Shared working-tree traversal for the built-in tools and the context
//! assembler's directory snapshot.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use toolwright_core::error::ToolError;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into.
pub const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "out"];

/// How deep the snapshot goes below the root.
pub const SNAPSHOT_DEPTH: usize = 4;

/// Upper bound on entries in one snapshot.
pub const SNAPSHOT_LIMIT: usize = 500;

/// Depth used by tools that read file contents.
pub const SCAN_DEPTH: usize = 16;

/// Files larger than this are not read for content scans.
pub const MAX_SCAN_BYTES: u64 = 512 * 1024;

/// A bounded listing of the working tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectorySnapshot {
    pub root: String,
    /// Relative paths; directories carry a trailing `/`
    pub entries: Vec<String>,
    pub truncated: bool,
}

/// Hidden entries and build-output directories are skipped. The walk root is
/// always kept, even when it is `.`.
fn is_visible(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return false;
    }
    !(entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// List the tree under `root` up to [`SNAPSHOT_DEPTH`], capped at
/// [`SNAPSHOT_LIMIT`] entries.
pub fn directory_snapshot(root: &Path) -> DirectorySnapshot {
    let mut entries = Vec::new();
    let mut truncated = false;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(SNAPSHOT_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(is_visible)
        .filter_map(|e| e.ok());

    for entry in walker {
        if entries.len() >= SNAPSHOT_LIMIT {
            truncated = true;
            break;
        }
        let mut path = relative(root, entry.path());
        if entry.file_type().is_dir() {
            path.push('/');
        }
        entries.push(path);
    }

    DirectorySnapshot {
        root: root.display().to_string(),
        entries,
        truncated,
    }
}

/// Every visible regular file under `root`, in a stable order.
pub fn source_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .max_depth(SCAN_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(is_visible)
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(DirEntry::into_path)
        .collect()
}

/// Read a file as UTF-8 text, skipping anything too large or binary.
pub fn read_text(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if meta.len() > MAX_SCAN_BYTES {
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Path of `file` relative to `root`, `/`-separated.
pub fn display_path(root: &Path, file: &Path) -> String {
    relative(root, file)
}

/// Resolve the optional `path` argument against the workspace root.
///
/// Absolute paths and `..` components are rejected so tools stay inside
/// the workspace.
pub fn resolve_target(
    tool_name: &str,
    root: &Path,
    arguments: &serde_json::Value,
) -> Result<PathBuf, ToolError> {
    let Some(raw) = arguments.get("path").and_then(|p| p.as_str()) else {
        return Ok(root.to_path_buf());
    };

    let requested = Path::new(raw);
    let escapes = requested
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ToolError::InvalidArguments(format!(
            "path '{raw}' must be relative to the workspace"
        )));
    }

    let target = root.join(requested);
    if !target.exists() {
        return Err(ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: format!("path '{raw}' does not exist"),
        });
    }
    Ok(target)
}

/// Run blocking filesystem work off the async runtime.
pub async fn blocking<T, F>(tool_name: &str, work: F) -> Result<T, ToolError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ToolError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: format!("worker failed: {e}"),
        })?
}
