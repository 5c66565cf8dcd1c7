//! Tool trait — the abstraction over callable capabilities.
//!
//! A tool describes itself (name, description, category, input schema, tags,
//! complexity) and carries a local handler. The orchestrator uses the
//! description to drive the backend, and calls handlers of *peer* tools
//! directly when enriching context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use crate::error::ToolError;

/// Which family of work a tool belongs to. Drives context augmentation and
/// the output budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    RepoSearch,
    CodeAnalysis,
    Architectural,
    DependencyAnalysis,
}

impl ToolCategory {
    pub const ALL: [ToolCategory; 4] = [
        Self::RepoSearch,
        Self::CodeAnalysis,
        Self::Architectural,
        Self::DependencyAnalysis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RepoSearch => "repo-search",
            Self::CodeAnalysis => "code-analysis",
            Self::Architectural => "architectural",
            Self::DependencyAnalysis => "dependency-analysis",
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rough cost tag a tool advertises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Everything the orchestrator and callers need to know about a tool,
/// without the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub category: ToolCategory,
    pub input_schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub complexity: Complexity,
}

/// A request to execute a tool, as handed over by a transport adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRequest {
    pub tool_name: String,

    #[serde(default)]
    pub arguments: serde_json::Value,

    /// Caller-supplied context merged into the assembled context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Execution metadata attached to every [`ToolResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResultMetadata {
    #[serde(rename = "execution_time_ms", with = "duration_millis")]
    pub execution_time: Duration,
    pub tokens_used: u64,
    pub cache_hit: bool,
}

/// The envelope every tool execution returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// Structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub metadata: ToolResultMetadata,
}

impl ToolResult {
    pub fn success(data: serde_json::Value, execution_time: Duration, tokens_used: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: ToolResultMetadata {
                execution_time,
                tokens_used,
                cache_hit: false,
            },
        }
    }

    /// A failed execution. Failures never report token usage.
    pub fn failure(error: impl Into<String>, execution_time: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: ToolResultMetadata {
                execution_time,
                tokens_used: 0,
                cache_hit: false,
            },
        }
    }

    /// Copy of a cached result re-stamped as a cache hit.
    pub fn as_cache_hit(&self, lookup_time: Duration) -> Self {
        let mut hit = self.clone();
        hit.metadata.cache_hit = true;
        hit.metadata.execution_time = lookup_time;
        hit
    }
}

/// The core Tool trait.
///
/// Each tool (search, pattern detection, architecture mapping, dependency
/// graphs) implements this trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_by_query").
    fn name(&self) -> &str;

    /// A description of what this tool does (embedded in prompts).
    fn description(&self) -> &str;

    /// The category that drives context augmentation.
    fn category(&self) -> ToolCategory;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    fn tags(&self) -> &[&str] {
        &[]
    }

    fn complexity(&self) -> Complexity {
        Complexity::Medium
    }

    /// Run the tool's local handler.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Check `arguments` against [`Tool::parameters_schema`].
    fn validate(&self, arguments: &serde_json::Value) -> std::result::Result<(), ToolError> {
        validate_arguments(&self.parameters_schema(), arguments)
    }

    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: self.name().to_string(),
            description: self.description().to_string(),
            category: self.category(),
            input_schema: self.parameters_schema(),
            tags: self.tags().iter().map(|t| t.to_string()).collect(),
            complexity: self.complexity(),
        }
    }
}

/// Validate an argument object against the subset of JSON Schema the tools
/// declare: object shape, `required`, primitive `type`, and `enum`.
pub fn validate_arguments(
    schema: &serde_json::Value,
    arguments: &serde_json::Value,
) -> std::result::Result<(), ToolError> {
    let Some(args) = arguments.as_object() else {
        return Err(ToolError::InvalidArguments(format!(
            "arguments must be an object, got {}",
            json_type_name(arguments)
        )));
    };

    if let Some(required) = schema["required"].as_array() {
        for field in required.iter().filter_map(|f| f.as_str()) {
            match args.get(field) {
                None | Some(serde_json::Value::Null) => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required argument '{field}'"
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let Some(properties) = schema["properties"].as_object() else {
        return Ok(());
    };

    for (key, value) in args {
        let Some(prop) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = prop["type"].as_str()
            && !matches_type(expected, value)
        {
            return Err(ToolError::InvalidArguments(format!(
                "argument '{key}' must be of type {expected}, got {}",
                json_type_name(value)
            )));
        }
        if let Some(allowed) = prop["enum"].as_array()
            && !allowed.contains(value)
        {
            return Err(ToolError::InvalidArguments(format!(
                "argument '{key}' must be one of {}",
                serde_json::Value::Array(allowed.clone())
            )));
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &serde_json::Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A registry of available tools.
///
/// The orchestrator uses this to:
/// 1. Look up the tool a request names
/// 2. Run peer tools' handlers while assembling context
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Metadata for every registered tool, sorted by name.
    pub fn metadata(&self) -> Vec<ToolMetadata> {
        let mut all: Vec<ToolMetadata> = self.tools.values().map(|t| t.metadata()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Validate the arguments and run a tool's handler.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.validate(&arguments)?;
        tool.execute(arguments).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
