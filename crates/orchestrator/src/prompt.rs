//! Prompt construction.
//!
//! Renders a fixed instruction template from tool metadata, the assembled
//! context and the arguments. The same inputs always render the same text.

use serde_json::{Map, Value};
use toolwright_core::tool::{Complexity, ToolCategory, ToolMetadata};
use crate::canonical;

/// Output-size budget in tokens for a category at medium complexity.
pub fn base_budget(category: ToolCategory) -> u32 {
    match category {
        ToolCategory::RepoSearch => 800,
        ToolCategory::CodeAnalysis => 1200,
        ToolCategory::DependencyAnalysis => 1500,
        ToolCategory::Architectural => 3000,
    }
}

/// Budget after complexity scaling: `high` gets half as much again.
pub fn output_budget(category: ToolCategory, complexity: Complexity) -> u32 {
    let base = base_budget(category);
    match complexity {
        Complexity::High => base + base / 2,
        Complexity::Low | Complexity::Medium => base,
    }
}

/// A rendered prompt and the generation budget that goes with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub max_tokens: u32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, tool: &ToolMetadata, arguments: &Value, context: &Map<String, Value>) -> Prompt {
        let max_tokens = output_budget(tool.category, tool.complexity);
        let tags = if tool.tags.is_empty() {
            "none".to_string()
        } else {
            tool.tags.join(", ")
        };
        let context = canonical::to_canonical_pretty(&Value::Object(context.clone()));

        let text = format!(
            "You are the `{name}` tool, answering on behalf of a code-analysis agent.\n\
             Category: {category}\n\
             Complexity: {complexity}\n\
             Tags: {tags}\n\
             \n\
             Your task: {description}\n\
             \n\
             Arguments:\n\
             {arguments}\n\
             \n\
             Context:\n\
             {context}\n\
             \n\
             Output format: respond with exactly one JSON value (an object or an array) \
             that answers the task using the arguments and context above. Do not add \
             explanations, markdown fences or any text outside the JSON. Stay within \
             {max_tokens} tokens.\n",
            name = tool.name,
            category = tool.category,
            complexity = tool.complexity.as_str(),
            description = tool.description,
            arguments = format!("{arguments:#}"),
        );

        Prompt { text, max_tokens }
    }
}
