//! Request orchestrator — the single entry point for running a tool.
//!
//! ```text
//! execute_tool(name, args)
//!   ├─ resolve + validate ──────────── Err(NotFound | InvalidArguments)
//!   ├─ cache lookup ───────────────── hit → cached result, cache_hit = true
//!   ├─ assemble context (own handler, peer tool, related window entries, snapshot)
//!   ├─ build prompt (budget → max_tokens)
//!   ├─ supervisor.submit_completion ─ failure → ToolResult { success: false }
//!   ├─ resolve output (structured or free-text envelope)
//!   └─ cache, record in the context window, return
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use toolwright_backend::{BackendSupervisor, SupervisorMetrics};
use toolwright_config::AppConfig;
use toolwright_core::backend::GenerationOptions;
use toolwright_core::error::{Error, ToolError};
use toolwright_core::tool::{ToolExecutionRequest, ToolMetadata, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};
use crate::cache::{CacheStats, ResultCache, canonical_key};
use crate::canonical;
use crate::context::{ContextAssembler, ContextWindow, token};
use crate::prompt::PromptBuilder;
use crate::resolver::OutputResolver;

/// Context-window role of recorded tool executions.
pub const EXECUTED_ROLE: &str = "tool";

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorMetrics {
    pub cache: CacheStats,
    pub context_window_size: usize,
    pub backend: SupervisorMetrics,
}

pub struct RequestOrchestrator {
    registry: Arc<ToolRegistry>,
    supervisor: Arc<BackendSupervisor>,
    window: Arc<RwLock<ContextWindow>>,
    assembler: ContextAssembler,
    prompts: PromptBuilder,
    resolver: OutputResolver,
    cache: ResultCache,
}

impl RequestOrchestrator {
    pub fn new(
        registry: Arc<ToolRegistry>,
        supervisor: Arc<BackendSupervisor>,
        workspace_root: impl Into<PathBuf>,
        cache_capacity: usize,
    ) -> Self {
        let window = Arc::new(RwLock::new(ContextWindow::new()));
        let assembler = ContextAssembler::new(registry.clone(), window.clone(), workspace_root);

        Self {
            registry,
            supervisor,
            window,
            assembler,
            prompts: PromptBuilder::new(),
            resolver: OutputResolver::new(),
            cache: ResultCache::new(cache_capacity),
        }
    }

    /// Built-in tools over the configured workspace, talking to the
    /// configured HTTP backend. The supervisor still needs
    /// [`BackendSupervisor::initialize`].
    pub fn from_config(config: &AppConfig) -> Self {
        let registry = Arc::new(toolwright_tools::default_registry(&config.workspace.root));
        let supervisor = Arc::new(BackendSupervisor::from_config(config));
        Self::new(
            registry,
            supervisor,
            config.workspace.root.clone(),
            config.cache.capacity,
        )
    }

    pub fn supervisor(&self) -> &Arc<BackendSupervisor> {
        &self.supervisor
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a tool by name.
    ///
    /// Only an unknown tool or arguments that fail the tool's schema come
    /// back as `Err`. Every other failure is a `ToolResult` with
    /// `success: false` and zero token usage.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> Result<ToolResult, ToolError> {
        self.execute_request(ToolExecutionRequest {
            tool_name: tool_name.to_string(),
            arguments,
            context: None,
        })
        .await
    }

    /// Run a tool request. Caller context keys are added to the assembled
    /// context without replacing any assembled key.
    pub async fn execute_request(
        &self,
        request: ToolExecutionRequest,
    ) -> Result<ToolResult, ToolError> {
        let started = Instant::now();

        let tool = self
            .registry
            .get(&request.tool_name)
            .ok_or_else(|| ToolError::NotFound(request.tool_name.clone()))?;
        tool.validate(&request.arguments)?;

        let key = canonical_key(&request.tool_name, &request.arguments);
        if let Some(cached) = self.cache.get(&key) {
            debug!(tool = %request.tool_name, "Served from cache");
            return Ok(cached.as_cache_hit(started.elapsed()));
        }

        let metadata = tool.metadata();
        match self.generate(&metadata, &request).await {
            Ok((data, tokens_used)) => {
                let result = ToolResult::success(data, started.elapsed(), tokens_used);
                self.cache.insert(key, result.clone());
                self.record(&metadata, &request.arguments).await;
                info!(
                    tool = %metadata.name,
                    elapsed_ms = result.metadata.execution_time.as_millis() as u64,
                    tokens_used,
                    "Tool executed"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(tool = %metadata.name, error = %e, "Tool execution failed");
                Ok(ToolResult::failure(e.to_string(), started.elapsed()))
            }
        }
    }

    /// Context, prompt, backend call and resolution for one cache miss.
    async fn generate(
        &self,
        tool: &ToolMetadata,
        request: &ToolExecutionRequest,
    ) -> Result<(Value, u64), Error> {
        let mut context = self.assembler.assemble(tool, &request.arguments).await;
        if let Some(caller) = &request.context {
            merge_caller_context(&mut context, caller);
        }

        let prompt = self.prompts.build(tool, &request.arguments, &context);
        debug!(
            tool = %tool.name,
            prompt_chars = prompt.text.len(),
            max_tokens = prompt.max_tokens,
            "Submitting prompt"
        );

        let raw = self
            .supervisor
            .submit_completion(
                &prompt.text,
                GenerationOptions::default().with_max_tokens(prompt.max_tokens),
            )
            .await?;

        let resolved = self.resolver.resolve(&raw, &tool.name, &request.arguments);
        if !resolved.structured {
            debug!(tool = %tool.name, "Returning free-text envelope");
        }
        Ok((resolved.data, token::call_tokens(&prompt.text, &raw)))
    }

    /// Record an interaction in the context window. `role` is free-form;
    /// [`Role`](toolwright_core::message::Role) converts into it.
    pub async fn add_to_context(&self, role: impl Into<String>, content: impl Into<String>) {
        self.window.write().await.add(role, content);
    }

    /// Executed requests land in the window under the `tool` role. The tool
    /// name and category carry the keywords later calls filter on.
    async fn record(&self, tool: &ToolMetadata, arguments: &Value) {
        self.add_to_context(
            EXECUTED_ROLE,
            format!(
                "{} [{}] {}",
                tool.name,
                tool.category,
                canonical::to_canonical_string(arguments)
            ),
        )
        .await;
    }

    pub async fn get_metrics(&self) -> OrchestratorMetrics {
        OrchestratorMetrics {
            cache: self.cache.stats(),
            context_window_size: self.window.read().await.len(),
            backend: self.supervisor.get_metrics().await,
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        debug!("Result cache cleared");
    }

    /// Stop the supervisor, letting queued backend calls finish first.
    pub async fn shutdown(&self) {
        self.supervisor.shutdown().await;
    }
}

fn merge_caller_context(context: &mut Map<String, Value>, caller: &Map<String, Value>) {
    for (key, value) in caller {
        if !context.contains_key(key) {
            context.insert(key.clone(), value.clone());
        }
    }
}
