//! End-to-end tests for the request orchestrator.
//!
//! These drive `execute_tool` through the real built-in tools, context
//! assembly, admission queue and output resolution, with a scripted backend
//! standing in for the generation server.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Value, json};
use toolwright_backend::{BackendConnection, BackendSupervisor, SupervisorSettings};
use toolwright_core::backend::{Backend, GenerationParams};
use toolwright_core::error::{BackendError, ToolError};
use toolwright_core::message::{ChatMessage, Role};
use toolwright_core::tool::ToolExecutionRequest;
use toolwright_orchestrator::{EXECUTED_ROLE, RequestOrchestrator};
use toolwright_orchestrator::context::token::call_tokens;

// ── Scripted backend ─────────────────────────────────────────────────────

/// Replies with a fixed text and records every prompt it receives.
struct ScriptedBackend {
    reply: Mutex<String>,
    up: AtomicBool,
    fail: AtomicBool,
    prompts: Mutex<Vec<(String, u32)>>,
}

impl ScriptedBackend {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply.into()),
            up: AtomicBool::new(true),
            fail: AtomicBool::new(false),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn last_prompt(&self) -> (String, u32) {
        self.prompts.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, BackendError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), params.max_tokens));
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status_code: 500,
                message: "model crashed".into(),
            });
        }
        Ok(self.reply.lock().unwrap().clone())
    }

    async fn chat(&self, _messages: &[ChatMessage], _params: &GenerationParams) -> Result<String, BackendError> {
        unreachable!("the orchestrator uses the completion endpoint")
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(self.up.load(Ordering::SeqCst))
    }
}

struct Harness {
    orchestrator: RequestOrchestrator,
    backend: Arc<ScriptedBackend>,
    _workspace: tempfile::TempDir,
}

async fn harness(reply: &str) -> Harness {
    let workspace = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(workspace.path().join("src")).unwrap();
    std::fs::write(
        workspace.path().join("src/main.rs"),
        "fn main() {\n    // TODO: parse args\n    run().unwrap();\n}\n",
    )
    .unwrap();
    std::fs::write(
        workspace.path().join("Cargo.toml"),
        "[package]\nname = \"demo\"\n\n[dependencies]\nserde = \"1\"\n",
    )
    .unwrap();

    let backend = ScriptedBackend::new(reply);
    let supervisor = BackendSupervisor::new(
        backend.clone(),
        BackendConnection::new(
            "http://scripted",
            GenerationParams {
                model: "scripted-coder".into(),
                max_tokens: 2048,
                temperature: 0.2,
                top_p: 0.9,
                stop: vec![],
            },
        ),
        SupervisorSettings::default(),
    );
    assert!(supervisor.probe().await);

    let registry = Arc::new(toolwright_tools::default_registry(workspace.path()));
    let orchestrator =
        RequestOrchestrator::new(registry, Arc::new(supervisor), workspace.path(), 16);

    Harness {
        orchestrator,
        backend,
        _workspace: workspace,
    }
}

async fn make_unavailable(h: &Harness) {
    h.backend.up.store(false, Ordering::SeqCst);
    for _ in 0..3 {
        assert!(!h.orchestrator.supervisor().probe().await);
    }
    assert!(!h.orchestrator.supervisor().is_available().await);
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_call_is_served_from_cache() {
    let h = harness(r#"{"results":[]}"#).await;

    let first = h
        .orchestrator
        .execute_tool("search_by_query", json!({"query": "todo"}))
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.data, Some(json!({"results": []})));
    assert!(!first.metadata.cache_hit);
    assert!(first.metadata.tokens_used > 0);

    let second = h
        .orchestrator
        .execute_tool("search_by_query", json!({"query": "todo"}))
        .await
        .unwrap();
    assert!(second.metadata.cache_hit);
    assert_eq!(second.metadata.tokens_used, first.metadata.tokens_used);
    assert_eq!(second.data, first.data);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn cache_hit_needs_no_healthy_backend() {
    let h = harness(r#"{"results":[{"file":"src/main.rs","line":2}]}"#).await;

    let first = h
        .orchestrator
        .execute_tool("search_by_query", json!({"query": "todo", "max_results": 5}))
        .await
        .unwrap();
    assert!(first.success);

    make_unavailable(&h).await;

    // Same arguments, different key order.
    let second = h
        .orchestrator
        .execute_tool("search_by_query", json!({"max_results": 5, "query": "todo"}))
        .await
        .unwrap();
    assert!(second.success);
    assert!(second.metadata.cache_hit);
    assert_eq!(second.data, first.data);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn tokens_cover_prompt_and_output() {
    let reply = r#"{"patterns":["todo","unwrap"]}"#;
    let h = harness(reply).await;

    let result = h
        .orchestrator
        .execute_tool("detect_patterns", json!({}))
        .await
        .unwrap();

    let (prompt, _) = h.backend.last_prompt();
    assert_eq!(result.metadata.tokens_used, call_tokens(&prompt, reply));
}

#[tokio::test]
async fn prose_wrapped_json_is_extracted() {
    let h = harness("Sure, here is the result: {\"a\":1} — hope that helps").await;

    let result = h
        .orchestrator
        .execute_tool("map_architecture", json!({}))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.data, Some(json!({"a": 1})));
}

#[tokio::test]
async fn free_text_is_wrapped_in_envelope() {
    let h = harness("```\nLet me think.\nThe crate has a single binary entry point.\n```").await;

    let args = json!({"path": "src"});
    let result = h
        .orchestrator
        .execute_tool("map_architecture", args.clone())
        .await
        .unwrap();
    assert!(result.success);

    let data = result.data.unwrap();
    assert_eq!(data["result"], "The crate has a single binary entry point.");
    assert_eq!(data["tool"], "map_architecture");
    assert_eq!(data["arguments"], args);
    assert!(data["timestamp"].is_string());
}

#[tokio::test]
async fn unavailable_backend_fails_without_tokens() {
    let h = harness(r#"{"ok":true}"#).await;
    make_unavailable(&h).await;

    let result = h
        .orchestrator
        .execute_tool("build_dependency_graph", json!({}))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().to_lowercase().contains("unavailable"));
    assert_eq!(result.metadata.tokens_used, 0);
    assert!(!result.metadata.cache_hit);
    assert_eq!(h.backend.calls(), 0);

    // Failures are not cached: once the backend recovers the call goes through.
    h.backend.up.store(true, Ordering::SeqCst);
    assert!(h.orchestrator.supervisor().probe().await);
    let retry = h
        .orchestrator
        .execute_tool("build_dependency_graph", json!({}))
        .await
        .unwrap();
    assert!(retry.success);
    assert!(!retry.metadata.cache_hit);
    assert_eq!(h.backend.calls(), 1);
}

#[tokio::test]
async fn backend_failure_becomes_failed_result() {
    let h = harness("unused").await;
    h.backend.fail.store(true, Ordering::SeqCst);

    let result = h
        .orchestrator
        .execute_tool("search_by_query", json!({"query": "main"}))
        .await
        .unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("model crashed"));
    assert_eq!(result.metadata.tokens_used, 0);
    assert!(!h.orchestrator.supervisor().is_available().await);
}

#[tokio::test]
async fn unknown_tool_and_bad_arguments_are_errors() {
    let h = harness(r#"{"ok":true}"#).await;

    let err = h
        .orchestrator
        .execute_tool("no_such_tool", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::NotFound(_)));

    let err = h
        .orchestrator
        .execute_tool("search_by_query", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments(_)));

    let err = h
        .orchestrator
        .execute_tool("search_by_query", json!({"query": 42}))
        .await
        .unwrap_err();
    assert!(matches!(err, ToolError::InvalidArguments(_)));

    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.orchestrator.get_metrics().await.cache.size, 0);
}

#[tokio::test]
async fn prompt_carries_budget_and_peer_context() {
    let h = harness(r#"{"ok":true}"#).await;

    h.orchestrator
        .execute_tool("search_by_query", json!({"query": "todo"}))
        .await
        .unwrap();
    let (prompt, max_tokens) = h.backend.last_prompt();
    assert_eq!(max_tokens, 800);
    assert!(prompt.contains("Category: repo-search"));
    // detect_patterns ran as the peer over the workspace.
    assert!(prompt.contains("\"peer\""));
    assert!(prompt.contains("detect_patterns"));

    h.orchestrator
        .execute_tool("map_architecture", json!({}))
        .await
        .unwrap();
    let (prompt, max_tokens) = h.backend.last_prompt();
    // Architectural at high complexity.
    assert_eq!(max_tokens, 4500);
    // map_architecture is its own peer, so the snapshot is attached too.
    assert!(prompt.contains("directory_snapshot"));
    assert!(prompt.contains("src/main.rs"));
}

#[tokio::test]
async fn related_window_entries_reach_the_prompt() {
    let h = harness(r#"{"ok":true}"#).await;
    h.orchestrator
        .add_to_context(Role::User, "Dependency audit requested for openssl")
        .await;
    h.orchestrator
        .add_to_context(Role::Assistant, "unrelated chatter")
        .await;

    h.orchestrator
        .execute_tool("build_dependency_graph", json!({}))
        .await
        .unwrap();
    let (prompt, max_tokens) = h.backend.last_prompt();
    assert_eq!(max_tokens, 1500);
    assert!(prompt.contains("Dependency audit requested for openssl"));
    assert!(!prompt.contains("unrelated chatter"));
}

#[tokio::test]
async fn request_context_is_merged() {
    let h = harness(r#"{"ok":true}"#).await;

    let mut caller = serde_json::Map::new();
    caller.insert("ticket".into(), json!("PERF-42"));
    let result = h
        .orchestrator
        .execute_request(ToolExecutionRequest {
            tool_name: "detect_patterns".into(),
            arguments: json!({"patterns": ["todo"]}),
            context: Some(caller),
        })
        .await
        .unwrap();
    assert!(result.success);

    let (prompt, _) = h.backend.last_prompt();
    assert!(prompt.contains("PERF-42"));
}

#[tokio::test]
async fn metrics_and_cache_clearing() {
    let h = harness(r#"{"ok":true}"#).await;

    for i in 0..1001 {
        h.orchestrator.add_to_context(Role::User, format!("note {i}")).await;
    }
    h.orchestrator
        .execute_tool("search_by_query", json!({"query": "main"}))
        .await
        .unwrap();

    let metrics = h.orchestrator.get_metrics().await;
    // 500 retained notes plus the recorded execution.
    assert_eq!(metrics.context_window_size, 501);
    assert_eq!(metrics.cache.size, 1);
    assert_eq!(metrics.cache.capacity, 16);
    assert_eq!(metrics.backend.request_count, 1);
    assert_eq!(metrics.backend.healthy_instances, 1);

    h.orchestrator.clear_cache();
    assert_eq!(h.orchestrator.get_metrics().await.cache.size, 0);

    let again = h
        .orchestrator
        .execute_tool("search_by_query", json!({"query": "main"}))
        .await
        .unwrap();
    assert!(!again.metadata.cache_hit);
    assert_eq!(h.backend.calls(), 2);

    h.orchestrator.shutdown().await;
    let value: Value = serde_json::to_value(h.orchestrator.get_metrics().await).unwrap();
    assert_eq!(value["backend"]["pending"], 0);
}

#[tokio::test]
async fn requested_tool_findings_reach_the_prompt() {
    let h = harness(r#"{"ok":true}"#).await;

    h.orchestrator
        .execute_tool("search_by_query", json!({"query": "serde"}))
        .await
        .unwrap();
    let (prompt, _) = h.backend.last_prompt();
    assert!(prompt.contains("\"tool_result\""));
    assert!(!prompt.contains("\"tool_error\""));
    // The only hit for `serde` is the manifest line.
    assert!(prompt.contains("Cargo.toml"), "search hit missing from prompt:\n{prompt}");

    h.orchestrator
        .execute_tool("detect_patterns", json!({"patterns": ["unwrap"]}))
        .await
        .unwrap();
    let (prompt, _) = h.backend.last_prompt();
    assert!(prompt.contains("\"findings\""));
    assert!(prompt.contains("run().unwrap();"));

    for (tool, key) in [
        ("map_architecture", "\"entry_points\""),
        ("build_dependency_graph", "\"external\""),
    ] {
        h.orchestrator.execute_tool(tool, json!({})).await.unwrap();
        let (prompt, _) = h.backend.last_prompt();
        assert!(prompt.contains(key), "{tool} result missing from prompt");
    }
}

#[tokio::test]
async fn executed_requests_feed_later_context() {
    let h = harness(r#"{"ok":true}"#).await;

    h.orchestrator
        .execute_tool("search_by_query", json!({"query": "main"}))
        .await
        .unwrap();
    h.orchestrator
        .execute_tool("search_by_query", json!({"query": "fn"}))
        .await
        .unwrap();

    let (prompt, _) = h.backend.last_prompt();
    assert!(prompt.contains(r#"search_by_query [repo-search] {\"query\":\"main\"}"#));
    assert!(prompt.contains(&format!("\"role\": \"{EXECUTED_ROLE}\"")));

    // Cache hits and failures are not recorded.
    h.orchestrator
        .execute_tool("search_by_query", json!({"query": "fn"}))
        .await
        .unwrap();
    assert_eq!(h.orchestrator.get_metrics().await.context_window_size, 2);

    h.orchestrator
        .add_to_context("reviewer", "free-form roles are accepted")
        .await;
    assert_eq!(h.orchestrator.get_metrics().await.context_window_size, 3);
}
