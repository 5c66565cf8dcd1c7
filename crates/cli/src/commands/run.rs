//! `toolwright run` — Execute one tool.

use toolwright_config::AppConfig;
use toolwright_core::tool::ToolExecutionRequest;
use toolwright_orchestrator::RequestOrchestrator;
use tracing::warn;
use super::parse_object;

pub async fn run(
    config: &AppConfig,
    tool: &str,
    args: &str,
    context: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let arguments = serde_json::Value::Object(parse_object("args", args)?);
    let context = context.map(|raw| parse_object("context", raw)).transpose()?;

    let orchestrator = RequestOrchestrator::from_config(config);
    if !orchestrator.supervisor().initialize().await {
        warn!(
            endpoint = %config.backend.base_url(),
            "Backend did not answer its first health check"
        );
    }

    let outcome = orchestrator
        .execute_request(ToolExecutionRequest {
            tool_name: tool.to_string(),
            arguments,
            context,
        })
        .await;
    orchestrator.shutdown().await;

    let result = outcome?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.success {
        Ok(())
    } else {
        Err(result.error.unwrap_or_else(|| "tool failed".into()).into())
    }
}
