//! `toolwright tools` — List the built-in tools.

use toolwright_config::AppConfig;
use toolwright_orchestrator::output_budget;

pub fn run(config: &AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let registry = toolwright_tools::default_registry(&config.workspace.root);
    let tools = registry.metadata();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("Tools (workspace: {})", config.workspace.root.display());
    println!("==================");
    for tool in &tools {
        println!(
            "  {:<24} {:<20} {:<7} budget {:>4}  [{}]",
            tool.name,
            tool.category.as_str(),
            tool.complexity.as_str(),
            output_budget(tool.category, tool.complexity),
            tool.tags.join(", ")
        );
        println!("  {:<24} {}", "", tool.description);
    }

    Ok(())
}
