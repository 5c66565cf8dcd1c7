//! `toolwright status` — Probe the backend and show its state.

use toolwright_backend::BackendSupervisor;
use toolwright_config::AppConfig;

pub async fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = BackendSupervisor::from_config(config);
    let healthy = supervisor.initialize().await;
    let connection = supervisor.connection().await;
    let metrics = supervisor.get_metrics().await;
    supervisor.shutdown().await;

    println!("Toolwright Status");
    println!("=================");
    println!("  Backend:      {}", connection.endpoint);
    println!("  Model:        {}", connection.params.model);
    println!("  Max tokens:   {}", connection.params.max_tokens);
    println!("  Temperature:  {}", connection.params.temperature);
    println!(
        "  Queue:        {} in flight, {} starts per {}s",
        config.supervisor.max_concurrent,
        config.supervisor.max_starts_per_window,
        config.supervisor.window_secs
    );
    println!("  Workspace:    {}", config.workspace.root.display());
    println!("  Cache:        {} entries", config.cache.capacity);
    println!();

    if healthy {
        println!("  ✅ Backend is healthy");
    } else {
        println!("  ❌ Backend is unavailable");
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    Ok(())
}
