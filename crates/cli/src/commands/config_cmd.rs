//! `toolwright config` — Show the effective configuration.

use std::path::Path;
use toolwright_config::AppConfig;

pub fn show(config: &AppConfig, explicit: Option<&Path>) {
    let source = explicit
        .map(Path::to_path_buf)
        .or_else(AppConfig::discover);
    match source {
        Some(path) if path.exists() => println!("# Loaded from {}", path.display()),
        _ => println!("# No config file found, showing defaults"),
    }
    println!("# Environment overrides are applied\n");
    print!("{}", config.to_toml());
}
