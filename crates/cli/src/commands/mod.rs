pub mod config_cmd;
pub mod run;
pub mod status;
pub mod tools;

use std::path::Path;
use toolwright_config::AppConfig;

/// Load the config from `path` if given, else from the conventional
/// locations. Environment overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

/// Parse a JSON object argument.
pub fn parse_object(
    flag: &str,
    raw: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, Box<dyn std::error::Error>> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("--{flag} must be a JSON object, got {other}").into()),
    }
}
