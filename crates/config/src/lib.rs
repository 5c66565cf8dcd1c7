//! Configuration loading, validation, and management for Toolwright.
//!
//! Loads configuration from the first file found among a small set of
//! conventional locations, with environment variable overrides. Every field
//! has a built-in default, so a missing file is never an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use toolwright_core::backend::GenerationParams;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream backend location and model
    #[serde(default)]
    pub backend: BackendConfig,

    /// Default generation parameters (overridable per call)
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Admission queue, timeouts and health probing
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Result cache sizing
    #[serde(default)]
    pub cache: CacheConfig,

    /// Working tree the tools operate on
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_model() -> String {
    "qwen2.5-coder-7b-instruct".into()
}

impl BackendConfig {
    /// Base URL of the backend's HTTP server.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model: default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            stop: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Maximum simultaneously in-flight backend calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Maximum task starts per rate window
    #[serde(default = "default_max_starts")]
    pub max_starts_per_window: usize,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_max_concurrent() -> usize {
    2
}
fn default_max_starts() -> usize {
    10
}
fn default_window_secs() -> u64 {
    1
}
fn default_generation_timeout() -> u64 {
    600
}
fn default_probe_timeout() -> u64 {
    5
}
fn default_probe_interval() -> u64 {
    30
}

impl SupervisorConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_starts_per_window: default_max_starts(),
            window_secs: default_window_secs(),
            generation_timeout_secs: default_generation_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    512
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the first conventional location that exists,
    /// then apply environment variable overrides:
    /// - `TOOLWRIGHT_BACKEND_HOST`, `TOOLWRIGHT_BACKEND_PORT`
    /// - `TOOLWRIGHT_MODEL`
    /// - `TOOLWRIGHT_MAX_TOKENS`, `TOOLWRIGHT_TEMPERATURE`
    /// - `TOOLWRIGHT_WORKSPACE`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::discover() {
            Some(path) => Self::load_from(&path)?,
            None => {
                tracing::info!("No config file found, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Conventional config file locations, in priority order.
    pub fn candidate_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("toolwright.toml"),
            PathBuf::from(".toolwright").join("config.toml"),
            Self::config_dir().join("config.toml"),
        ]
    }

    /// The first candidate path that exists.
    pub fn discover() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|p| p.exists())
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Unparseable numbers are
    /// ignored with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TOOLWRIGHT_BACKEND_HOST") {
            self.backend.host = host;
        }
        if let Some(port) = parse_env(&lookup, "TOOLWRIGHT_BACKEND_PORT") {
            self.backend.port = port;
        }
        if let Some(model) = lookup("TOOLWRIGHT_MODEL") {
            self.backend.model = model;
        }
        if let Some(max_tokens) = parse_env(&lookup, "TOOLWRIGHT_MAX_TOKENS") {
            self.generation.max_tokens = max_tokens;
        }
        if let Some(temperature) = parse_env(&lookup, "TOOLWRIGHT_TEMPERATURE") {
            self.generation.temperature = temperature;
        }
        if let Some(root) = lookup("TOOLWRIGHT_WORKSPACE") {
            self.workspace.root = PathBuf::from(root);
        }
    }

    /// Get the per-user configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolwright")
    }

    /// Default generation parameters for the backend.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            model: self.backend.model.clone(),
            max_tokens: self.generation.max_tokens,
            temperature: self.generation.temperature,
            top_p: self.generation.top_p,
            stop: self.generation.stop.clone(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        if self.supervisor.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "supervisor.max_concurrent must be at least 1".into(),
            ));
        }

        if self.supervisor.max_starts_per_window == 0 {
            return Err(ConfigError::ValidationError(
                "supervisor.max_starts_per_window must be at least 1".into(),
            ));
        }

        let durations = [
            ("window_secs", self.supervisor.window_secs),
            ("generation_timeout_secs", self.supervisor.generation_timeout_secs),
            ("probe_timeout_secs", self.supervisor.probe_timeout_secs),
            ("probe_interval_secs", self.supervisor.probe_interval_secs),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::ValidationError(format!(
                "supervisor.{name} must be at least 1"
            )));
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "cache.capacity must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for toolwright_core::Error {
    fn from(err: ConfigError) -> Self {
        toolwright_core::Error::Config {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend.port, 8080);
        assert_eq!(config.backend.base_url(), "http://127.0.0.1:8080");
        assert_eq!(config.supervisor.generation_timeout(), Duration::from_secs(600));
        assert_eq!(config.supervisor.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.supervisor.probe_interval(), Duration::from_secs(30));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let parsed: AppConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.backend.model, config.backend.model);
        assert_eq!(parsed.cache.capacity, config.cache.capacity);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let toml_str = r#"
[backend]
port = 9090

[supervisor]
max_concurrent = 4
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.port, 9090);
        assert_eq!(config.backend.host, "127.0.0.1");
        assert_eq!(config.supervisor.max_concurrent, 4);
        assert_eq!(config.supervisor.max_starts_per_window, 10);
        assert_eq!(config.generation.max_tokens, 2048);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let mut config = AppConfig::default();
        config.supervisor.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_durations_rejected() {
        let zeroed: [fn(&mut SupervisorConfig); 4] = [
            |s| s.window_secs = 0,
            |s| s.generation_timeout_secs = 0,
            |s| s.probe_timeout_secs = 0,
            |s| s.probe_interval_secs = 0,
        ];
        for (zero, name) in zeroed.into_iter().zip([
            "window_secs",
            "generation_timeout_secs",
            "probe_timeout_secs",
            "probe_interval_secs",
        ]) {
            let mut config = AppConfig::default();
            zero(&mut config.supervisor);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(name), "{name}: {err}");
        }
    }

    #[test]
    fn zero_timeout_in_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolwright.toml");
        std::fs::write(&path, "[supervisor]\nprobe_timeout_secs = 0\n").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/toolwright.toml")).unwrap();
        assert_eq!(config.backend.model, "qwen2.5-coder-7b-instruct");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolwright.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[backend]\nhost = \"10.0.0.5\"\nmodel = \"deepseek-coder\"").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.backend.host, "10.0.0.5");
        assert_eq!(config.backend.model, "deepseek-coder");
        assert_eq!(config.generation_params().model, "deepseek-coder");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolwright.toml");
        std::fs::write(&path, "[backend\nport = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TOOLWRIGHT_BACKEND_HOST", "gpu-box"),
            ("TOOLWRIGHT_BACKEND_PORT", "8081"),
            ("TOOLWRIGHT_MODEL", "codellama"),
            ("TOOLWRIGHT_TEMPERATURE", "0.5"),
            ("TOOLWRIGHT_WORKSPACE", "/srv/repo"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.host, "gpu-box");
        assert_eq!(config.backend.port, 8081);
        assert_eq!(config.backend.model, "codellama");
        assert!((config.generation.temperature - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.workspace.root, PathBuf::from("/srv/repo"));
    }

    #[test]
    fn bad_numeric_override_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|k| {
            (k == "TOOLWRIGHT_BACKEND_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.backend.port, 8080);
    }

    #[test]
    fn candidate_paths_are_ordered() {
        let paths = AppConfig::candidate_paths();
        assert_eq!(paths[0], PathBuf::from("toolwright.toml"));
        assert!(paths[2].ends_with(".toolwright/config.toml"));
    }
}
