//! Configuration structures for PredictLoop
//!
//! Configurations are loaded from YAML files and can be overridden by
//! environment variables (`PREDICTLOOP__SECTION__KEY`).

use crate::error::{PredictLoopError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "PREDICTLOOP";

/// Top-level configuration for the prediction server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictLoopConfig {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model artifact configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request message, in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Time a new connection has to complete the WebSocket handshake
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the JSON model artifact
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Feature count the artifact must accept (checked at startup)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arity: Option<usize>,
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_metrics")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8181
}

fn default_max_message_bytes() -> usize {
    64 * 1024
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/model.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics() -> bool {
    false
}

fn default_metrics_port() -> u16 {
    9091
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_message_bytes: default_max_message_bytes(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            expected_arity: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            enable_metrics: default_metrics(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string handed to the listener
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl ObservabilityConfig {
    /// `host:port` string for the metrics endpoint, sharing the server's host
    pub fn metrics_address(&self, server: &ServerConfig) -> String {
        format!("{}:{}", server.bind_address, self.metrics_port)
    }
}

impl PredictLoopConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            PredictLoopError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| {
            PredictLoopError::Config(format!(
                "Failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: PredictLoopConfig = serde_yaml::from_str(content)
            .map_err(|e| PredictLoopError::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Layer an optional YAML file under `PREDICTLOOP__*` environment overrides
    ///
    /// A missing file is not an error; defaults fill whatever neither source
    /// sets. Example override: `PREDICTLOOP__SERVER__PORT=9000`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(false),
            );
        }

        let config: PredictLoopConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.max_message_bytes == 0 {
            return Err(PredictLoopError::config(
                "server.max_message_bytes must be greater than zero",
            ));
        }

        if self.server.handshake_timeout_ms == 0 {
            return Err(PredictLoopError::config(
                "server.handshake_timeout_ms must be greater than zero",
            ));
        }

        if self.model.path.as_os_str().is_empty() {
            return Err(PredictLoopError::config("model.path must not be empty"));
        }

        if self.model.expected_arity == Some(0) {
            return Err(PredictLoopError::config(
                "model.expected_arity must be greater than zero",
            ));
        }

        if self.observability.enable_metrics && self.observability.metrics_port == self.server.port {
            return Err(PredictLoopError::config(format!(
                "Metrics port {} collides with server port",
                self.observability.metrics_port
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_service() {
        let config = PredictLoopConfig::default();

        assert_eq!(config.server.listen_address(), "127.0.0.1:8181");
        assert_eq!(config.server.handshake_timeout(), Duration::from_secs(10));
        assert!(config.model.expected_arity.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial_sections() {
        let yaml = r#"
server:
  port: 9000
model:
  path: /models/housing.json
  expected_arity: 3
"#;
        let config = PredictLoopConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.model.path, PathBuf::from("/models/housing.json"));
        assert_eq!(config.model.expected_arity, Some(3));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_config_validation_zero_arity() {
        let mut config = PredictLoopConfig::default();
        config.model.expected_arity = Some(0);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_metrics_port_collision() {
        let mut config = PredictLoopConfig::default();
        config.observability.enable_metrics = true;
        config.observability.metrics_port = config.server.port;

        assert!(config.validate().is_err());

        config.observability.enable_metrics = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server:\n  bind_address: 0.0.0.0\n  max_message_bytes: 1024").unwrap();

        let config = PredictLoopConfig::from_file(file.path()).unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.max_message_bytes, 1024);
    }

    #[test]
    fn test_from_file_missing() {
        let result = PredictLoopConfig::from_file("/nonexistent/predictloop.yaml");

        assert!(matches!(result, Err(PredictLoopError::Config(_))));
    }

    #[test]
    fn test_load_layers_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "model:\n  path: models/iris.json\nobservability:\n  log_level: debug").unwrap();

        let config = PredictLoopConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.model.path, PathBuf::from("models/iris.json"));
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.server.port, 8181);
    }

    #[test]
    fn test_load_env_overrides_file() {
        // Only this test sets this key, so parallel tests are unaffected
        let key = "PREDICTLOOP__OBSERVABILITY__METRICS_PORT";
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "observability:\n  enable_metrics: true\n  metrics_port: 9300").unwrap();

        std::env::set_var(key, "9555");
        let result = PredictLoopConfig::load(Some(file.path()));
        std::env::remove_var(key);

        let config = result.unwrap();
        assert_eq!(config.observability.metrics_port, 9555);
        assert!(config.observability.enable_metrics);
    }
}
