use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3040,
        }
    }
}

/// Backend endpoint configuration.
///
/// `backend_model` is the model name sent upstream; `served_model` is the
/// name reported back to clients in completions and chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub backend_model: String,
    pub served_model: String,
    pub accept_invalid_certs: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://chat.openai.com".to_string(),
            backend_model: "text-davinci-002-render-sha".to_string(),
            served_model: "gpt-3.5-turbo".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// Session refresh cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub refresh_interval_secs: u64,
    pub error_backoff_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 600,
            error_backoff_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub log_level: String,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub features: FeaturesConfig,
}

/// Load configuration from a YAML file.
///
/// A missing file is not an error: every field has a default, so the proxy
/// runs with no config file at all.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            validate_config(&config)?;
            return Ok(config);
        }
        Err(err) => return Err(ConfigError::Io(err)),
    };

    let mut config: AppConfig = serde_yaml::from_str(&raw)?;
    config.backend.base_url = config.backend.base_url.trim_end_matches('/').to_string();
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be non-zero".to_string(),
        ));
    }
    if config.backend.base_url.is_empty() {
        return Err(ConfigError::Validation(
            "backend.base_url must not be empty".to_string(),
        ));
    }
    if !config.backend.base_url.starts_with("http://")
        && !config.backend.base_url.starts_with("https://")
    {
        return Err(ConfigError::Validation(
            "backend.base_url must start with http:// or https://".to_string(),
        ));
    }
    if config.session.refresh_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "session.refresh_interval_secs must be at least 1".to_string(),
        ));
    }
    if config.session.error_backoff_secs == 0 {
        return Err(ConfigError::Validation(
            "session.error_backoff_secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3040);
        assert_eq!(config.backend.base_url, "https://chat.openai.com");
        assert_eq!(config.backend.served_model, "gpt-3.5-turbo");
        assert_eq!(config.session.refresh_interval_secs, 600);
        assert_eq!(config.session.error_backoff_secs, 120);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let config: AppConfig = serde_yaml::from_str(
            "server:\n  port: 8080\nbackend:\n  base_url: http://localhost:9000\n",
        )
        .expect("parse yaml");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.backend.base_url, "http://localhost:9000");
        assert_eq!(config.backend.backend_model, "text-davinci-002-render-sha");
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let mut config = AppConfig::default();
        config.backend.base_url = "chat.openai.com".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = load_config("definitely-not-a-real-config.yaml").expect("defaults");
        assert_eq!(config.server.port, 3040);
    }
}
