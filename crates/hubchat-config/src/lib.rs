//! Layered configuration for the hub chat client.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use hubchat_api::{ClientOptions, DEFAULT_MAX_ITERATIONS, DEFAULT_STREAM_PATH};
use hubchat_types::ConfigError;

/// The default hub URL (local agent web port).
pub const DEFAULT_BASE_URL: &str = "http://localhost:31888";

/// The default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Resolved configuration for a chat session.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub base_url: String,
    pub stream_path: String,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub max_read_iterations: u64,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub endpoint: EndpointSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub base_url: Option<String>,
    pub stream_path: Option<String>,
    pub api_key: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub max_read_iterations: Option<u64>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl ChatConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`HUBCHAT_BASE_URL`, `HUBCHAT_API_KEY`)
    /// 3. Config file (~/.hubchat/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        Self::resolve(overrides, config_dir_with(env), env)
    }

    fn resolve(
        overrides: CliOverrides,
        config_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let settings = load_settings_file(&config_dir.join("config.toml")).endpoint;

        let base_url = overrides
            .base_url
            .or_else(|| env("HUBCHAT_BASE_URL"))
            .or(settings.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                key: "base_url".into(),
                message: format!("'{base_url}' is not an http(s) URL"),
            });
        }

        let api_key = overrides
            .api_key
            .or_else(|| env("HUBCHAT_API_KEY"))
            .or(settings.api_key)
            .filter(|key| !key.is_empty());

        let stream_path = settings
            .stream_path
            .unwrap_or_else(|| DEFAULT_STREAM_PATH.to_string());
        if !stream_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "stream_path".into(),
                message: "must start with '/'".into(),
            });
        }

        let max_read_iterations = settings
            .max_read_iterations
            .unwrap_or(DEFAULT_MAX_ITERATIONS);
        if max_read_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_read_iterations".into(),
                message: "must be greater than zero".into(),
            });
        }

        let connect_timeout = Duration::from_secs(
            settings
                .connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        );

        Ok(ChatConfig {
            base_url,
            stream_path,
            api_key,
            connect_timeout,
            max_read_iterations,
            config_dir,
        })
    }

    /// Options for building a `hubchat_api::ChatClient`.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            stream_path: self.stream_path.clone(),
            api_key: self.api_key.clone(),
            connect_timeout: Some(self.connect_timeout),
            max_iterations: self.max_read_iterations,
        }
    }
}

/// Config directory: `HUBCHAT_CONFIG_DIR`, else `~/.hubchat/`.
fn config_dir_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = env("HUBCHAT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hubchat")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn write_config(dir: &Path, content: &str) {
        std::fs::write(dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn test_default_settings() {
        let settings = SettingsFile::default();
        assert!(settings.endpoint.base_url.is_none());
        assert!(settings.endpoint.api_key.is_none());
    }

    #[test]
    fn test_settings_toml_parse() {
        let toml_str = r#"
[endpoint]
base_url = "https://hub.example.com"
max_read_iterations = 500
"#;
        let settings: SettingsFile = toml::from_str(toml_str).unwrap();
        assert_eq!(
            settings.endpoint.base_url.as_deref(),
            Some("https://hub.example.com")
        );
        assert_eq!(settings.endpoint.max_read_iterations, Some(500));
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            ChatConfig::resolve(CliOverrides::default(), dir.path().to_path_buf(), env_from(&[]))
                .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.stream_path, "/api/chat/stream");
        assert!(config.api_key.is_none());
        assert_eq!(config.max_read_iterations, 100_000);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_file_values_used() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
[endpoint]
base_url = "https://hub.example.com"
stream_path = "/custom/stream"
api_key = "from-file"
connect_timeout_secs = 3
"#,
        );
        let config =
            ChatConfig::resolve(CliOverrides::default(), dir.path().to_path_buf(), env_from(&[]))
                .unwrap();
        assert_eq!(config.base_url, "https://hub.example.com");
        assert_eq!(config.stream_path, "/custom/stream");
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
[endpoint]
base_url = "http://file:1"
api_key = "file-key"
"#,
        );
        let env = env_from(&[
            ("HUBCHAT_BASE_URL", "http://env:2"),
            ("HUBCHAT_API_KEY", "env-key"),
        ]);

        let config =
            ChatConfig::resolve(CliOverrides::default(), dir.path().to_path_buf(), &env).unwrap();
        assert_eq!(config.base_url, "http://env:2");
        assert_eq!(config.api_key.as_deref(), Some("env-key"));

        let config = ChatConfig::resolve(
            CliOverrides {
                base_url: Some("http://cli:3".into()),
                api_key: Some("cli-key".into()),
            },
            dir.path().to_path_buf(),
            &env,
        )
        .unwrap();
        assert_eq!(config.base_url, "http://cli:3");
        assert_eq!(config.api_key.as_deref(), Some("cli-key"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[endpoint\nbase_url = ");
        let config =
            ChatConfig::resolve(CliOverrides::default(), dir.path().to_path_buf(), env_from(&[]))
                .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let err = ChatConfig::resolve(
            CliOverrides {
                base_url: Some("ftp://hub".into()),
                ..CliOverrides::default()
            },
            dir.path().to_path_buf(),
            env_from(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "base_url"));
    }

    #[test]
    fn test_rejects_zero_iterations() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[endpoint]\nmax_read_iterations = 0\n");
        let err =
            ChatConfig::resolve(CliOverrides::default(), dir.path().to_path_buf(), env_from(&[]))
                .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_read_iterations")
        );
    }

    #[test]
    fn test_empty_api_key_treated_as_unset() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::resolve(
            CliOverrides::default(),
            dir.path().to_path_buf(),
            env_from(&[("HUBCHAT_API_KEY", "")]),
        )
        .unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_config_dir_from_env() {
        let dir = config_dir_with(env_from(&[("HUBCHAT_CONFIG_DIR", "/tmp/hubchat-test")]));
        assert_eq!(dir, PathBuf::from("/tmp/hubchat-test"));
    }

    #[test]
    fn test_client_options_mirror_config() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[endpoint]\nmax_read_iterations = 42\n");
        let config = ChatConfig::resolve(
            CliOverrides {
                api_key: Some("k".into()),
                ..CliOverrides::default()
            },
            dir.path().to_path_buf(),
            env_from(&[]),
        )
        .unwrap();
        let options = config.client_options();
        assert_eq!(options.max_iterations, 42);
        assert_eq!(options.api_key.as_deref(), Some("k"));
        assert_eq!(options.stream_path, DEFAULT_STREAM_PATH);
    }
}
