//! Configuration management

use crate::error::{DeskError, DeskResult, ErrorContext};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub transport: TransportConfig,
    pub navigation: NavigationConfig,
    pub logging: LoggingConfig,
}

/// Backend REST settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Backend origin, e.g. `http://localhost:8002`
    pub base_url: String,
    /// Versioned prefix of the service endpoints
    pub api_prefix: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Surface extra diagnostics
    pub debug: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            api_prefix: "/api/v1/mcp".to_string(),
            timeout_seconds: 30,
            user_agent: format!("mcpdesk/{}", env!("CARGO_PKG_VERSION")),
            debug: false,
        }
    }
}

/// Durable session storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage_dir: String,
    /// Key the credential is persisted under
    pub storage_key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_dir: "~/.mcpdesk/session".to_string(),
            storage_key: "userInfo".to_string(),
        }
    }
}

/// Event-stream transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long `connect` waits for the endpoint event
    pub handshake_timeout_seconds: u64,
    /// Upper bound for a whole reachability probe
    pub probe_timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_seconds: 10,
            probe_timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub login_path: String,
    pub home_path: String,
    /// Appended to every page title
    pub title_suffix: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            title_suffix: "MCP Admin Console".to_string(),
        }
    }
}

impl DeskConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> DeskResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DeskError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: DeskConfig = toml::from_str(&content).map_err(|e| DeskError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> DeskResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| DeskError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content).map_err(|e| DeskError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Default config file location (`~/.mcpdesk/config.toml`)
    pub fn default_path() -> PathBuf {
        expand_home("~/.mcpdesk/config.toml")
    }

    /// Override settings from `MCPDESK_*` environment variables
    pub fn apply_env(&mut self) -> DeskResult<()> {
        if let Ok(base_url) = std::env::var("MCPDESK_API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Ok(timeout) = std::env::var("MCPDESK_API_TIMEOUT") {
            self.api.timeout_seconds = timeout.parse().map_err(|_| DeskError::Validation {
                message: format!("MCPDESK_API_TIMEOUT is not a number: {}", timeout),
                field: Some("api.timeout_seconds".to_string()),
                context: ErrorContext::new("config").with_operation("apply_env"),
            })?;
        }
        if let Ok(debug) = std::env::var("MCPDESK_DEBUG") {
            self.api.debug = debug == "true" || debug == "1";
        }
        if let Ok(dir) = std::env::var("MCPDESK_SESSION_DIR") {
            self.session.storage_dir = dir;
        }
        Ok(())
    }

    /// Session directory with `~` expanded
    pub fn session_dir(&self) -> PathBuf {
        expand_home(&self.session.storage_dir)
    }

    /// Validate configuration
    pub fn validate(&self) -> DeskResult<()> {
        let base = self.api.base_url.trim();
        if base.is_empty() || !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid(
                "api.base_url must be an http:// or https:// URL",
                "api.base_url",
            ));
        }

        if !self.api.api_prefix.starts_with('/') {
            return Err(invalid("api.api_prefix must start with '/'", "api.api_prefix"));
        }

        if self.api.timeout_seconds == 0 {
            return Err(invalid(
                "api.timeout_seconds must be greater than 0",
                "api.timeout_seconds",
            ));
        }

        if self.transport.handshake_timeout_seconds == 0 || self.transport.probe_timeout_seconds == 0
        {
            return Err(invalid(
                "transport timeouts must be greater than 0",
                "transport",
            ));
        }

        if self.session.storage_key.trim().is_empty() {
            return Err(invalid(
                "session.storage_key must not be empty",
                "session.storage_key",
            ));
        }

        if !self.navigation.login_path.starts_with('/') || !self.navigation.home_path.starts_with('/')
        {
            return Err(invalid(
                "navigation paths must start with '/'",
                "navigation",
            ));
        }

        Ok(())
    }
}

fn invalid(message: &str, field: &str) -> DeskError {
    DeskError::Validation {
        message: message.to_string(),
        field: Some(field.to_string()),
        context: ErrorContext::new("config")
            .with_operation("validate")
            .with_suggestion("Fix the value in your config file or environment"),
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DeskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.api_prefix, "/api/v1/mcp");
        assert_eq!(config.session.storage_key, "userInfo");
        assert_eq!(config.navigation.login_path, "/login");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DeskConfig::default();
        config.api.base_url = "localhost:8002".to_string();
        assert!(matches!(
            config.validate(),
            Err(DeskError::Validation { .. })
        ));

        let mut config = DeskConfig::default();
        config.api.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = DeskConfig::default();
        config.session.storage_key = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DeskConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://admin.example.com"

            [transport]
            probe_timeout_seconds = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://admin.example.com");
        assert_eq!(config.api.timeout_seconds, 30);
        assert_eq!(config.transport.probe_timeout_seconds, 3);
        assert_eq!(config.transport.handshake_timeout_seconds, 10);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = DeskConfig::default();
        config.api.base_url = "https://mcp.internal".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = DeskConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api.base_url, "https://mcp.internal");
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/tmp/session"), PathBuf::from("/tmp/session"));
    }
}
