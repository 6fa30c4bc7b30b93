//! TOML configuration for the `olympus` client.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000"
//! stream_path = "/api/query/stream"
//! token_transport = "query"   # query | header
//! use_sse_token = false
//! connect_timeout_secs = 10
//! request_timeout_secs = 30
//!
//! [state]
//! dir = "/home/me/.config/olympus"
//!
//! [logging]
//! level = "warn"
//! format = "compact"          # compact | pretty | json
//! ```
//!
//! Every section is optional. `OLYMPUS_API_URL` overrides `api.base_url`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use olympus_core::endpoint::DEFAULT_STREAM_PATH;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the access token travels with the stream request.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenTransport {
    /// `?token=<t>` on the stream URL (EventSource-compatible).
    #[default]
    Query,
    /// `Authorization: Bearer <t>` header.
    Header,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default)]
    pub token_transport: TokenTransport,
    /// Exchange the access token for a short-lived SSE token before streaming.
    #[serde(default)]
    pub use_sse_token: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Applies to request/response API calls only; streams have no timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            token_transport: TokenTransport::Query,
            use_sse_token: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_stream_path() -> String {
    DEFAULT_STREAM_PATH.to_string()
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StateConfig {
    /// Directory holding `session.json` and `preferences.json`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StateConfig {
    /// The configured directory, or `<config dir>/olympus`.
    pub fn resolve_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("olympus"),
        }
    }

    pub fn session_path(&self) -> PathBuf {
        self.resolve_dir().join("session.json")
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.resolve_dir().join("preferences.json")
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Compact,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise fall back to [`Config::minimal`].
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    let mut config = Config::minimal();
    apply_env_overrides(&mut config);
    validate(&config)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(url) = std::env::var("OLYMPUS_API_URL") {
        if !url.trim().is_empty() {
            config.api.base_url = url.trim().to_string();
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    let base = url::Url::parse(&config.api.base_url)
        .with_context(|| format!("api.base_url is not a valid URL: '{}'", config.api.base_url))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        bail!("api.base_url must use http or https, got '{}'", base.scheme());
    }

    if !config.api.stream_path.starts_with('/') {
        bail!("api.stream_path must start with '/'");
    }

    if config.api.connect_timeout_secs == 0 {
        bail!("api.connect_timeout_secs must be > 0");
    }
    if config.api.request_timeout_secs == 0 {
        bail!("api.request_timeout_secs must be > 0");
    }

    match config.logging.level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" | "off" => {}
        other => bail!(
            "Unknown logging.level: '{}'. Must be trace, debug, info, warn, error, or off.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.api.stream_path, "/api/query/stream");
        assert_eq!(config.api.token_transport, TokenTransport::Query);
        assert!(!config.api.use_sse_token);
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
[api]
base_url = "https://olympus.example.com"
token_transport = "header"
use_sse_token = true
connect_timeout_secs = 3

[state]
dir = "/tmp/olympus-state"

[logging]
level = "debug"
format = "json"
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.api.token_transport, TokenTransport::Header);
        assert!(config.api.use_sse_token);
        assert_eq!(config.api.connect_timeout_secs, 3);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(
            config.state.session_path(),
            PathBuf::from("/tmp/olympus-state/session.json")
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let file = write_config("[api]\nbase_url = \"ftp://files.example.com\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_rejects_relative_stream_path() {
        let file = write_config("[api]\nstream_path = \"api/query/stream\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_transport() {
        let file = write_config("[api]\ntoken_transport = \"cookie\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let file = write_config("[api]\nrequest_timeout_secs = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("request_timeout_secs"));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let file = write_config("[logging]\nlevel = \"chatty\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_minimal(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.api.connect_timeout_secs, 10);
    }
}
