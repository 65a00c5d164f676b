//! Client configuration loading: optional JSON file plus environment overrides.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the client looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/client.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PLANNING_CLIENT_CONFIG_PATH";
/// Environment variable that overrides the REST base URL.
const API_URL_ENV: &str = "PLANNING_API_URL";
/// Environment variable that overrides the heartbeat period (milliseconds).
const HEARTBEAT_ENV: &str = "PLANNING_HEARTBEAT_MS";
/// Environment variable pointing at the persisted credentials file.
const CREDENTIALS_PATH_ENV: &str = "PLANNING_CREDENTIALS_PATH";

/// REST base URL used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Keep-alive period of the realtime channel.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared by the REST and realtime layers.
pub struct ClientConfig {
    api_base_url: String,
    heartbeat_interval: Duration,
    credentials_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Build a configuration pointing at `api_base_url` with default settings.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            credentials_path: None,
        }
    }

    /// Load the configuration from disk and the process environment, falling back to defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        Self::load_from(&path).with_overrides(|key| env::var(key).ok())
    }

    /// Load the configuration file at `path`, falling back to defaults when it is
    /// missing or malformed.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        api = %config.api_base_url,
                        "loaded client config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Apply overrides looked up through `lookup` (the process environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(HEARTBEAT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.heartbeat_interval = Duration::from_millis(ms),
                _ => warn!(value = %raw, "ignoring invalid heartbeat override"),
            }
        }
        if let Some(path) = lookup(CREDENTIALS_PATH_ENV).filter(|value| !value.is_empty()) {
            self.credentials_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Replace the REST base URL.
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// Replace the heartbeat period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Persist credentials to `path`, replacing any configured location.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// REST base URL without a trailing slash.
    pub fn api_base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn credentials_path(&self) -> Option<&Path> {
        self.credentials_path.as_deref()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    api_base_url: Option<String>,
    heartbeat_ms: Option<u64>,
    credentials_path: Option<PathBuf>,
}

impl From<RawConfig> for ClientConfig {
    fn from(value: RawConfig) -> Self {
        let mut config = Self::default();
        if let Some(url) = value.api_base_url {
            config.api_base_url = url;
        }
        if let Some(ms) = value.heartbeat_ms.filter(|ms| *ms > 0) {
            config.heartbeat_interval = Duration::from_millis(ms);
        }
        config.credentials_path = value.credentials_path;
        config
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load_from(&dir.path().join("absent.json"));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(
            &path,
            r#"{"api_base_url":"https://agile.example.com/api/","heartbeat_ms":1500}"#,
        )
        .unwrap();

        let config = ClientConfig::load_from(&path);
        assert_eq!(config.api_base_url(), "https://agile.example.com/api");
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(1500));
        assert!(config.credentials_path().is_none());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(ClientConfig::load_from(&path), ClientConfig::default());
    }

    #[test]
    fn overrides_take_precedence_and_bad_values_are_ignored() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (API_URL_ENV, "http://10.0.0.5:9000"),
            (HEARTBEAT_ENV, "soon"),
            (CREDENTIALS_PATH_ENV, "/tmp/creds.json"),
        ]);
        let config = ClientConfig::default()
            .with_overrides(|key| vars.get(key).map(|value| value.to_string()));

        assert_eq!(config.api_base_url(), "http://10.0.0.5:9000");
        assert_eq!(config.heartbeat_interval(), DEFAULT_HEARTBEAT_INTERVAL);
        assert_eq!(
            config.credentials_path(),
            Some(Path::new("/tmp/creds.json"))
        );
    }

    #[test]
    fn builders_replace_loaded_values() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(CREDENTIALS_PATH_ENV, "/tmp/creds.json")]);
        let config = ClientConfig::default()
            .with_overrides(|key| vars.get(key).map(|value| value.to_string()))
            .with_api_base_url("https://agile.example.com/")
            .with_credentials_path("/home/alice/.planning/credentials.json");

        assert_eq!(config.api_base_url(), "https://agile.example.com");
        assert_eq!(
            config.credentials_path(),
            Some(Path::new("/home/alice/.planning/credentials.json"))
        );
    }
}
