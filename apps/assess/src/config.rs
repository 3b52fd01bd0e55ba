use std::env;
use std::path::PathBuf;
use std::time::Duration;
#[cfg(test)]
use std::sync::Mutex;

use thiserror::Error;
use url::Url;

use crate::session::SessionOptions;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const STREAM_PATH_TEMPLATE: &str = "/ws/assess/{job_id}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported scheme {0:?}; expected http(s) or ws(s)")]
    UnsupportedScheme(String),
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the assessment API (job creation).
    pub api_url: String,
    /// Base URL of the streaming endpoint; derived from `api_url` when unset.
    pub stream_url: Option<String>,
    pub auto_reconnect: bool,
    pub reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
    pub keepalive_ms: u64,
    pub handshake_timeout_ms: u64,
    /// Run store file; the platform data dir is used when unset.
    pub store_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_url = env::var("ASSESS_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.api_url);
        let stream_url = env::var("ASSESS_WS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let auto_reconnect = env::var("ASSESS_AUTO_RECONNECT")
            .map(|value| !matches!(value.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
            .unwrap_or(defaults.auto_reconnect);

        Self {
            api_url,
            stream_url,
            auto_reconnect,
            reconnect_attempts: env_parse("ASSESS_RECONNECT_ATTEMPTS")
                .unwrap_or(defaults.reconnect_attempts),
            reconnect_interval_ms: env_parse("ASSESS_RECONNECT_INTERVAL_MS")
                .unwrap_or(defaults.reconnect_interval_ms),
            keepalive_ms: env_parse("ASSESS_KEEPALIVE_MS").unwrap_or(defaults.keepalive_ms),
            handshake_timeout_ms: env_parse("ASSESS_HANDSHAKE_TIMEOUT_MS")
                .unwrap_or(defaults.handshake_timeout_ms),
            store_path: env::var_os("ASSESS_STORE_PATH").map(PathBuf::from),
        }
    }

    /// Streaming base with `http` swapped for `ws` (`https` becomes `wss`).
    pub fn stream_base(&self) -> Result<String, ConfigError> {
        let raw = self.stream_url.as_deref().unwrap_or(&self.api_url);
        let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        };
        let rest = &raw[url.scheme().len()..];
        Ok(format!("{scheme}{}", rest.trim_end_matches('/')))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_url).map_err(|source| ConfigError::InvalidUrl {
            url: self.api_url.clone(),
            source,
        })?;
        self.stream_base().map(|_| ())
    }

    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        Ok(SessionOptions {
            stream_base: self.stream_base()?,
            path_template: STREAM_PATH_TEMPLATE.to_string(),
            auto_reconnect: self.auto_reconnect,
            reconnect_attempts: self.reconnect_attempts,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            keepalive_interval: Duration::from_millis(self.keepalive_ms),
            clear_on_new_job: true,
        })
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            stream_url: None,
            auto_reconnect: true,
            reconnect_attempts: 10,
            reconnect_interval_ms: 1_500,
            keepalive_ms: 20_000,
            handshake_timeout_ms: 10_000,
            store_path: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    // Mutex to ensure environment variable tests don't run in parallel
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    const VARS: &[&str] = &[
        "ASSESS_API_URL",
        "ASSESS_WS_URL",
        "ASSESS_AUTO_RECONNECT",
        "ASSESS_RECONNECT_ATTEMPTS",
        "ASSESS_RECONNECT_INTERVAL_MS",
        "ASSESS_KEEPALIVE_MS",
        "ASSESS_HANDSHAKE_TIMEOUT_MS",
        "ASSESS_STORE_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, "http://127.0.0.1:8000");
        assert_eq!(config.reconnect_attempts, 10);
        assert_eq!(config.reconnect_interval_ms, 1_500);
        assert_eq!(config.keepalive_ms, 20_000);
        assert!(config.auto_reconnect);
    }

    #[test]
    fn test_config_from_env_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.stream_url.is_none());
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_config_from_env_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("ASSESS_API_URL", "https://grader.example.com");
            env::set_var("ASSESS_RECONNECT_ATTEMPTS", "3");
            env::set_var("ASSESS_AUTO_RECONNECT", "off");
            env::set_var("ASSESS_KEEPALIVE_MS", "not-a-number");
        }
        let config = Config::from_env();
        clear_env();

        assert_eq!(config.api_url, "https://grader.example.com");
        assert_eq!(config.reconnect_attempts, 3);
        assert!(!config.auto_reconnect);
        assert_eq!(config.keepalive_ms, 20_000);
    }

    #[test]
    fn derives_stream_base_from_api_url() {
        let mut config = Config {
            api_url: "https://grader.example.com/".into(),
            ..Config::default()
        };
        assert_eq!(config.stream_base().unwrap(), "wss://grader.example.com");

        config.api_url = "http://127.0.0.1:8000".into();
        assert_eq!(config.stream_base().unwrap(), "ws://127.0.0.1:8000");

        config.stream_url = Some("ws://stream.internal:9000".into());
        assert_eq!(config.stream_base().unwrap(), "ws://stream.internal:9000");

        let options = config.session_options().unwrap();
        assert_eq!(
            options.stream_url("abc-123"),
            "ws://stream.internal:9000/ws/assess/abc-123"
        );
    }

    #[test]
    fn rejects_bad_urls() {
        let config = Config {
            api_url: "ftp://grader.example.com".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.stream_base(),
            Err(ConfigError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));

        let config = Config {
            api_url: "not a url".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
