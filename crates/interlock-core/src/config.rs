//! Process configuration, loaded once at startup and passed down explicitly.
//!
//! Sources, later ones win:
//! 1. built-in defaults
//! 2. optional TOML file
//! 3. `OCTOPUS_*` environment variables (`OCTOPUS_SERVER_URL`,
//!    `OCTOPUS_API_KEY`, `OCTOPUS_REQUEST_TIMEOUT_SECS`,
//!    `OCTOPUS_CONSUMER__WORKERS`, ...)

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::channel::RedeliveryPolicy;
use crate::domain::InterlockError;

const ENV_PREFIX: &str = "OCTOPUS";

/// Platform API key. Never printed.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    /// Concurrent consumer workers.
    pub workers: usize,
    pub redelivery: RedeliveryPolicy,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            redelivery: RedeliveryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterlockConfig {
    pub server_url: String,
    pub api_key: ApiKey,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Page size used when listing platform events.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub consumer: ConsumerSettings,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_page_size() -> u32 {
    30
}

impl InterlockConfig {
    pub fn new(server_url: impl Into<String>, api_key: ApiKey) -> Self {
        Self {
            server_url: server_url.into(),
            api_key,
            request_timeout_secs: default_request_timeout_secs(),
            page_size: default_page_size(),
            consumer: ConsumerSettings::default(),
        }
    }

    /// Load from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, InterlockError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, InterlockError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let cfg: Self = builder.add_source(env).build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), InterlockError> {
        let url = Url::parse(&self.server_url).map_err(|e| {
            InterlockError::Config(format!("server_url {:?} is not a URL: {e}", self.server_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(InterlockError::Config(format!(
                "server_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.api_key.expose().trim().is_empty() {
            return Err(InterlockError::Config("api_key is empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(InterlockError::Config("page_size must be positive".to_string()));
        }
        if self.consumer.workers == 0 {
            return Err(InterlockError::Config(
                "consumer.workers must be at least 1".to_string(),
            ));
        }
        self.consumer
            .redelivery
            .validate()
            .map_err(|e| InterlockError::Config(format!("consumer.redelivery: {e}")))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Server URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.server_url.trim_end_matches('/')
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn loads_from_environment_variables() {
        let cfg = InterlockConfig::load_with_env(
            None,
            env(&[
                ("OCTOPUS_SERVER_URL", "https://octopus.example/"),
                ("OCTOPUS_API_KEY", "API-SECRET"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.base_url(), "https://octopus.example");
        assert_eq!(cfg.api_key.expose(), "API-SECRET");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.consumer.workers, 1);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
server_url = "https://file.example"
api_key = "API-FILE"
request_timeout_secs = 5

[consumer]
workers = 4

[consumer.redelivery]
max_receive_count = 7
"#
        )
        .unwrap();

        let cfg = InterlockConfig::load_with_env(
            Some(file.path()),
            env(&[("OCTOPUS_API_KEY", "API-ENV")]),
        )
        .unwrap();

        assert_eq!(cfg.server_url, "https://file.example");
        assert_eq!(cfg.api_key.expose(), "API-ENV");
        assert_eq!(cfg.request_timeout_secs, 5);
        assert_eq!(cfg.consumer.workers, 4);
        assert_eq!(cfg.consumer.redelivery.max_receive_count, 7);
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = InterlockConfig::load_with_env(
            None,
            env(&[("OCTOPUS_SERVER_URL", "https://octopus.example")]),
        )
        .unwrap_err();
        assert!(matches!(err, InterlockError::Config(_)));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let cfg = InterlockConfig::new("ftp://octopus.example", ApiKey::new("API-1"));
        assert!(matches!(cfg.validate(), Err(InterlockError::Config(_))));
    }

    #[test]
    fn shrinking_redelivery_multiplier_is_rejected() {
        let err = InterlockConfig::load_with_env(
            None,
            env(&[
                ("OCTOPUS_SERVER_URL", "https://octopus.example"),
                ("OCTOPUS_API_KEY", "API-1"),
                ("OCTOPUS_CONSUMER__REDELIVERY__MULTIPLIER", "-2.0"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, InterlockError::Config(ref m) if m.contains("multiplier")));

        let mut cfg = InterlockConfig::new("https://octopus.example", ApiKey::new("API-1"));
        cfg.consumer.redelivery.multiplier = 0.5;
        assert!(matches!(cfg.validate(), Err(InterlockError::Config(_))));
    }

    #[test]
    fn api_key_is_redacted_in_debug_output() {
        let cfg = InterlockConfig::new("https://octopus.example", ApiKey::new("API-SECRET"));
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("API-SECRET"));
        assert!(shown.contains("***"));
    }
}
