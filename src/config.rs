//! Configuration file handling for signup-relay.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Signup relay configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "Config::default_listen_port")]
    pub listen_port: u16,
    /// Minimum seconds between two accepted submissions from this client.
    #[serde(default = "Config::default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Where the client pipeline persists its last-submission timestamp.
    #[serde(default = "Config::default_cooldown_state_path")]
    pub cooldown_state_path: PathBuf,
    /// Endpoint the `submit` mode delivers to.
    pub endpoint_url: Option<String>,
    /// Transport strategy for `submit` mode: `opaque` or `hidden`.
    #[serde(default = "Config::default_transport")]
    pub transport: String,
    #[serde(default = "Config::default_hidden_channel_timeout_seconds")]
    pub hidden_channel_timeout_seconds: u64,
    /// Mailing-list membership endpoint the proxy relay forwards to.
    #[serde(default = "Config::default_upstream_url")]
    pub upstream_url: String,
    /// Credential sent in the `Authorization` header to the upstream API.
    /// Absent means every proxied request is answered with 500.
    pub upstream_api_key: Option<String>,
    #[serde(default = "Config::default_upstream_timeout_seconds")]
    pub upstream_timeout_seconds: u64,
    /// JSON-lines file backing the store relay.
    #[serde(default = "Config::default_store_path")]
    pub store_path: PathBuf,
    /// Origins the store relay expects callers from. Logged, not enforced.
    #[serde(default, deserialize_with = "deserialize_sequence")]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigWrapper {
    // The whole actual config is under the `relay` section.
    pub relay: Config,
}

/// Custom deserializer to parse space-separated strings into [`Vec<String>`].
fn deserialize_sequence<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(match s {
        Some(v) => v
            .split(' ')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        None => Vec::new(),
    })
}

impl Config {
    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path)?;
        let wrapped_config: ConfigWrapper = serini::from_str(&content)?;
        Ok(wrapped_config.relay)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn hidden_channel_timeout(&self) -> Duration {
        Duration::from_secs(self.hidden_channel_timeout_seconds)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_seconds)
    }

    // Following are needed since serde does not support default literals.

    fn default_listen_addr() -> String {
        "127.0.0.1".to_string()
    }
    const fn default_listen_port() -> u16 {
        8080
    }
    const fn default_cooldown_seconds() -> u64 {
        30
    }
    fn default_cooldown_state_path() -> PathBuf {
        PathBuf::from(".signup-cooldown")
    }
    fn default_transport() -> String {
        "opaque".to_string()
    }
    const fn default_hidden_channel_timeout_seconds() -> u64 {
        10
    }
    fn default_upstream_url() -> String {
        "https://webapi.mymarketing.co.il/api/groups/350602/members".to_string()
    }
    const fn default_upstream_timeout_seconds() -> u64 {
        10
    }
    fn default_store_path() -> PathBuf {
        PathBuf::from("signups.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;

    #[test]
    fn test_defaults_apply() -> TestResult {
        let config: ConfigWrapper = serini::from_str("[relay]\n")?;
        let config = config.relay;
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.cooldown_seconds, 30);
        assert_eq!(config.transport, "opaque");
        assert_eq!(config.hidden_channel_timeout_seconds, 10);
        assert!(config.upstream_api_key.is_none());
        assert!(config.endpoint_url.is_none());
        assert!(config.allowed_origins.is_empty());
        Ok(())
    }

    #[test]
    fn test_origins_split_on_spaces() -> TestResult {
        let raw = "[relay]\nallowed_origins = https://example.com  http://localhost:3000 \n";
        let config: ConfigWrapper = serini::from_str(raw)?;
        assert_eq!(
            config.relay.allowed_origins,
            vec![
                "https://example.com".to_string(),
                "http://localhost:3000".to_string()
            ]
        );
        Ok(())
    }

    #[test]
    fn test_explicit_values_override_defaults() -> TestResult {
        let raw = "[relay]\nlisten_port = 9000\ncooldown_seconds = 5\nupstream_api_key = secret\n";
        let config: ConfigWrapper = serini::from_str(raw)?;
        let config = config.relay;
        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.cooldown(), Duration::from_secs(5));
        assert_eq!(config.upstream_api_key.as_deref(), Some("secret"));
        Ok(())
    }
}
