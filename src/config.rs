use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::models::TopicResolution;

/// Process-wide configuration. All fields are optional so that a partial
/// file merges cleanly with environment overrides; defaults are applied by
/// the accessor methods.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DepsnapConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueConfig>,
}

impl DepsnapConfig {
    pub fn queue_config(&self) -> QueueConfig {
        self.queue.clone().unwrap_or_default()
    }
}

/// Queue-name resolution settings: endpoint URIs, retry policy, and the
/// optional persistent queue-map table that replaces the HTTP protocol.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_backoff_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_path: Option<PathBuf>,
    // Which scanner resolutions map to the unknown-topic placeholder.
    // Default: every non-RESOLVED value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_topic_resolutions: Option<Vec<TopicResolution>>,
}

impl QueueConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms.unwrap_or(2_000))
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(3).max(1)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.unwrap_or(200))
    }

    pub fn unknown_resolutions(&self) -> Vec<TopicResolution> {
        self.unknown_topic_resolutions.clone().unwrap_or_else(|| {
            vec![
                TopicResolution::UnknownConstant,
                TopicResolution::UnknownComplex,
            ]
        })
    }
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<DepsnapConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))
}

/// Load configuration the standard way: the `DEPSNAP_CONFIG_PATH` file (or
/// `depsnap.json` in the working directory) when present, then `DEPSNAP_*`
/// environment overrides on top. A broken config file is reported and
/// ignored rather than failing the process.
pub fn load_default() -> DepsnapConfig {
    let path = env::var("DEPSNAP_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("depsnap.json"));

    let mut config = if path.exists() {
        match load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "ignoring unreadable config file");
                DepsnapConfig::default()
            }
        }
    } else {
        DepsnapConfig::default()
    };

    apply_env_overrides(&mut config);
    config
}

/// The process-wide configuration, read once. There is no runtime
/// reconfiguration; resolvers capture their settings at construction.
pub fn global() -> &'static DepsnapConfig {
    static CONFIG: OnceCell<DepsnapConfig> = OnceCell::new();
    CONFIG.get_or_init(load_default)
}

fn apply_env_overrides(config: &mut DepsnapConfig) {
    let queue = config.queue.get_or_insert_with(QueueConfig::default);

    if let Ok(value) = env::var("DEPSNAP_FUNCTION_ENDPOINT") {
        queue.function_endpoint = Some(value);
    }
    if let Ok(value) = env::var("DEPSNAP_TOPIC_ENDPOINT") {
        queue.topic_endpoint = Some(value);
    }
    if let Ok(value) = env::var("DEPSNAP_TABLE_PATH") {
        queue.table_path = Some(PathBuf::from(value));
    }
    override_number(&mut queue.http_timeout_ms, "DEPSNAP_HTTP_TIMEOUT_MS");
    override_number(&mut queue.max_attempts, "DEPSNAP_MAX_ATTEMPTS");
    override_number(&mut queue.initial_backoff_ms, "DEPSNAP_INITIAL_BACKOFF_MS");
}

fn override_number<T: std::str::FromStr>(slot: &mut Option<T>, var: &str) {
    if let Ok(value) = env::var(var) {
        match value.parse() {
            Ok(parsed) => *slot = Some(parsed),
            Err(_) => warn!(%var, %value, "ignoring unparsable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_policy() {
        let queue = QueueConfig::default();
        assert_eq!(queue.http_timeout(), Duration::from_secs(2));
        assert_eq!(queue.attempts(), 3);
        assert_eq!(queue.initial_backoff(), Duration::from_millis(200));
        assert!(queue.function_endpoint.is_none());
        assert_eq!(
            queue.unknown_resolutions(),
            vec![
                TopicResolution::UnknownConstant,
                TopicResolution::UnknownComplex,
            ]
        );
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let queue = QueueConfig {
            max_attempts: Some(0),
            ..QueueConfig::default()
        };
        assert_eq!(queue.attempts(), 1);
    }

    #[test]
    fn partial_file_parses_with_remaining_defaults() {
        let config: DepsnapConfig = serde_json::from_str(
            r#"{"queue": {"function_endpoint": "http://queues.local/fn", "max_attempts": 5}}"#,
        )
        .unwrap();
        let queue = config.queue_config();
        assert_eq!(
            queue.function_endpoint.as_deref(),
            Some("http://queues.local/fn")
        );
        assert_eq!(queue.attempts(), 5);
        assert_eq!(queue.http_timeout(), Duration::from_secs(2));
    }
}
