// HTTP-backed queue resolver: per-name cache, bounded retries with
// exponential backoff, and the environment-prefix cleanup applied to every
// resolved name.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use super::{fallback_queue_name, QueueSource};
use crate::config::QueueConfig;

// Queue names provisioned through the dev gateway carry this prefix; it is
// stripped before the name is handed to downstream tooling.
const DEV_QUEUE_PREFIX: &str = "OCP.DEV.";

// Upper bound on the random jitter added to each backoff delay.
const JITTER_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Function,
    Topic,
}

impl TargetKind {
    fn response_key(self) -> &'static str {
        match self {
            TargetKind::Function => "async_url",
            TargetKind::Topic => "MQ_QUEUE",
        }
    }
}

#[derive(Debug)]
struct LookupFailure {
    retryable: bool,
    message: String,
}

impl LookupFailure {
    fn retryable(message: impl Into<String>) -> Self {
        LookupFailure {
            retryable: true,
            message: message.into(),
        }
    }

    fn fatal(message: impl Into<String>) -> Self {
        LookupFailure {
            retryable: false,
            message: message.into(),
        }
    }
}

/// Queue resolver speaking the queue-gateway HTTP protocol:
///
/// - functions: `POST {function_endpoint}/{lowercased name}`, queue name in
///   the `async_url` response key;
/// - topics: `GET {topic_endpoint}/{lowercased name}`, queue name in
///   `MQ_QUEUE`.
///
/// 429, 5xx and transport errors are retried with exponential backoff plus
/// jitter; anything else fails the lookup immediately. Exhausted or failed
/// lookups resolve to the `{name}_queue` fallback. Results (fallbacks
/// included) are cached per instance until `clear_cache`.
pub struct HttpQueueResolver {
    client: reqwest::Client,
    function_endpoint: Option<Url>,
    topic_endpoint: Option<Url>,
    max_attempts: u32,
    initial_backoff: Duration,
    cache: Mutex<HashMap<String, String>>,
}

impl HttpQueueResolver {
    pub fn new(config: &QueueConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("building queue resolver HTTP client")?;

        Ok(HttpQueueResolver {
            client,
            function_endpoint: parse_endpoint(config.function_endpoint.as_deref(), "function"),
            topic_endpoint: parse_endpoint(config.topic_endpoint.as_deref(), "topic"),
            max_attempts: config.attempts(),
            initial_backoff: config.initial_backoff(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    async fn resolve(&self, kind: TargetKind, name: &str) -> String {
        let key = name.to_lowercase();
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            return hit.clone();
        }

        let endpoint = match kind {
            TargetKind::Function => self.function_endpoint.as_ref(),
            TargetKind::Topic => self.topic_endpoint.as_ref(),
        };

        let resolved = match endpoint {
            Some(endpoint) => match self.lookup(kind, endpoint, &key).await {
                Ok(value) => {
                    let normalized = normalize_queue_name(&value);
                    if normalized.is_empty() {
                        // A prefix-only answer would break the non-empty
                        // queue name guarantee.
                        fallback_queue_name(name)
                    } else {
                        normalized
                    }
                }
                Err(failure) => {
                    debug!(target = %key, reason = %failure.message, "queue lookup failed; using fallback");
                    fallback_queue_name(name)
                }
            },
            None => fallback_queue_name(name),
        };

        self.cache.lock().unwrap().insert(key, resolved.clone());
        resolved
    }

    async fn lookup(
        &self,
        kind: TargetKind,
        endpoint: &Url,
        key: &str,
    ) -> Result<String, LookupFailure> {
        let mut attempt = 1;
        loop {
            match self.attempt(kind, endpoint, key).await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.retryable && attempt < self.max_attempts => {
                    let delay = backoff_delay(self.initial_backoff, attempt);
                    debug!(
                        target = %key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %failure.message,
                        "retrying queue lookup"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(failure) => return Err(failure),
            }
        }
    }

    async fn attempt(
        &self,
        kind: TargetKind,
        endpoint: &Url,
        key: &str,
    ) -> Result<String, LookupFailure> {
        let mut url = endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| LookupFailure::fatal("endpoint URL cannot take a path segment"))?
            .push(key);

        let request = match kind {
            TargetKind::Function => self.client.post(url),
            TargetKind::Topic => self.client.get(url),
        };

        let response = request.send().await.map_err(|err| {
            if err.is_builder() {
                LookupFailure::fatal(err.to_string())
            } else {
                // Connect failures and per-attempt timeouts are transient.
                LookupFailure::retryable(err.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|err| LookupFailure::fatal(format!("unparsable response body: {err}")))?;
            match body.get(kind.response_key()).and_then(|v| v.as_str()) {
                Some(value) if !value.trim().is_empty() => Ok(value.to_string()),
                Some(_) => Err(LookupFailure::fatal(format!(
                    "blank {} in response",
                    kind.response_key()
                ))),
                None => Err(LookupFailure::fatal(format!(
                    "response has no {} key",
                    kind.response_key()
                ))),
            }
        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(LookupFailure::retryable(format!("status {status}")))
        } else {
            Err(LookupFailure::fatal(format!("status {status}")))
        }
    }
}

#[async_trait]
impl QueueSource for HttpQueueResolver {
    async fn resolve_for_function(&self, name: &str) -> String {
        self.resolve(TargetKind::Function, name).await
    }

    async fn resolve_for_topic(&self, name: &str) -> String {
        self.resolve(TargetKind::Topic, name).await
    }

    fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

fn parse_endpoint(endpoint: Option<&str>, kind: &str) -> Option<Url> {
    let endpoint = endpoint?;
    match Url::parse(endpoint) {
        Ok(url) => Some(url),
        Err(err) => {
            // A malformed URI is a non-retryable lookup failure; treating
            // the endpoint as absent yields the same fallback behavior.
            warn!(%endpoint, %err, "malformed {kind} endpoint; lookups will use the fallback");
            None
        }
    }
}

/// Delay taken after failed attempt `attempt` (1-indexed):
/// `initial * 2^(attempt-1)` plus uniform jitter.
fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << (attempt - 1).min(16);
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..JITTER_MS));
    initial.saturating_mul(factor) + jitter
}

/// Strip the dev-gateway prefix (case-insensitive), then trim.
fn normalize_queue_name(value: &str) -> String {
    let stripped = match value.get(..DEV_QUEUE_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(DEV_QUEUE_PREFIX) => {
            &value[DEV_QUEUE_PREFIX.len()..]
        }
        _ => value,
    };
    stripped.trim().to_string()
}
