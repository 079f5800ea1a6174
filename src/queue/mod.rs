//! Queue-name resolution: maps async-function and topic names to external
//! queue identifiers. Resolution is total — when no mapping can be found
//! the caller always receives the `{name}_queue` fallback, never an error.

mod resolver;
mod table;

pub use resolver::HttpQueueResolver;
pub use table::{QueueMapping, QueueTargetType, TableQueueResolver};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::QueueConfig;

/// Source of queue names. One instance serves one build; implementations
/// that cache do so per instance, so concurrent builds never share state.
#[async_trait]
pub trait QueueSource: Send + Sync {
    async fn resolve_for_function(&self, name: &str) -> String;

    async fn resolve_for_topic(&self, name: &str) -> String;

    /// Drop any per-build cached state. Called at the start of each build.
    fn clear_cache(&self) {}
}

/// The guaranteed fallback queue name.
pub fn fallback_queue_name(name: &str) -> String {
    format!("{name}_queue")
}

/// Resolver used when neither an endpoint nor a table is configured: every
/// lookup yields the fallback immediately.
#[derive(Debug, Default)]
pub struct FallbackQueueResolver;

#[async_trait]
impl QueueSource for FallbackQueueResolver {
    async fn resolve_for_function(&self, name: &str) -> String {
        fallback_queue_name(name)
    }

    async fn resolve_for_topic(&self, name: &str) -> String {
        fallback_queue_name(name)
    }
}

/// Pick the resolver backend for the given configuration: the persistent
/// table when `table_path` is set, the HTTP protocol when any endpoint is
/// configured, the fallback resolver otherwise.
pub fn resolver_from_config(config: &QueueConfig) -> Result<Box<dyn QueueSource>> {
    if let Some(path) = &config.table_path {
        return Ok(Box::new(TableQueueResolver::from_file(path)?));
    }
    if config.function_endpoint.is_some() || config.topic_endpoint.is_some() {
        return Ok(Box::new(HttpQueueResolver::new(config)?));
    }
    Ok(Box::new(FallbackQueueResolver))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_resolver_always_appends_queue_suffix() {
        let resolver = FallbackQueueResolver;
        assert_eq!(resolver.resolve_for_function("Reindex").await, "Reindex_queue");
        assert_eq!(resolver.resolve_for_topic("orders").await, "orders_queue");
    }

    #[test]
    fn backend_selection_prefers_table_over_endpoints() {
        let config = QueueConfig {
            function_endpoint: Some("http://queues.local/fn".into()),
            table_path: Some("missing/queue-map.json".into()),
            ..QueueConfig::default()
        };
        // The table wins, and a missing table file is a hard error rather
        // than a silent fallback to HTTP.
        assert!(resolver_from_config(&config).is_err());
    }
}
