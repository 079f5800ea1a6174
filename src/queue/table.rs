// Table-backed queue resolver: the persistent queue-map alternative to the
// HTTP protocol. Same public contract and fallback rule, no retries.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{fallback_queue_name, QueueSource};

/// What a queue-map row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueTargetType {
    Function,
    Topic,
}

/// One row of the persistent queue map: a queue identifier bound to an
/// async-function or topic name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMapping {
    pub queue_name: String,
    pub target_type: QueueTargetType,
    pub target_name: String,
}

/// Resolver over a fixed queue-map table. Lookups are by lowercased target
/// name; the table itself is the per-build state, so there is no cache to
/// clear.
#[derive(Debug, Default)]
pub struct TableQueueResolver {
    functions: HashMap<String, String>,
    topics: HashMap<String, String>,
}

impl TableQueueResolver {
    pub fn from_mappings(mappings: impl IntoIterator<Item = QueueMapping>) -> Self {
        let mut resolver = TableQueueResolver::default();
        for mapping in mappings {
            let slot = match mapping.target_type {
                QueueTargetType::Function => &mut resolver.functions,
                QueueTargetType::Topic => &mut resolver.topics,
            };
            slot.insert(mapping.target_name.to_lowercase(), mapping.queue_name);
        }
        resolver
    }

    /// Load a JSON array of queue mappings.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading queue map {}", path.display()))?;
        let mappings: Vec<QueueMapping> = serde_json::from_str(&content)
            .with_context(|| format!("parsing queue map {}", path.display()))?;
        debug!(path = %path.display(), rows = mappings.len(), "loaded queue map");
        Ok(Self::from_mappings(mappings))
    }

    fn resolve(&self, table: &HashMap<String, String>, name: &str) -> String {
        match table.get(&name.to_lowercase()) {
            Some(queue) if !queue.trim().is_empty() => queue.trim().to_string(),
            _ => fallback_queue_name(name),
        }
    }
}

#[async_trait]
impl QueueSource for TableQueueResolver {
    async fn resolve_for_function(&self, name: &str) -> String {
        self.resolve(&self.functions, name)
    }

    async fn resolve_for_topic(&self, name: &str) -> String {
        self.resolve(&self.topics, name)
    }
}
