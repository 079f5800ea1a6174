// Function pool: the flat side of a snapshot, keyed by function short name.

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A leaf dependency reference attached to a function pool entry.
///
/// Equality for duplicate suppression is semantic: variant plus the
/// identity field. Queue names are content, not identity, so an async ref
/// is a duplicate of another async ref with the same function name even if
/// their queue names differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildRef {
    /// Synchronous function reference.
    Function { name: String },
    /// Asynchronous function reference with its resolved queue.
    AsyncFunction { name: String, queue_name: String },
    /// Topic publication with its resolved queue.
    TopicPublish { topic: String, queue_name: String },
}

impl ChildRef {
    /// Semantic duplicate check: same variant and same identity field.
    pub fn same_target(&self, other: &ChildRef) -> bool {
        match (self, other) {
            (ChildRef::Function { name: a }, ChildRef::Function { name: b }) => a == b,
            (
                ChildRef::AsyncFunction { name: a, .. },
                ChildRef::AsyncFunction { name: b, .. },
            ) => a == b,
            (
                ChildRef::TopicPublish { topic: a, .. },
                ChildRef::TopicPublish { topic: b, .. },
            ) => a == b,
            _ => false,
        }
    }
}

// Wire shape is discriminated by the set of present keys, so the impl is
// written out instead of derived.
impl Serialize for ChildRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChildRef::Function { name } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("ref", name)?;
                map.end()
            }
            ChildRef::AsyncFunction { name, queue_name } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ref", name)?;
                map.serialize_entry("async", &true)?;
                map.serialize_entry("queueName", queue_name)?;
                map.end()
            }
            ChildRef::TopicPublish { topic, queue_name } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("topicName", topic)?;
                map.serialize_entry("topicPublish", &true)?;
                map.serialize_entry("queueName", queue_name)?;
                map.end()
            }
        }
    }
}

// The inverse direction discriminates on the same present-key rule:
// `topicName` marks a topic publish, `async` an async function, a bare
// `ref` a sync function.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ChildRefRepr {
    #[serde(default)]
    r#ref: Option<String>,
    #[serde(default)]
    r#async: Option<bool>,
    #[serde(default)]
    topic_name: Option<String>,
    // Accepted on input, implied by topicName.
    #[serde(default)]
    #[allow(dead_code)]
    topic_publish: Option<bool>,
    #[serde(default)]
    queue_name: Option<String>,
}

impl ChildRefRepr {
    fn into_child_ref(self) -> Result<ChildRef, String> {
        match (self.r#ref, self.topic_name) {
            (Some(name), None) => {
                if self.r#async.unwrap_or(false) {
                    let queue_name = self
                        .queue_name
                        .ok_or("async function ref is missing queueName")?;
                    Ok(ChildRef::AsyncFunction { name, queue_name })
                } else {
                    Ok(ChildRef::Function { name })
                }
            }
            (None, Some(topic)) => {
                let queue_name = self.queue_name.ok_or("topic ref is missing queueName")?;
                Ok(ChildRef::TopicPublish { topic, queue_name })
            }
            (Some(_), Some(_)) => Err("ref and topicName are mutually exclusive".into()),
            (None, None) => Err("child ref needs either ref or topicName".into()),
        }
    }
}

impl<'de> Deserialize<'de> for ChildRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ChildRefRepr::deserialize(deserializer)?
            .into_child_ref()
            .map_err(serde::de::Error::custom)
    }
}

/// Append `child` unless a semantically equal ref is already present.
/// Returns whether the child was added.
pub fn add_child_unique(children: &mut Vec<ChildRef>, child: ChildRef) -> bool {
    if children.iter().any(|c| c.same_target(&child)) {
        return false;
    }
    children.push(child);
    true
}

/// One entry in the function pool: the owning application name plus the
/// ordered, deduplicated leaf dependencies of that function.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionPoolEntry {
    pub app: String,
    #[serde(default)]
    pub children: Vec<ChildRef>,
}

impl FunctionPoolEntry {
    pub fn new(app: impl Into<String>) -> Self {
        FunctionPoolEntry {
            app: app.into(),
            children: Vec::new(),
        }
    }

    pub fn add_child(&mut self, child: ChildRef) -> bool {
        add_child_unique(&mut self.children, child)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, ChildRef::Function { name: n } if n == name))
    }

    pub fn has_async_function(&self, name: &str) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, ChildRef::AsyncFunction { name: n, .. } if n == name))
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.children
            .iter()
            .any(|c| matches!(c, ChildRef::TopicPublish { topic: t, .. } if t == topic))
    }
}

/// The flat pool: function short name -> pool entry, insertion-ordered.
pub type FunctionPool = IndexMap<String, FunctionPoolEntry>;
