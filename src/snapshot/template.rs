// Application template: the hierarchical side of a snapshot.

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::pool::ChildRef;

/// One node of the application template tree.
///
/// The wire shape is discriminated by the set of present keys (leaves carry
/// no `type` key), so serialization is written out rather than derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateNode {
    /// Root node of the template.
    App {
        name: String,
        children: Vec<TemplateNode>,
    },
    /// Synchronous function reference leaf.
    Function { name: String },
    /// Asynchronous function reference leaf.
    AsyncFunction { name: String, queue_name: String },
    /// Topic publication leaf.
    TopicPublish { topic: String, queue_name: String },
    /// Container grouping one UI service's methods.
    UiServiceContainer {
        service_id: String,
        children: Vec<TemplateNode>,
    },
    /// One exposed UI method with its dependency children.
    UiServiceMethod {
        name: String,
        children: Vec<TemplateNode>,
    },
}

impl Serialize for TemplateNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TemplateNode::App { name, children } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("name", name)?;
                map.serialize_entry("type", "app")?;
                map.serialize_entry("children", children)?;
                map.end()
            }
            TemplateNode::Function { name } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("ref", name)?;
                map.end()
            }
            TemplateNode::AsyncFunction { name, queue_name } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ref", name)?;
                map.serialize_entry("async", &true)?;
                map.serialize_entry("queueName", queue_name)?;
                map.end()
            }
            TemplateNode::TopicPublish { topic, queue_name } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("topicName", topic)?;
                map.serialize_entry("topicPublish", &true)?;
                map.serialize_entry("queueName", queue_name)?;
                map.end()
            }
            TemplateNode::UiServiceContainer {
                service_id,
                children,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("name", service_id)?;
                map.serialize_entry("type", "ui-services")?;
                map.serialize_entry("children", children)?;
                map.end()
            }
            TemplateNode::UiServiceMethod { name, children } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("name", name)?;
                map.serialize_entry("type", "ui-service-method")?;
                map.serialize_entry("children", children)?;
                map.end()
            }
        }
    }
}

// The inverse direction: containers are discriminated by their `type` key,
// leaves by `topicName` / `async` / bare `ref`, mirroring the serializer.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplateNodeRepr {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    node_type: Option<String>,
    #[serde(default)]
    children: Option<Vec<TemplateNode>>,
    #[serde(default)]
    r#ref: Option<String>,
    #[serde(default)]
    r#async: Option<bool>,
    #[serde(default)]
    topic_name: Option<String>,
    #[serde(default)]
    queue_name: Option<String>,
}

impl TemplateNodeRepr {
    fn into_node(self) -> Result<TemplateNode, String> {
        if let Some(node_type) = self.node_type {
            let name = self.name.ok_or("container node is missing name")?;
            let children = self.children.unwrap_or_default();
            return match node_type.as_str() {
                "app" => Ok(TemplateNode::App { name, children }),
                "ui-services" => Ok(TemplateNode::UiServiceContainer {
                    service_id: name,
                    children,
                }),
                "ui-service-method" => Ok(TemplateNode::UiServiceMethod { name, children }),
                other => Err(format!("unknown template node type {other:?}")),
            };
        }
        if let Some(topic) = self.topic_name {
            let queue_name = self.queue_name.ok_or("topic node is missing queueName")?;
            return Ok(TemplateNode::TopicPublish { topic, queue_name });
        }
        let name = self.r#ref.ok_or("leaf node needs ref or topicName")?;
        if self.r#async.unwrap_or(false) {
            let queue_name = self.queue_name.ok_or("async node is missing queueName")?;
            Ok(TemplateNode::AsyncFunction { name, queue_name })
        } else {
            Ok(TemplateNode::Function { name })
        }
    }
}

impl<'de> Deserialize<'de> for TemplateNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        TemplateNodeRepr::deserialize(deserializer)?
            .into_node()
            .map_err(serde::de::Error::custom)
    }
}

// Pool leaves and template leaves share the same three shapes; UI methods
// translate accumulated pool refs into template children.
impl From<&ChildRef> for TemplateNode {
    fn from(child: &ChildRef) -> Self {
        match child {
            ChildRef::Function { name } => TemplateNode::Function { name: name.clone() },
            ChildRef::AsyncFunction { name, queue_name } => TemplateNode::AsyncFunction {
                name: name.clone(),
                queue_name: queue_name.clone(),
            },
            ChildRef::TopicPublish { topic, queue_name } => TemplateNode::TopicPublish {
                topic: topic.clone(),
                queue_name: queue_name.clone(),
            },
        }
    }
}
