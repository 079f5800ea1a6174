// Shared data model: raw scanner artifacts, the dependency value object,
// and the build request accepted by the snapshot assembler.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::errors::BuildError;

/// Placeholder used wherever a topic literal could not be resolved at scan
/// time. Downstream tooling recognizes this exact string.
pub const UNKNOWN_TOPIC: &str = "<unknown-topic>";

/// Access modifier of a method observed in a call chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessModifier {
    Public,
    Protected,
    Package,
    Private,
}

/// Outcome of the scanner's attempt to resolve a published topic literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicResolution {
    Resolved,
    UnknownConstant,
    UnknownComplex,
}

impl Default for TopicResolution {
    fn default() -> Self {
        TopicResolution::UnknownComplex
    }
}

/// How a function was invoked at the observed call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvocationType {
    Execute,
    ExecuteAsync,
}

/// One element of a call chain: a method signature plus its access modifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodReference {
    pub signature: String,
    pub access_modifier: AccessModifier,
}

/// A function invocation observed by the scanner, attributed to the call
/// chain of methods enclosing the call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInvocation {
    pub function_id: String,
    pub invocation_type: InvocationType,
    #[serde(default)]
    pub call_chain: Vec<MethodReference>,
}

/// A cross-service call observed by the scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInvocation {
    pub target_service_id: String,
    pub target_interface_method: String,
    #[serde(default)]
    pub call_chain: Vec<MethodReference>,
}

/// An event publication observed by the scanner. The topic literal may not
/// have been resolvable statically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPublisherInvocation {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub resolution: TopicResolution,
    #[serde(default)]
    pub call_chain: Vec<MethodReference>,
}

/// One raw static-analysis artifact, as emitted by the scanner for a single
/// service at a pinned source revision. Immutable input to the processor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScan {
    pub artifact_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    // Regular services expose functions; UI services expose UI methods.
    #[serde(default)]
    pub ui_service: bool,
    // Comma-separated artifact ids this service declares as dependencies.
    #[serde(default)]
    pub service_dependencies: Option<String>,
    // function-short-name -> exposed interface method signature
    #[serde(default)]
    pub function_mappings: IndexMap<String, String>,
    // ui-method-short-name -> exposed interface method signature
    #[serde(default)]
    pub ui_method_mappings: IndexMap<String, String>,
    // interface method signature -> implementation method signature
    #[serde(default)]
    pub method_impl_mappings: IndexMap<String, String>,
    #[serde(default)]
    pub function_invocations: Vec<FunctionInvocation>,
    #[serde(default)]
    pub service_invocations: Vec<ServiceInvocation>,
    #[serde(default)]
    pub event_publisher_invocations: Vec<EventPublisherInvocation>,
}

/// A call into another service's exposed interface method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCall {
    pub service_id: String,
    pub interface_method: String,
}

impl ServiceCall {
    pub fn new(service_id: impl Into<String>, interface_method: impl Into<String>) -> Self {
        ServiceCall {
            service_id: service_id.into(),
            interface_method: interface_method.into(),
        }
    }
}

/// The direct leaf dependencies of one entry point (or one public method).
///
/// The three name collections are insertion-ordered sets; `service_calls`
/// keeps insertion order and is deduplicated on the (service, method) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    #[serde(default)]
    pub functions: IndexSet<String>,
    #[serde(default)]
    pub async_functions: IndexSet<String>,
    #[serde(default)]
    pub topics: IndexSet<String>,
    #[serde(default)]
    pub service_calls: Vec<ServiceCall>,
}

impl Dependencies {
    pub fn new() -> Self {
        Dependencies::default()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
            && self.async_functions.is_empty()
            && self.topics.is_empty()
            && self.service_calls.is_empty()
    }

    pub fn add_function(&mut self, name: impl Into<String>) {
        self.functions.insert(name.into());
    }

    pub fn add_async_function(&mut self, name: impl Into<String>) {
        self.async_functions.insert(name.into());
    }

    pub fn add_topic(&mut self, topic: impl Into<String>) {
        self.topics.insert(topic.into());
    }

    pub fn add_service_call(&mut self, call: ServiceCall) {
        if !self.service_calls.contains(&call) {
            self.service_calls.push(call);
        }
    }

    /// Union `other` into `self`: set-union on the name collections,
    /// dedup-append on service calls. Insertion order of `self` wins.
    pub fn merge(&mut self, other: &Dependencies) {
        for name in &other.functions {
            self.functions.insert(name.clone());
        }
        for name in &other.async_functions {
            self.async_functions.insert(name.clone());
        }
        for topic in &other.topics {
            self.topics.insert(topic.clone());
        }
        for call in &other.service_calls {
            self.add_service_call(call.clone());
        }
    }
}

/// One (service, commit) pin in a build request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePin {
    pub service_id: String,
    pub git_commit_hash: String,
}

impl ServicePin {
    pub fn new(service_id: impl Into<String>, git_commit_hash: impl Into<String>) -> Self {
        ServicePin {
            service_id: service_id.into(),
            git_commit_hash: git_commit_hash.into(),
        }
    }
}

/// A request to assemble a snapshot for a named application from a pinned
/// set of services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub app_name: String,
    pub services: Vec<ServicePin>,
}

impl BuildRequest {
    pub fn new(app_name: impl Into<String>, services: Vec<ServicePin>) -> Self {
        BuildRequest {
            app_name: app_name.into(),
            services,
        }
    }

    /// Precondition check for the assembler: non-empty app name, at least
    /// one service, every pin fully specified.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.app_name.trim().is_empty() {
            return Err(BuildError::InvalidInput("appName must not be empty".into()));
        }
        if self.services.is_empty() {
            return Err(BuildError::InvalidInput(
                "at least one service is required".into(),
            ));
        }
        for (i, pin) in self.services.iter().enumerate() {
            if pin.service_id.trim().is_empty() {
                return Err(BuildError::InvalidInput(format!(
                    "service at index {i} has an empty serviceId"
                )));
            }
            if pin.git_commit_hash.trim().is_empty() {
                return Err(BuildError::InvalidInput(format!(
                    "service {} has an empty gitCommitHash",
                    pin.service_id
                )));
            }
        }
        Ok(())
    }
}

/// Classification of a persisted scan failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanErrorType {
    ScanError,
    ParseError,
    CodeViolation,
    ProcessingError,
    Unknown,
}

impl ScanErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanErrorType::ScanError => "SCAN_ERROR",
            ScanErrorType::ParseError => "PARSE_ERROR",
            ScanErrorType::CodeViolation => "CODE_VIOLATION",
            ScanErrorType::ProcessingError => "PROCESSING_ERROR",
            ScanErrorType::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ScanErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
