//! Snapshot output model: the application template tree, the flat function
//! pool, and the failure metadata attached to a partial build.

mod pool;
mod template;

pub use pool::{add_child_unique, ChildRef, FunctionPool, FunctionPoolEntry};
pub use template::TemplateNode;

use serde::{Deserialize, Serialize};

use crate::models::ScanErrorType;

/// One service excluded from a build because the scanner recorded a failure
/// for its pinned revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedServiceInfo {
    pub service_id: String,
    pub git_commit_hash: String,
    pub error_type: ScanErrorType,
    pub error_message: String,
}

/// The composite result of one build: template + pool + failure metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub app_template: TemplateNode,
    pub function_pool: FunctionPool,
    pub is_complete: bool,
    #[serde(default)]
    pub failed_services: Vec<FailedServiceInfo>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
