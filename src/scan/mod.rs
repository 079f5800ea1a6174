//! Scan-side types and services: the processed form of a raw artifact, the
//! processor that produces it, and the stores the assembler reads from.

mod processor;
pub mod store;

pub use processor::{ProcessorOutput, ScanProcessor};
pub use store::{DirScanStore, InMemoryScanStore, ScanStore};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{Dependencies, ScanErrorType};

/// The build-optimized form of one service's scan. Produced once by the
/// processor and treated as immutable by every later stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedScan {
    pub service_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ui_service: bool,
    #[serde(default)]
    pub service_dependencies: Option<String>,
    // The three vocabularies, copied verbatim from the raw scan.
    #[serde(default)]
    pub function_mappings: IndexMap<String, String>,
    #[serde(default)]
    pub ui_method_mappings: IndexMap<String, String>,
    #[serde(default)]
    pub method_impl_mappings: IndexMap<String, String>,
    // entry-point short name -> its direct leaf dependencies
    #[serde(default)]
    pub entry_point_children: IndexMap<String, Dependencies>,
    // implementation method signature -> dependencies, PUBLIC methods only;
    // consulted when another service calls into this one
    #[serde(default)]
    pub public_method_dependencies: IndexMap<String, Dependencies>,
}

impl ProcessedScan {
    /// Declared dependencies parsed out of the raw metadata string:
    /// comma-split, trimmed, empties discarded.
    pub fn declared_dependencies(&self) -> Vec<String> {
        self.service_dependencies
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

/// A persisted record of a scan that failed for one pinned revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFailure {
    pub service_id: String,
    pub git_commit_hash: String,
    pub error_type: ScanErrorType,
    pub error_message: String,
}
