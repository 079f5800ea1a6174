// Transforms one raw scan artifact into its build-optimized form: direct
// dependencies keyed by entry point, plus the PUBLIC-method side table used
// for transitive resolution from other services.

use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use tracing::debug;

use super::ProcessedScan;
use crate::config::QueueConfig;
use crate::errors::ScanProcessError;
use crate::models::{
    AccessModifier, InvocationType, MethodReference, RawScan, ServiceCall, TopicResolution,
    UNKNOWN_TOPIC,
};

/// Result of processing one raw scan: the processed form plus warnings for
/// tolerated-but-degenerate records (e.g. invocations with no call chain).
#[derive(Debug)]
pub struct ProcessorOutput {
    pub scan: ProcessedScan,
    pub warnings: Vec<String>,
}

/// Scan processor. The set of topic resolutions treated as "unresolved" is
/// configurable; by default every non-RESOLVED value maps to the
/// `<unknown-topic>` placeholder.
#[derive(Debug, Clone)]
pub struct ScanProcessor {
    unknown_resolutions: HashSet<TopicResolution>,
}

impl Default for ScanProcessor {
    fn default() -> Self {
        ScanProcessor {
            unknown_resolutions: [
                TopicResolution::UnknownConstant,
                TopicResolution::UnknownComplex,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl ScanProcessor {
    pub fn new() -> Self {
        ScanProcessor::default()
    }

    pub fn with_unknown_resolutions(
        unknown_resolutions: impl IntoIterator<Item = TopicResolution>,
    ) -> Self {
        ScanProcessor {
            unknown_resolutions: unknown_resolutions.into_iter().collect(),
        }
    }

    /// Processor honoring the configured unknown-resolution set.
    pub fn from_config(config: &QueueConfig) -> Self {
        ScanProcessor::with_unknown_resolutions(config.unknown_resolutions())
    }

    pub fn process(&self, raw: &RawScan) -> Result<ProcessorOutput, ScanProcessError> {
        if raw.artifact_id.trim().is_empty() {
            return Err(ScanProcessError::InvalidInput(
                "raw scan has no artifactId".into(),
            ));
        }

        let mut scan = ProcessedScan {
            service_id: raw.artifact_id.clone(),
            group_id: raw.group_id.clone(),
            version: raw.version.clone(),
            ui_service: raw.ui_service,
            service_dependencies: raw.service_dependencies.clone(),
            function_mappings: raw.function_mappings.clone(),
            ui_method_mappings: raw.ui_method_mappings.clone(),
            method_impl_mappings: raw.method_impl_mappings.clone(),
            entry_point_children: Default::default(),
            public_method_dependencies: Default::default(),
        };
        let mut warnings = Vec::new();

        // Reverse indices over the raw mappings. Entry points come from both
        // vocabularies; a service only populates one of them in practice.
        let impl_to_interface: HashMap<&str, &str> = raw
            .method_impl_mappings
            .iter()
            .map(|(iface, imp)| (imp.as_str(), iface.as_str()))
            .collect();
        let interface_to_entry: HashMap<&str, &str> = raw
            .function_mappings
            .iter()
            .chain(raw.ui_method_mappings.iter())
            .map(|(entry, iface)| (iface.as_str(), entry.as_str()))
            .collect();

        // Every entry point gets a slot even if nothing is ever attributed
        // to it; downstream walks rely on lookups never failing for an
        // exposed name.
        for entry in raw.function_mappings.keys().chain(raw.ui_method_mappings.keys()) {
            scan.entry_point_children
                .entry(entry.clone())
                .or_default();
        }

        for inv in &raw.function_invocations {
            if inv.call_chain.is_empty() {
                warnings.push(format!(
                    "function invocation of {} in {} has an empty call chain; skipped",
                    inv.function_id, raw.artifact_id
                ));
                continue;
            }
            let owners = owners_of(&inv.call_chain, &impl_to_interface, &interface_to_entry);
            match inv.invocation_type {
                InvocationType::Execute => {
                    for owner in &owners {
                        scan.entry_point_children
                            .entry(owner.clone())
                            .or_default()
                            .add_function(inv.function_id.clone());
                    }
                    for sig in public_signatures(&inv.call_chain) {
                        scan.public_method_dependencies
                            .entry(sig.to_string())
                            .or_default()
                            .add_function(inv.function_id.clone());
                    }
                }
                InvocationType::ExecuteAsync => {
                    for owner in &owners {
                        scan.entry_point_children
                            .entry(owner.clone())
                            .or_default()
                            .add_async_function(inv.function_id.clone());
                    }
                    for sig in public_signatures(&inv.call_chain) {
                        scan.public_method_dependencies
                            .entry(sig.to_string())
                            .or_default()
                            .add_async_function(inv.function_id.clone());
                    }
                }
            }
        }

        for inv in &raw.service_invocations {
            if inv.call_chain.is_empty() {
                warnings.push(format!(
                    "service invocation of {}#{} in {} has an empty call chain; skipped",
                    inv.target_service_id, inv.target_interface_method, raw.artifact_id
                ));
                continue;
            }
            let call = ServiceCall::new(
                inv.target_service_id.clone(),
                inv.target_interface_method.clone(),
            );
            let owners = owners_of(&inv.call_chain, &impl_to_interface, &interface_to_entry);
            for owner in &owners {
                scan.entry_point_children
                    .entry(owner.clone())
                    .or_default()
                    .add_service_call(call.clone());
            }
            for sig in public_signatures(&inv.call_chain) {
                scan.public_method_dependencies
                    .entry(sig.to_string())
                    .or_default()
                    .add_service_call(call.clone());
            }
        }

        for inv in &raw.event_publisher_invocations {
            if inv.call_chain.is_empty() {
                warnings.push(format!(
                    "event publication in {} has an empty call chain; skipped",
                    raw.artifact_id
                ));
                continue;
            }
            let topic = if self.unknown_resolutions.contains(&inv.resolution) {
                UNKNOWN_TOPIC.to_string()
            } else {
                inv.topic.clone().unwrap_or_else(|| UNKNOWN_TOPIC.to_string())
            };
            let owners = owners_of(&inv.call_chain, &impl_to_interface, &interface_to_entry);
            for owner in &owners {
                scan.entry_point_children
                    .entry(owner.clone())
                    .or_default()
                    .add_topic(topic.clone());
            }
            for sig in public_signatures(&inv.call_chain) {
                scan.public_method_dependencies
                    .entry(sig.to_string())
                    .or_default()
                    .add_topic(topic.clone());
            }
        }

        debug!(
            service = %scan.service_id,
            entry_points = scan.entry_point_children.len(),
            public_methods = scan.public_method_dependencies.len(),
            "processed scan"
        );

        Ok(ProcessorOutput { scan, warnings })
    }
}

/// The entry points whose implementations transitively enclose the
/// invocation: each chain element is mapped implementation -> interface ->
/// entry point, dropping elements where either lookup fails.
fn owners_of(
    chain: &[MethodReference],
    impl_to_interface: &HashMap<&str, &str>,
    interface_to_entry: &HashMap<&str, &str>,
) -> IndexSet<String> {
    chain
        .iter()
        .filter_map(|m| impl_to_interface.get(m.signature.as_str()))
        .filter_map(|iface| interface_to_entry.get(*iface))
        .map(|entry| entry.to_string())
        .collect()
}

/// Signatures of the PUBLIC elements of a call chain, in chain order.
fn public_signatures(chain: &[MethodReference]) -> impl Iterator<Item = &str> {
    chain
        .iter()
        .filter(|m| m.access_modifier == AccessModifier::Public)
        .map(|m| m.signature.as_str())
}
