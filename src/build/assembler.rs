// Snapshot assembly: the one-shot driver that loads the requested scans,
// orders them, walks every entry point, and emits the composite snapshot.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, info};

use super::order::order_services;
use super::transitive::TransitiveIndex;
use crate::errors::BuildError;
use crate::models::BuildRequest;
use crate::queue::QueueSource;
use crate::scan::{ProcessedScan, ScanStore};
use crate::snapshot::{
    ChildRef, FailedServiceInfo, FunctionPool, FunctionPoolEntry, Snapshot, TemplateNode,
};

/// Assembles snapshots from a scan store and a queue-name source. One
/// assembler instance serves one call site; each `build` call owns its own
/// transitive index and starts from a cleared queue cache, so concurrent
/// builds on separate instances share nothing mutable.
pub struct SnapshotAssembler<'a> {
    store: &'a dyn ScanStore,
    queues: &'a dyn QueueSource,
}

impl<'a> SnapshotAssembler<'a> {
    pub fn new(store: &'a dyn ScanStore, queues: &'a dyn QueueSource) -> Self {
        SnapshotAssembler { store, queues }
    }

    /// Assemble the snapshot for one request.
    ///
    /// Fatal conditions: an invalid request, a non-failed service with no
    /// processed scan, or a declared-dependency cycle within the build
    /// set. Everything else surfaces on the snapshot: failed services are
    /// excluded and reported, unresolvable queue names fall back, and
    /// dangling transitive targets contribute nothing.
    pub async fn build(&self, request: &BuildRequest) -> Result<Snapshot, BuildError> {
        request.validate()?;
        self.queues.clear_cache();

        // Failure filtering happens before ordering, so failed services
        // never constrain the order.
        let mut failed_services = Vec::new();
        let mut warnings = Vec::new();
        let mut remaining = Vec::new();
        for pin in &request.services {
            match self.store.failure(&pin.service_id, &pin.git_commit_hash) {
                Some(failure) => {
                    warnings.push(format!(
                        "service {} at {} excluded from the build: {}: {}",
                        failure.service_id,
                        failure.git_commit_hash,
                        failure.error_type,
                        failure.error_message
                    ));
                    failed_services.push(FailedServiceInfo {
                        service_id: failure.service_id,
                        git_commit_hash: failure.git_commit_hash,
                        error_type: failure.error_type,
                        error_message: failure.error_message,
                    });
                }
                None => remaining.push(pin),
            }
        }

        let mut scans: IndexMap<String, ProcessedScan> = IndexMap::new();
        for pin in remaining {
            match self.store.processed(&pin.service_id, &pin.git_commit_hash) {
                Some(scan) => {
                    scans.insert(scan.service_id.clone(), scan);
                }
                None => {
                    return Err(BuildError::MissingScan {
                        service_id: pin.service_id.clone(),
                        commit_hash: pin.git_commit_hash.clone(),
                    });
                }
            }
        }

        let order = order_services(&scans)?;
        debug!(?order, app = %request.app_name, "processing services in dependency order");
        let index = TransitiveIndex::build(&scans);

        let mut pool = FunctionPool::new();
        let mut root_children: Vec<TemplateNode> = Vec::new();
        // Function names already added as refs under the root, compared
        // case-insensitively.
        let mut added_refs: HashSet<String> = HashSet::new();

        for service_id in &order {
            let scan = &scans[service_id];
            if scan.ui_service {
                let container = self.walk_ui_service(scan, &index).await;
                root_children.push(container);
            } else {
                self.walk_regular_service(
                    scan,
                    &index,
                    &request.app_name,
                    &mut pool,
                    &mut root_children,
                    &mut added_refs,
                )
                .await;
            }
        }

        info!(
            app = %request.app_name,
            services = order.len(),
            failed = failed_services.len(),
            pooled_functions = pool.len(),
            "assembled snapshot"
        );

        let is_complete = failed_services.is_empty();
        Ok(Snapshot {
            app_template: TemplateNode::App {
                name: request.app_name.clone(),
                children: root_children,
            },
            function_pool: pool,
            is_complete,
            failed_services,
            warnings,
        })
    }

    /// Walk one regular service: every exposed function gets (or extends)
    /// its pool entry and one case-insensitively deduplicated ref under
    /// the application root.
    async fn walk_regular_service(
        &self,
        scan: &ProcessedScan,
        index: &TransitiveIndex,
        app_name: &str,
        pool: &mut FunctionPool,
        root_children: &mut Vec<TemplateNode>,
        added_refs: &mut HashSet<String>,
    ) {
        for function_name in scan.function_mappings.keys() {
            let entry = pool
                .entry(function_name.clone())
                .or_insert_with(|| FunctionPoolEntry::new(app_name));

            if let Some(deps) = scan.entry_point_children.get(function_name) {
                for name in &deps.functions {
                    entry.add_child(ChildRef::Function { name: name.clone() });
                }
                for name in &deps.async_functions {
                    if !entry.has_async_function(name) {
                        let queue_name = self.queues.resolve_for_function(name).await;
                        entry.add_child(ChildRef::AsyncFunction {
                            name: name.clone(),
                            queue_name,
                        });
                    }
                }
                for topic in &deps.topics {
                    if !entry.has_topic(topic) {
                        let queue_name = self.queues.resolve_for_topic(topic).await;
                        entry.add_child(ChildRef::TopicPublish {
                            topic: topic.clone(),
                            queue_name,
                        });
                    }
                }
                // Direct dependencies precede whatever the service calls
                // pull in transitively.
                for call in &deps.service_calls {
                    index.expand(call, &mut entry.children, self.queues).await;
                }
            }

            if added_refs.insert(function_name.to_lowercase()) {
                root_children.push(TemplateNode::Function {
                    name: function_name.clone(),
                });
            }
        }
    }

    /// Walk one UI service into its template container. Unlike regular
    /// services, a UI method's transitive leaves are translated into
    /// template children on the method itself rather than pooled.
    async fn walk_ui_service(&self, scan: &ProcessedScan, index: &TransitiveIndex) -> TemplateNode {
        let mut methods = Vec::new();

        for method_name in scan.ui_method_mappings.keys() {
            let mut children: Vec<TemplateNode> = Vec::new();

            if let Some(deps) = scan.entry_point_children.get(method_name) {
                for name in &deps.functions {
                    children.push(TemplateNode::Function { name: name.clone() });
                }
                for name in &deps.async_functions {
                    let queue_name = self.queues.resolve_for_function(name).await;
                    children.push(TemplateNode::AsyncFunction {
                        name: name.clone(),
                        queue_name,
                    });
                }
                for topic in &deps.topics {
                    let queue_name = self.queues.resolve_for_topic(topic).await;
                    children.push(TemplateNode::TopicPublish {
                        topic: topic.clone(),
                        queue_name,
                    });
                }
                if !deps.service_calls.is_empty() {
                    let mut sink: Vec<ChildRef> = Vec::new();
                    for call in &deps.service_calls {
                        index.expand(call, &mut sink, self.queues).await;
                    }
                    children.extend(sink.iter().map(TemplateNode::from));
                }
            }

            methods.push(TemplateNode::UiServiceMethod {
                name: method_name.clone(),
                children,
            });
        }

        TemplateNode::UiServiceContainer {
            service_id: scan.service_id.clone(),
            children: methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServicePin;
    use crate::queue::FallbackQueueResolver;
    use crate::scan::InMemoryScanStore;

    #[tokio::test]
    async fn invalid_request_fails_before_touching_the_store() {
        let store = InMemoryScanStore::new();
        let assembler = SnapshotAssembler::new(&store, &FallbackQueueResolver);
        let request = BuildRequest::new("", vec![ServicePin::new("svc", "c1")]);
        assert!(matches!(
            assembler.build(&request).await,
            Err(BuildError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn missing_scan_is_fatal() {
        let store = InMemoryScanStore::new();
        let assembler = SnapshotAssembler::new(&store, &FallbackQueueResolver);
        let request = BuildRequest::new("app", vec![ServicePin::new("ghost", "c1")]);
        assert!(matches!(
            assembler.build(&request).await,
            Err(BuildError::MissingScan { service_id, .. }) if service_id == "ghost"
        ));
    }
}
