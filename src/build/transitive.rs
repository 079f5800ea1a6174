// Transitive service-call resolution: expands a cross-service call into the
// leaf dependencies reachable through the callees' public methods.

use std::collections::{HashMap, HashSet};

use async_recursion::async_recursion;
use indexmap::IndexMap;
use tracing::debug;

use crate::models::{Dependencies, ServiceCall};
use crate::queue::QueueSource;
use crate::scan::ProcessedScan;
use crate::snapshot::{add_child_unique, ChildRef};

/// Lookup table for transitive expansion: service id -> interface method ->
/// the dependencies of that method's implementation. Built once per build
/// from the loaded scans and read-only afterwards.
#[derive(Debug, Default)]
pub struct TransitiveIndex {
    table: HashMap<String, IndexMap<String, Dependencies>>,
}

impl TransitiveIndex {
    pub fn build(scans: &IndexMap<String, ProcessedScan>) -> Self {
        let mut table: HashMap<String, IndexMap<String, Dependencies>> = HashMap::new();

        for scan in scans.values() {
            for (interface_method, impl_method) in &scan.method_impl_mappings {
                let Some(deps) = scan.public_method_dependencies.get(impl_method) else {
                    continue;
                };
                if deps.is_empty() {
                    continue;
                }
                table
                    .entry(scan.service_id.clone())
                    .or_default()
                    .insert(interface_method.clone(), deps.clone());
            }
        }

        TransitiveIndex { table }
    }

    pub fn lookup(&self, service_id: &str, interface_method: &str) -> Option<&Dependencies> {
        self.table.get(service_id)?.get(interface_method)
    }

    /// Expand one service call into `sink`, depth-first. Leaves are added
    /// in DFS order with semantic dedup against what the sink already
    /// holds; queue names are resolved as async/topic leaves are attached.
    /// Re-entering a (service, method) pair short-circuits, so mutually
    /// recursive services terminate. A target with no entry in the index
    /// contributes nothing — its scan may legitimately not be part of this
    /// build.
    pub async fn expand(
        &self,
        call: &ServiceCall,
        sink: &mut Vec<ChildRef>,
        queues: &dyn QueueSource,
    ) {
        let mut visited = HashSet::new();
        self.expand_inner(call, sink, queues, &mut visited).await;
    }

    #[async_recursion]
    async fn expand_inner(
        &self,
        call: &ServiceCall,
        sink: &mut Vec<ChildRef>,
        queues: &dyn QueueSource,
        visited: &mut HashSet<(String, String)>,
    ) {
        let key = (call.service_id.clone(), call.interface_method.clone());
        if !visited.insert(key) {
            return;
        }

        let Some(deps) = self.lookup(&call.service_id, &call.interface_method) else {
            debug!(
                service = %call.service_id,
                method = %call.interface_method,
                "dangling service call; target not in the build set"
            );
            return;
        };

        for name in &deps.functions {
            add_child_unique(sink, ChildRef::Function { name: name.clone() });
        }
        for name in &deps.async_functions {
            let already = sink
                .iter()
                .any(|c| matches!(c, ChildRef::AsyncFunction { name: n, .. } if n == name));
            if !already {
                let queue_name = queues.resolve_for_function(name).await;
                sink.push(ChildRef::AsyncFunction {
                    name: name.clone(),
                    queue_name,
                });
            }
        }
        for topic in &deps.topics {
            let already = sink
                .iter()
                .any(|c| matches!(c, ChildRef::TopicPublish { topic: t, .. } if t == topic));
            if !already {
                let queue_name = queues.resolve_for_topic(topic).await;
                sink.push(ChildRef::TopicPublish {
                    topic: topic.clone(),
                    queue_name,
                });
            }
        }
        for nested in &deps.service_calls {
            self.expand_inner(nested, sink, queues, visited).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FallbackQueueResolver;

    fn scan(service_id: &str) -> ProcessedScan {
        ProcessedScan {
            service_id: service_id.into(),
            group_id: None,
            version: None,
            ui_service: false,
            service_dependencies: None,
            function_mappings: Default::default(),
            ui_method_mappings: Default::default(),
            method_impl_mappings: Default::default(),
            entry_point_children: Default::default(),
            public_method_dependencies: Default::default(),
        }
    }

    fn build_set(scans: Vec<ProcessedScan>) -> IndexMap<String, ProcessedScan> {
        scans
            .into_iter()
            .map(|s| (s.service_id.clone(), s))
            .collect()
    }

    #[test]
    fn index_only_keeps_non_empty_public_methods() {
        let mut b = scan("b");
        b.method_impl_mappings
            .insert("IB.m()".into(), "BImpl.m()".into());
        b.method_impl_mappings
            .insert("IB.idle()".into(), "BImpl.idle()".into());
        let mut deps = Dependencies::new();
        deps.add_function("leaf");
        b.public_method_dependencies.insert("BImpl.m()".into(), deps);
        b.public_method_dependencies
            .insert("BImpl.idle()".into(), Dependencies::new());

        let index = TransitiveIndex::build(&build_set(vec![b]));
        assert!(index.lookup("b", "IB.m()").is_some());
        assert!(index.lookup("b", "IB.idle()").is_none());
    }

    #[tokio::test]
    async fn expands_two_hops_to_the_leaf() {
        // a's entry point calls b, whose public method calls c, whose
        // public method finally names a function.
        let mut b = scan("b");
        b.method_impl_mappings
            .insert("IB.m()".into(), "BImpl.m()".into());
        let mut b_deps = Dependencies::new();
        b_deps.add_service_call(ServiceCall::new("c", "IC.m()"));
        b.public_method_dependencies
            .insert("BImpl.m()".into(), b_deps);

        let mut c = scan("c");
        c.method_impl_mappings
            .insert("IC.m()".into(), "CImpl.m()".into());
        let mut c_deps = Dependencies::new();
        c_deps.add_function("leaf");
        c.public_method_dependencies
            .insert("CImpl.m()".into(), c_deps);

        let index = TransitiveIndex::build(&build_set(vec![b, c]));
        let mut sink = Vec::new();
        index
            .expand(
                &ServiceCall::new("b", "IB.m()"),
                &mut sink,
                &FallbackQueueResolver,
            )
            .await;
        assert_eq!(sink, vec![ChildRef::Function { name: "leaf".into() }]);
    }

    #[tokio::test]
    async fn mutual_recursion_terminates() {
        let mut a = scan("a");
        a.method_impl_mappings
            .insert("IA.m()".into(), "AImpl.m()".into());
        let mut a_deps = Dependencies::new();
        a_deps.add_function("fa");
        a_deps.add_service_call(ServiceCall::new("b", "IB.m()"));
        a.public_method_dependencies
            .insert("AImpl.m()".into(), a_deps);

        let mut b = scan("b");
        b.method_impl_mappings
            .insert("IB.m()".into(), "BImpl.m()".into());
        let mut b_deps = Dependencies::new();
        b_deps.add_function("fb");
        b_deps.add_service_call(ServiceCall::new("a", "IA.m()"));
        b.public_method_dependencies
            .insert("BImpl.m()".into(), b_deps);

        let index = TransitiveIndex::build(&build_set(vec![a, b]));
        let mut sink = Vec::new();
        index
            .expand(
                &ServiceCall::new("a", "IA.m()"),
                &mut sink,
                &FallbackQueueResolver,
            )
            .await;
        let names: Vec<String> = sink
            .iter()
            .map(|c| match c {
                ChildRef::Function { name } => name.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, ["fa", "fb"]);
    }

    #[tokio::test]
    async fn self_call_terminates() {
        let mut a = scan("a");
        a.method_impl_mappings
            .insert("IA.m()".into(), "AImpl.m()".into());
        let mut deps = Dependencies::new();
        deps.add_function("fa");
        deps.add_service_call(ServiceCall::new("a", "IA.m()"));
        a.public_method_dependencies
            .insert("AImpl.m()".into(), deps);

        let index = TransitiveIndex::build(&build_set(vec![a]));
        let mut sink = Vec::new();
        index
            .expand(
                &ServiceCall::new("a", "IA.m()"),
                &mut sink,
                &FallbackQueueResolver,
            )
            .await;
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn dangling_target_contributes_nothing() {
        let index = TransitiveIndex::build(&build_set(vec![]));
        let mut sink = Vec::new();
        index
            .expand(
                &ServiceCall::new("ghost", "IG.m()"),
                &mut sink,
                &FallbackQueueResolver,
            )
            .await;
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn async_and_topic_leaves_resolve_queue_names() {
        let mut b = scan("b");
        b.method_impl_mappings
            .insert("IB.m()".into(), "BImpl.m()".into());
        let mut deps = Dependencies::new();
        deps.add_async_function("h");
        deps.add_topic("T");
        b.public_method_dependencies.insert("BImpl.m()".into(), deps);

        let index = TransitiveIndex::build(&build_set(vec![b]));
        let mut sink = Vec::new();
        index
            .expand(
                &ServiceCall::new("b", "IB.m()"),
                &mut sink,
                &FallbackQueueResolver,
            )
            .await;
        assert_eq!(
            sink,
            vec![
                ChildRef::AsyncFunction {
                    name: "h".into(),
                    queue_name: "h_queue".into(),
                },
                ChildRef::TopicPublish {
                    topic: "T".into(),
                    queue_name: "T_queue".into(),
                },
            ]
        );
    }
}
