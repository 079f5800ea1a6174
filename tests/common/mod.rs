// Shared builders for raw scan artifacts used across the integration
// suites. Each helper mutates a RawScan in place; tests read like the
// scanner output they stand in for.

#![allow(dead_code)]

use depsnap::models::{
    AccessModifier, EventPublisherInvocation, FunctionInvocation, InvocationType, MethodReference,
    RawScan, ServiceInvocation, TopicResolution,
};
use depsnap::scan::InMemoryScanStore;

pub fn raw_scan(artifact_id: &str) -> RawScan {
    RawScan {
        artifact_id: artifact_id.into(),
        ..RawScan::default()
    }
}

pub fn method_ref(signature: &str, access_modifier: AccessModifier) -> MethodReference {
    MethodReference {
        signature: signature.into(),
        access_modifier,
    }
}

/// A one-element call chain rooted at a public implementation method.
pub fn public_chain(signature: &str) -> Vec<MethodReference> {
    vec![method_ref(signature, AccessModifier::Public)]
}

/// Expose `name` as a function backed by `iface` implemented by `impl_sig`.
pub fn expose_function(scan: &mut RawScan, name: &str, iface: &str, impl_sig: &str) {
    scan.function_mappings.insert(name.into(), iface.into());
    scan.method_impl_mappings.insert(iface.into(), impl_sig.into());
}

/// Expose `name` as a UI method backed by `iface` implemented by `impl_sig`.
pub fn expose_ui_method(scan: &mut RawScan, name: &str, iface: &str, impl_sig: &str) {
    scan.ui_method_mappings.insert(name.into(), iface.into());
    scan.method_impl_mappings.insert(iface.into(), impl_sig.into());
}

pub fn invoke_execute(scan: &mut RawScan, function_id: &str, chain_sig: &str) {
    scan.function_invocations.push(FunctionInvocation {
        function_id: function_id.into(),
        invocation_type: InvocationType::Execute,
        call_chain: public_chain(chain_sig),
    });
}

pub fn invoke_execute_async(scan: &mut RawScan, function_id: &str, chain_sig: &str) {
    scan.function_invocations.push(FunctionInvocation {
        function_id: function_id.into(),
        invocation_type: InvocationType::ExecuteAsync,
        call_chain: public_chain(chain_sig),
    });
}

pub fn invoke_service(scan: &mut RawScan, target_service: &str, target_method: &str, chain_sig: &str) {
    scan.service_invocations.push(ServiceInvocation {
        target_service_id: target_service.into(),
        target_interface_method: target_method.into(),
        call_chain: public_chain(chain_sig),
    });
}

pub fn publish_topic(scan: &mut RawScan, topic: &str, resolution: TopicResolution, chain_sig: &str) {
    scan.event_publisher_invocations.push(EventPublisherInvocation {
        topic: Some(topic.into()),
        resolution,
        call_chain: public_chain(chain_sig),
    });
}

/// Process the given (commit, raw scan) pairs into a populated store.
pub fn store_with(scans: Vec<(&str, &RawScan)>) -> InMemoryScanStore {
    let mut store = InMemoryScanStore::new();
    for (commit, raw) in scans {
        store
            .insert_raw(commit, raw)
            .expect("raw scan should process");
    }
    store
}
