// Topological ordering of the build set by declared service dependencies.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::errors::BuildError;
use crate::scan::ProcessedScan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Order the build set so that every declared dependency that is itself in
/// the set precedes its dependents. Dependencies on services outside the
/// set are ignored. A cycle fails the build.
///
/// Depth-first with three-colour marking; the seed iteration order is the
/// insertion order of `scans` (the request's service order), which makes
/// the result deterministic for a given request.
pub fn order_services(scans: &IndexMap<String, ProcessedScan>) -> Result<Vec<String>, BuildError> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut ordered = Vec::with_capacity(scans.len());

    for service_id in scans.keys() {
        visit(service_id, scans, &mut marks, &mut ordered)?;
    }

    Ok(ordered)
}

fn visit<'a>(
    service_id: &'a str,
    scans: &'a IndexMap<String, ProcessedScan>,
    marks: &mut HashMap<&'a str, Mark>,
    ordered: &mut Vec<String>,
) -> Result<(), BuildError> {
    match marks.get(service_id) {
        Some(Mark::Visited) => return Ok(()),
        Some(Mark::Visiting) => {
            return Err(BuildError::CyclicDependency(service_id.to_string()));
        }
        None => {}
    }
    marks.insert(service_id, Mark::Visiting);

    // Only dependencies that are themselves part of the build constrain
    // the order.
    let scan = &scans[service_id];
    for dep in scan.declared_dependencies() {
        if let Some((key, _)) = scans.get_key_value(&dep) {
            visit(key, scans, marks, ordered)?;
        }
    }

    marks.insert(service_id, Mark::Visited);
    ordered.push(service_id.to_string());
    Ok(())
}
