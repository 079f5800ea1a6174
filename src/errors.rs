// Error types for the snapshot build pipeline

use thiserror::Error;

/// Fatal build errors. Anything not covered here is survivable and is
/// reported on the snapshot itself (failed services, fallback queue names).
#[derive(Debug, Error)]
pub enum BuildError {
    /// The build request failed precondition validation.
    #[error("invalid build request: {0}")]
    InvalidInput(String),

    /// A requested service that did not fail scanning has no processed scan
    /// in the backing store. This indicates a data error, not a partial build.
    #[error("no processed scan found for service {service_id}@{commit_hash}")]
    MissingScan {
        service_id: String,
        commit_hash: String,
    },

    /// The declared service dependencies within the build set form a cycle.
    #[error("cyclic service dependency detected at {0}")]
    CyclicDependency(String),
}

/// Errors from transforming a raw scan artifact into its processed form.
#[derive(Debug, Error)]
pub enum ScanProcessError {
    #[error("invalid raw scan: {0}")]
    InvalidInput(String),
}
