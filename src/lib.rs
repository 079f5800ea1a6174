//! # Depsnap
//!
//! Depsnap assembles composite application dependency snapshots from
//! per-service static-analysis artifacts. Each snapshot pairs a
//! hierarchical application template with a flat pool of function
//! definitions, for a named application and a pinned set of
//! (service, commit) revisions.
//!
//! The crate provides both a command-line interface and a library that can
//! be embedded behind another persistence or dispatch layer.
//!
//! ## Building a snapshot
//!
//! ```no_run
//! use depsnap::build::SnapshotAssembler;
//! use depsnap::models::{BuildRequest, ServicePin};
//! use depsnap::queue::FallbackQueueResolver;
//! use depsnap::scan::InMemoryScanStore;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = InMemoryScanStore::new();
//! // ... populate the store with processed scans ...
//!
//! let request = BuildRequest::new(
//!     "billing",
//!     vec![ServicePin::new("billing-core", "4f2a9c1")],
//! );
//! let assembler = SnapshotAssembler::new(&store, &FallbackQueueResolver);
//! let snapshot = assembler.build(&request).await?;
//! println!("{}", serde_json::to_string_pretty(&snapshot)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Processing raw artifacts
//!
//! ```
//! use depsnap::models::RawScan;
//! use depsnap::scan::ScanProcessor;
//!
//! let raw: RawScan = serde_json::from_str(r#"{"artifactId": "billing-core"}"#)?;
//! let output = ScanProcessor::new().process(&raw)?;
//! assert_eq!(output.scan.service_id, "billing-core");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod build;
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod queue;
pub mod scan;
pub mod snapshot;

pub use build::SnapshotAssembler;
pub use errors::BuildError;
pub use models::{BuildRequest, ServicePin};
pub use snapshot::Snapshot;
