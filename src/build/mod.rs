//! Snapshot assembly: ordering the build set, resolving transitive
//! service calls, and driving the one-shot build.

mod assembler;
mod order;
mod transitive;

pub use assembler::SnapshotAssembler;
pub use order::order_services;
pub use transitive::TransitiveIndex;
