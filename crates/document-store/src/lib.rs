//! JobStore and ArtifactStore backed by MongoDB. Both stores
//! share one client/database but own disjoint collections; `DocumentStore`
//! is the single handle threaded through `core` for both roles.

mod artifacts;
mod client;
mod jobs;

pub use artifacts::DeletionReport;
pub use client::{DocumentStore, DocumentStoreError};
