//! The depot index engine.
//!
//! An [`Indexer`] loads the package index from object storage, turns it into
//! served [`Package`](depot_registry::Package) records and keeps it fresh in
//! the background. Readers query the latest [`Snapshot`] without locking.

pub mod error;
pub mod indexer;
pub mod snapshot;
pub mod transform;

pub use error::{IndexerError, Result};
pub use indexer::{Indexer, IndexerOptions, RefreshOutcome};
pub use snapshot::Snapshot;
pub use transform::{base_path, transform_search_index_all, TransformError};
