//! Package records and package index storage for depot.
//!
//! This crate provides the pieces the index engine is built from:
//!
//! - **Wire formats**: the remote cursor and `search-index-all` documents
//!   ([`Cursor`], [`SearchIndexAll`], [`PackageManifest`])
//! - **Storage**: bucket URL parsing, the [`ObjectStore`] trait with HTTP and
//!   filesystem implementations, and loaders for the cursor and the index
//! - **Served records**: [`Package`] and the [`RemoteResolver`] attached to it
//! - **Queries**: [`Filter`]s that narrow a catalog snapshot
//!
//! # Example
//!
//! ```no_run
//! use depot_registry::{load_cursor, load_search_index_all, BucketRef, LocalStore};
//!
//! fn read_index() -> depot_registry::Result<usize> {
//!     let store = LocalStore::new("/srv/mirror");
//!     let bucket = BucketRef::parse("gs://packages/prod")?;
//!     let cursor = load_cursor(&store, &bucket)?;
//!     let index = load_search_index_all(&store, &bucket, &cursor)?;
//!     Ok(index.packages.len())
//! }
//! ```

pub mod error;
pub mod filter;
pub mod http_client;
pub mod package;
pub mod resolver;
pub mod storage;

pub use error::{ErrorContext, RegistryError, Result};
pub use filter::{Filter, GetOptions, NameVersionFilter};
pub use package::{
    is_strict_version, is_valid_package_name, Cursor, Package, PackageIndex, PackageManifest,
    Packages, SearchIndexAll, ARCHIVE_EXTENSION,
};
pub use resolver::{Redirect, RemoteResolver, StorageResolver};
pub use storage::{
    load_cursor, load_search_index_all, open_store, BucketRef, GcsStore, LocalStore, ObjectStore,
};
