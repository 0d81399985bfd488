//! Query filters applied to a catalog snapshot.
//!
//! The index engine has no lookup semantics of its own: callers narrow a
//! snapshot by passing a [`Filter`] in [`GetOptions`].

use std::sync::Arc;

use crate::package::{Package, Packages};

/// Narrows a sequence of packages.
pub trait Filter: Send + Sync {
    fn apply(&self, packages: &[Arc<Package>]) -> Packages;
}

/// Options for a catalog query.
#[derive(Default)]
pub struct GetOptions {
    pub filter: Option<Box<dyn Filter>>,
}

impl GetOptions {
    pub fn with_filter(filter: impl Filter + 'static) -> Self {
        Self {
            filter: Some(Box::new(filter)),
        }
    }
}

/// Matches packages by exact name and version.
///
/// Inputs are expected to be validated already; no normalization is applied.
#[derive(Debug, Clone)]
pub struct NameVersionFilter {
    name: String,
    version: String,
}

impl NameVersionFilter {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Filter for NameVersionFilter {
    fn apply(&self, packages: &[Arc<Package>]) -> Packages {
        packages
            .iter()
            .filter(|p| p.name() == self.name && p.version() == self.version)
            .cloned()
            .collect()
    }
}
