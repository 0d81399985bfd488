//! Mapping of `search-index-all` entries to served package records.

use std::{collections::HashSet, sync::Arc};

use depot_registry::{
    is_strict_version, is_valid_package_name, Package, Packages, RemoteResolver, SearchIndexAll,
    ARCHIVE_EXTENSION,
};
use miette::Diagnostic;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Diagnostic, Debug)]
pub enum TransformError {
    #[error("Entry {position} has an invalid package name `{name}`")]
    #[diagnostic(
        code(depot_core::transform::invalid_name),
        help("Package names may only contain a-z, 0-9 and _")
    )]
    InvalidName { position: usize, name: String },

    #[error("Entry {position} ({name}) has an invalid version `{version}`")]
    #[diagnostic(
        code(depot_core::transform::invalid_version),
        help("Versions must be strict semantic versions such as 1.2.3")
    )]
    InvalidVersion {
        position: usize,
        name: String,
        version: String,
    },
}

/// Archive file name of a package.
pub fn base_path(name: &str, version: &str) -> String {
    format!("{name}-{version}.{ARCHIVE_EXTENSION}")
}

/// Builds package records for every manifest entry, in manifest order, each
/// sharing `resolver`.
///
/// Later entries repeating an earlier (name, version) pair are dropped.
pub fn transform_search_index_all(
    index: SearchIndexAll,
    resolver: &Arc<dyn RemoteResolver>,
) -> Result<Packages, TransformError> {
    let mut seen = HashSet::with_capacity(index.packages.len());
    let mut packages = Vec::with_capacity(index.packages.len());

    for (position, entry) in index.packages.into_iter().enumerate() {
        let manifest = entry.package_manifest;

        if !is_valid_package_name(&manifest.name) {
            return Err(TransformError::InvalidName {
                position,
                name: manifest.name,
            });
        }
        if !is_strict_version(&manifest.version) {
            return Err(TransformError::InvalidVersion {
                position,
                name: manifest.name,
                version: manifest.version,
            });
        }

        if !seen.insert((manifest.name.clone(), manifest.version.clone())) {
            warn!(
                package.name = %manifest.name,
                package.version = %manifest.version,
                position,
                "duplicate package revision in index, keeping the first one"
            );
            continue;
        }

        let base_path = base_path(&manifest.name, &manifest.version);
        packages.push(Arc::new(Package::new(
            manifest,
            base_path,
            Arc::clone(resolver),
        )));
    }

    Ok(packages.into())
}
