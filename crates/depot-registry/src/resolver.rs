//! Resolution of package resources to their physical download locations.
//!
//! Every served [`Package`] carries a [`RemoteResolver`], so HTTP handlers can
//! redirect downloads without knowing where artifacts are stored.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::{
    error::{RegistryError, Result},
    package::Package,
};

/// Path below the storage endpoint holding package archives and signatures.
pub const ARTIFACTS_PACKAGES_STORAGE_PATH: &str = "artifacts/packages";

/// Path below the storage endpoint holding extracted static resources.
pub const ARTIFACTS_STATIC_STORAGE_PATH: &str = "artifacts/static";

/// Characters escaped in a single URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A redirect to the physical location of a package resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub location: Url,
}

/// Knows where the resources of a package physically live.
///
/// Implementations compute a location and never fetch or proxy the bytes.
pub trait RemoteResolver: Send + Sync + fmt::Debug {
    /// Redirect to the package archive.
    fn redirect_artifact(&self, package: &Package) -> Result<Redirect>;

    /// Redirect to a static resource beneath the package, such as an icon or
    /// screenshot. `resource_path` is relative to the package root.
    fn redirect_static(&self, package: &Package, resource_path: &str) -> Result<Redirect>;

    /// Redirect to the detached signature of the package archive.
    fn redirect_signature(&self, package: &Package) -> Result<Redirect>;
}

/// Resolver for artifacts published below a public storage endpoint.
#[derive(Debug, Clone)]
pub struct StorageResolver {
    artifacts_packages_url: Url,
    artifacts_static_url: Url,
}

impl StorageResolver {
    pub fn new(endpoint: &Url) -> Result<Self> {
        if endpoint.cannot_be_a_base() {
            return Err(RegistryError::InvalidEndpoint(endpoint.to_string()));
        }

        let mut base = endpoint.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(&format!("{path}/"))
                .map_err(|err| RegistryError::Url(path.to_string(), err))
        };

        Ok(Self {
            artifacts_packages_url: join(ARTIFACTS_PACKAGES_STORAGE_PATH)?,
            artifacts_static_url: join(ARTIFACTS_STATIC_STORAGE_PATH)?,
        })
    }

    fn join(base: &Url, relative: &str) -> Result<Redirect> {
        let location = base
            .join(relative)
            .map_err(|err| RegistryError::Url(relative.to_string(), err))?;
        Ok(Redirect {
            location,
        })
    }
}

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Encodes a relative resource path segment by segment.
///
/// Rejects absolute paths, empty segments and `.`/`..` segments so the result
/// always stays below the package directory.
fn encode_resource_path(resource_path: &str) -> Result<String> {
    let invalid = || RegistryError::InvalidResourcePath(resource_path.to_string());

    if resource_path.is_empty() || resource_path.starts_with('/') {
        return Err(invalid());
    }

    let mut encoded = Vec::new();
    for segment in resource_path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
            return Err(invalid());
        }
        encoded.push(encode_segment(segment));
    }
    Ok(encoded.join("/"))
}

impl RemoteResolver for StorageResolver {
    fn redirect_artifact(&self, package: &Package) -> Result<Redirect> {
        Self::join(
            &self.artifacts_packages_url,
            &encode_segment(&package.base_path),
        )
    }

    fn redirect_static(&self, package: &Package, resource_path: &str) -> Result<Redirect> {
        let resource = encode_resource_path(resource_path)?;
        let package_dir = encode_segment(&format!("{}-{}", package.name(), package.version()));
        Self::join(
            &self.artifacts_static_url,
            &format!("{package_dir}/{resource}"),
        )
    }

    fn redirect_signature(&self, package: &Package) -> Result<Redirect> {
        Self::join(
            &self.artifacts_packages_url,
            &encode_segment(&format!("{}.sig", package.base_path)),
        )
    }
}
