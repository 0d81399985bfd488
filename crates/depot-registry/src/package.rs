//! Package metadata structures.
//!
//! [`PackageManifest`] is a package entry as published in the remote index.
//! [`Package`] is the record served to clients: the manifest plus its derived
//! base path, the paths clients use to download it and the resolver that knows
//! where those downloads physically live.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::resolver::RemoteResolver;

/// Extension of every package archive.
pub const ARCHIVE_EXTENSION: &str = "zip";

static PACKAGE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9_]+$").expect("unable to compile package name regex")
});

/// Returns true if `name` is a non-empty, path-safe package name.
pub fn is_valid_package_name(name: &str) -> bool {
    PACKAGE_NAME_RE.is_match(name)
}

/// Returns true if `version` is a strict semantic version (`MAJOR.MINOR.PATCH`
/// with optional pre-release and build metadata, no `v` prefix).
pub fn is_strict_version(version: &str) -> bool {
    semver::Version::parse(version).is_ok()
}

fn empty_is_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.is_empty()))
}

/// Package metadata as published in the remote index.
///
/// Only `name` and `version` are required. Well-known optional fields are
/// typed; anything else is kept verbatim in `extra` and served back unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: String,

    #[serde(
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,

    #[serde(
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(
        rename = "type",
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub package_type: Option<String>,

    #[serde(
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub format_version: Option<String>,

    #[serde(
        default,
        deserialize_with = "empty_is_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub release: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            title: None,
            description: None,
            package_type: None,
            format_version: None,
            release: None,
            extra: Map::new(),
        }
    }
}

/// The remote cursor object, naming the current index generation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Cursor {
    pub current: String,
}

/// One entry of the `search-index-all` document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageIndex {
    pub package_manifest: PackageManifest,
}

/// The `search-index-all` document listing every published package.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchIndexAll {
    #[serde(default)]
    pub packages: Vec<PackageIndex>,
}

/// A package as served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    #[serde(flatten)]
    pub manifest: PackageManifest,

    /// Client-facing download path of the archive.
    pub download: String,

    /// Client-facing download path of the detached signature.
    pub signature_path: String,

    /// Client-facing path of the package index document.
    pub path: String,

    /// Archive file name, `<name>-<version>.zip`.
    #[serde(skip)]
    pub base_path: String,

    #[serde(skip)]
    resolver: Arc<dyn RemoteResolver>,
}

/// Keys `Package` derives itself; copies published in the manifest are dropped.
const DERIVED_KEYS: [&str; 4] = ["download", "signature_path", "path", "base_path"];

/// A sequence of packages shared between readers without copying.
pub type Packages = Arc<[Arc<Package>]>;

impl Package {
    /// Builds a served record from a manifest entry.
    ///
    /// `base_path` is the archive file name; the client-facing paths are derived
    /// from it and replace any published in the manifest.
    pub fn new(
        mut manifest: PackageManifest,
        base_path: String,
        resolver: Arc<dyn RemoteResolver>,
    ) -> Self {
        for key in DERIVED_KEYS {
            manifest.extra.shift_remove(key);
        }
        let download = format!("/epr/{}/{}", manifest.name, base_path);
        let signature_path = format!("{download}.sig");
        let path = format!("/package/{}/{}", manifest.name, manifest.version);
        Self {
            manifest,
            download,
            signature_path,
            path,
            base_path,
            resolver,
        }
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn resolver(&self) -> &Arc<dyn RemoteResolver> {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StorageResolver;

    fn resolver() -> Arc<dyn RemoteResolver> {
        let endpoint = url::Url::parse("https://packages.example.com/").unwrap();
        Arc::new(StorageResolver::new(&endpoint).unwrap())
    }

    #[test]
    fn test_package_name_validation() {
        assert!(is_valid_package_name("foo"));
        assert!(is_valid_package_name("foo_bar2"));
        assert!(!is_valid_package_name(""));
        assert!(!is_valid_package_name("Foo"));
        assert!(!is_valid_package_name("foo-bar"));
        assert!(!is_valid_package_name("../etc"));
    }

    #[test]
    fn test_strict_version() {
        assert!(is_strict_version("1.2.3"));
        assert!(is_strict_version("1.0.0-beta.1"));
        assert!(!is_strict_version("abc"));
        assert!(!is_strict_version("1.2"));
        assert!(!is_strict_version("v1.2.3"));
    }

    #[test]
    fn test_manifest_deserialization() {
        let json = r#"{
            "name": "foo",
            "version": "1.2.3",
            "title": "",
            "description": "Foo integration",
            "type": "integration",
            "owner": {"github": "acme/foo"}
        }"#;

        let manifest: PackageManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.name, "foo");
        assert_eq!(manifest.title, None);
        assert_eq!(manifest.description.as_deref(), Some("Foo integration"));
        assert_eq!(manifest.package_type.as_deref(), Some("integration"));
        assert_eq!(manifest.extra["owner"]["github"], "acme/foo");
    }

    #[test]
    fn test_search_index_all_deserialization() {
        let json = r#"{"packages": [
            {"package_manifest": {"name": "foo", "version": "1.2.3"}},
            {"package_manifest": {"name": "bar", "version": "0.1.0"}}
        ]}"#;

        let index: SearchIndexAll = serde_json::from_str(json).unwrap();
        assert_eq!(index.packages.len(), 2);
        assert_eq!(index.packages[1].package_manifest.name, "bar");
    }

    #[test]
    fn test_package_serialization() {
        let mut manifest = PackageManifest::new("foo", "1.2.3");
        manifest
            .extra
            .insert("categories".to_string(), serde_json::json!(["web"]));
        let package = Package::new(manifest, "foo-1.2.3.zip".to_string(), resolver());

        let value = serde_json::to_value(&package).unwrap();
        assert_eq!(value["name"], "foo");
        assert_eq!(value["version"], "1.2.3");
        assert_eq!(value["download"], "/epr/foo/foo-1.2.3.zip");
        assert_eq!(value["signature_path"], "/epr/foo/foo-1.2.3.zip.sig");
        assert_eq!(value["path"], "/package/foo/1.2.3");
        assert_eq!(value["categories"][0], "web");
        assert!(value.get("base_path").is_none());
        assert!(value.get("title").is_none());
    }

    #[test]
    fn test_package_replaces_published_derived_keys() {
        let json = r#"{
            "name": "foo",
            "version": "1.2.3",
            "download": "/epr/foo/foo-1.2.3.zip",
            "path": "/package/foo/1.2.3",
            "signature_path": "/epr/foo/foo-1.2.3.zip.sig",
            "base_path": "foo-1.2.3.zip",
            "owner": {"github": "acme/foo"},
            "format_version": "1.0.0"
        }"#;
        let manifest: PackageManifest = serde_json::from_str(json).unwrap();
        assert!(manifest.extra.contains_key("download"));

        let package = Package::new(manifest, "foo-1.2.3.zip".to_string(), resolver());
        let body = serde_json::to_string_pretty(&package).unwrap();

        for key in ["\"download\"", "\"path\"", "\"signature_path\""] {
            assert_eq!(body.matches(key).count(), 1, "{key} in {body}");
        }
        assert!(!body.contains("\"base_path\""));
        assert!(body.contains("\"owner\""));
        assert!(!package.manifest.extra.contains_key("download"));
    }
}
