//! Access to the package index stored in an object storage bucket.
//!
//! The index lives below a root path in a bucket:
//!
//! ```text
//! <root>/v2/metadata/cursor.json                         {"current": "<cursor>"}
//! <root>/v2/metadata/<cursor>/search-index-all.json      {"packages": [...]}
//! ```
//!
//! [`load_cursor`] reads the small cursor object; [`load_search_index_all`]
//! downloads the full listing for one cursor. Objects are read through the
//! [`ObjectStore`] trait so the transport can be swapped, and mocked in tests.

use std::{
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::Arc,
};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::debug;
use ureq::Agent;
use url::Url;

use crate::{
    error::{ErrorContext, RegistryError, Result},
    http_client::ClientConfig,
    package::{Cursor, SearchIndexAll},
};

/// Scheme of supported bucket URLs.
pub const BUCKET_SCHEME: &str = "gs";

/// Location of the cursor object below the bucket root.
pub const CURSOR_STORAGE_PATH: &str = "v2/metadata/cursor.json";

/// Upper bound on the size of a single index object.
const MAX_OBJECT_SIZE: u64 = 1024 * 1024 * 1024;

const OBJECT_PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Location of the `search-index-all` object for `cursor`, below the bucket root.
pub fn search_index_all_storage_path(cursor: &str) -> String {
    format!("v2/metadata/{cursor}/search-index-all.json")
}

/// A bucket name plus the root path the index lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRef {
    bucket: String,
    root: String,
}

impl BucketRef {
    /// Parses a `gs://<bucket>/<root path>` URL. The root path may be empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use depot_registry::storage::BucketRef;
    ///
    /// let bucket = BucketRef::parse("gs://packages/prod/index").unwrap();
    /// assert_eq!(bucket.bucket(), "packages");
    /// assert_eq!(bucket.root(), "prod/index");
    /// assert!(BucketRef::parse("s3://packages").is_err());
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || RegistryError::InvalidBucketUrl(url.to_string());

        let parsed = Url::parse(url).map_err(|_| invalid())?;
        if parsed.scheme() != BUCKET_SCHEME {
            return Err(invalid());
        }
        let bucket = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(invalid)?;

        Ok(Self {
            bucket: bucket.to_string(),
            root: parsed.path().trim_matches('/').to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Joins `relative` onto the root path.
    pub fn object_path(&self, relative: &str) -> String {
        if self.root.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.root, relative)
        }
    }
}

/// Read access to objects in a bucket.
///
/// Calls block; async callers are expected to run them on a blocking pool.
pub trait ObjectStore: Send + Sync {
    /// Fetches the whole object at `path` in `bucket`.
    ///
    /// A missing object must be reported as [`RegistryError::ObjectNotFound`].
    fn fetch_object(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;
}

/// Object store backed by the Google Cloud Storage XML API, or anything
/// serving objects at `<base>/<bucket>/<path>`.
pub struct GcsStore {
    agent: Agent,
    base: Url,
}

impl GcsStore {
    pub fn new(base: Url, client: &ClientConfig) -> Self {
        Self {
            agent: client.build(),
            base,
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        let encoded = utf8_percent_encode(path, OBJECT_PATH_SEGMENT);
        format!(
            "{}/{}/{}",
            self.base.as_str().trim_end_matches('/'),
            bucket,
            encoded
        )
    }
}

impl ObjectStore for GcsStore {
    fn fetch_object(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, path);
        debug!("Fetching object from {}", url);

        match self.agent.get(&url).call() {
            Ok(resp) => {
                let mut body = resp.into_body();
                body.with_config()
                    .limit(MAX_OBJECT_SIZE)
                    .read_to_vec()
                    .map_err(|err| {
                        RegistryError::FetchFailed {
                            url,
                            reason: err.to_string(),
                        }
                    })
            }
            Err(ureq::Error::StatusCode(404)) => {
                Err(RegistryError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                })
            }
            Err(err) => {
                Err(RegistryError::FetchFailed {
                    url,
                    reason: err.to_string(),
                })
            }
        }
    }
}

/// Object store reading `<root>/<bucket>/<path>` from the local filesystem.
///
/// Useful for mirrors and local development.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }
}

impl ObjectStore for LocalStore {
    fn fetch_object(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let file = self.root.join(bucket).join(path);
        debug!("Reading object from {}", file.display());

        match fs::read(&file) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(RegistryError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    path: path.to_string(),
                })
            }
            result => result.with_context(|| format!("reading object {}", file.display())),
        }
    }
}

/// Opens the object store matching the scheme of `storage_api_url`.
pub fn open_store(storage_api_url: &Url, client: &ClientConfig) -> Result<Arc<dyn ObjectStore>> {
    match storage_api_url.scheme() {
        "http" | "https" => Ok(Arc::new(GcsStore::new(storage_api_url.clone(), client))),
        "file" => {
            let root = storage_api_url
                .to_file_path()
                .map_err(|_| RegistryError::UnsupportedStorageApi(storage_api_url.to_string()))?;
            Ok(Arc::new(LocalStore::new(root)))
        }
        _ => Err(RegistryError::UnsupportedStorageApi(storage_api_url.to_string())),
    }
}

/// A cursor names a directory below `v2/metadata` and must stay a single segment.
fn is_safe_cursor(cursor: &str) -> bool {
    !cursor.contains(['/', '\\']) && !cursor.contains("..")
}

/// Loads the current cursor from the bucket.
pub fn load_cursor(store: &dyn ObjectStore, bucket: &BucketRef) -> Result<Cursor> {
    let path = bucket.object_path(CURSOR_STORAGE_PATH);
    let content = store.fetch_object(bucket.bucket(), &path)?;
    let cursor: Cursor = serde_json::from_slice(&content).map_err(|err| {
        RegistryError::Decode {
            path: path.clone(),
            source: err,
        }
    })?;

    if cursor.current.trim().is_empty() {
        return Err(RegistryError::EmptyCursor(path));
    }
    if !is_safe_cursor(&cursor.current) {
        return Err(RegistryError::InvalidCursor {
            path,
            cursor: cursor.current,
        });
    }
    Ok(cursor)
}

/// Downloads and decodes the `search-index-all` document for `cursor`.
pub fn load_search_index_all(
    store: &dyn ObjectStore,
    bucket: &BucketRef,
    cursor: &Cursor,
) -> Result<SearchIndexAll> {
    let path = bucket.object_path(&search_index_all_storage_path(&cursor.current));
    let content = store.fetch_object(bucket.bucket(), &path)?;
    serde_json::from_slice(&content).map_err(|err| {
        RegistryError::Decode {
            path,
            source: err,
        }
    })
}
