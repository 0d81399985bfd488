//! Error types for the registry crate.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while reading the package index from storage or
/// resolving package resources.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Error while {action}")]
    #[diagnostic(code(depot_registry::io))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid storage bucket URL `{0}`")]
    #[diagnostic(
        code(depot_registry::invalid_bucket_url),
        help("Use the form gs://<bucket>/<root path>")
    )]
    InvalidBucketUrl(String),

    #[error("Invalid package storage endpoint `{0}`")]
    #[diagnostic(
        code(depot_registry::invalid_endpoint),
        help("The endpoint must be an absolute URL, e.g. https://packages.example.com/")
    )]
    InvalidEndpoint(String),

    #[error("Unsupported storage API URL `{0}`")]
    #[diagnostic(
        code(depot_registry::unsupported_storage_api),
        help("Use an http(s):// URL or a file:// directory")
    )]
    UnsupportedStorageApi(String),

    #[error("Object not found: {bucket}/{path}")]
    #[diagnostic(
        code(depot_registry::object_not_found),
        help("Check that the index has been published to the bucket")
    )]
    ObjectNotFound { bucket: String, path: String },

    #[error("Failed to fetch {url}: {reason}")]
    #[diagnostic(
        code(depot_registry::fetch_remote),
        help("Check your network connection and the storage API URL")
    )]
    FetchFailed { url: String, reason: String },

    #[error("Failed to decode {path}")]
    #[diagnostic(
        code(depot_registry::decode),
        help("The index object may be corrupted or in an unexpected format")
    )]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cursor object {0} has an empty `current` value")]
    #[diagnostic(code(depot_registry::empty_cursor))]
    EmptyCursor(String),

    #[error("Cursor object {path} has an invalid `current` value `{cursor}`")]
    #[diagnostic(
        code(depot_registry::invalid_cursor),
        help("A cursor must be a single path segment without `/`, `\\` or `..`")
    )]
    InvalidCursor { path: String, cursor: String },

    #[error("Invalid resource path `{0}`")]
    #[diagnostic(
        code(depot_registry::invalid_resource_path),
        help("Resource paths must be relative and must not contain `..`")
    )]
    InvalidResourcePath(String),

    #[error("Failed to build URL for {0}")]
    #[diagnostic(code(depot_registry::url))]
    Url(String, #[source] url::ParseError),
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
