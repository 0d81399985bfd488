//! Error types for the index engine.

use std::error::Error as _;

use depot_events::RefreshStage;
use depot_registry::RegistryError;
use miette::Diagnostic;
use thiserror::Error;

use crate::transform::TransformError;

#[derive(Error, Diagnostic, Debug)]
pub enum IndexerError {
    #[error("Invalid indexer options: {reason}")]
    #[diagnostic(
        code(depot_core::validation),
        help("Check package_storage_bucket_internal and package_storage_endpoint")
    )]
    Validation {
        reason: String,
        #[source]
        source: RegistryError,
    },

    #[error("Indexer is already initialized")]
    #[diagnostic(code(depot_core::already_initialized))]
    AlreadyInitialized,

    #[error("Indexer is not initialized")]
    #[diagnostic(code(depot_core::not_initialized))]
    NotInitialized,

    #[error("Can't load the initial package index")]
    #[diagnostic(
        code(depot_core::initial_update),
        help("The first index load must succeed before the server starts")
    )]
    InitialUpdate(#[source] Box<IndexerError>),

    #[error("Can't load latest cursor")]
    #[diagnostic(code(depot_core::load_cursor))]
    LoadCursor(#[source] RegistryError),

    #[error("Can't load the search-index-all index content for cursor {cursor}")]
    #[diagnostic(code(depot_core::load_index))]
    LoadIndex {
        cursor: String,
        #[source]
        source: RegistryError,
    },

    #[error("Can't transform the search-index-all index for cursor {cursor}")]
    #[diagnostic(code(depot_core::transform))]
    Transform {
        cursor: String,
        #[source]
        source: TransformError,
    },

    #[error("Blocking storage task failed during the {} stage", stage.as_str())]
    #[diagnostic(code(depot_core::task))]
    Task {
        stage: RefreshStage,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl IndexerError {
    /// Refresh stage the error belongs to.
    pub fn stage(&self) -> RefreshStage {
        match self {
            Self::Validation {
                ..
            }
            | Self::AlreadyInitialized
            | Self::NotInitialized => RefreshStage::Location,
            Self::InitialUpdate(inner) => inner.stage(),
            Self::LoadCursor(_) => RefreshStage::Cursor,
            Self::LoadIndex {
                ..
            } => RefreshStage::Manifest,
            Self::Transform {
                ..
            } => RefreshStage::Transform,
            Self::Task {
                stage,
                ..
            } => *stage,
        }
    }

    /// The error message followed by every source, joined with `: `.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
