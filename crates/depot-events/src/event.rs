use std::time::Duration;

/// Stage of a refresh cycle, used to tell failures apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStage {
    /// Parsing the configured bucket location.
    Location,
    /// Fetching or decoding the cursor object.
    Cursor,
    /// Fetching or decoding the manifest for a new cursor.
    Manifest,
    /// Turning manifest entries into served package records.
    Transform,
}

impl RefreshStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Cursor => "cursor",
            Self::Manifest => "manifest",
            Self::Transform => "transform",
        }
    }
}

/// All events emitted by the index engine.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    /// A new catalog was published.
    RefreshSucceeded { cursor: String, package_count: usize },
    /// The remote cursor matched the published one; nothing was downloaded.
    RefreshSkipped { cursor: String },
    /// A refresh cycle was aborted; the published catalog is unchanged.
    RefreshFailed { stage: RefreshStage, message: String },
    /// Wall time of one refresh cycle, successful or not.
    RefreshDuration(Duration),
    /// Wall time of one catalog query.
    QueryDuration(Duration),
}
