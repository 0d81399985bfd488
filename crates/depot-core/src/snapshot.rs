use depot_registry::Packages;

/// An immutable catalog generation: the cursor it was built from and the
/// packages it contains.
///
/// The engine publishes a whole `Snapshot` at once, so a reader never sees a
/// cursor paired with packages from another generation.
#[derive(Debug)]
pub struct Snapshot {
    cursor: String,
    packages: Packages,
}

impl Snapshot {
    pub fn new(cursor: impl Into<String>, packages: Packages) -> Self {
        Self {
            cursor: cursor.into(),
            packages,
        }
    }

    /// The state before the first successful refresh.
    pub fn empty() -> Self {
        Self::new(String::new(), Vec::new().into())
    }

    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    pub fn packages(&self) -> &Packages {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
