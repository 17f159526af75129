//! Asset finders: pluggable sources of static files.
//!
//! Each finder reports `(relative path, storage)` pairs in a stable order.
//! The registry in [`super::collect`] is polymorphic over [`AssetFinder`]
//! and decides precedence purely from that order.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::ignore::IgnorePatterns;
use crate::error::DiscoveryError;

/// Where a found file physically lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStorage {
    /// Root directory of the storage
    pub location: PathBuf,
    /// Optional namespace prepended to public paths
    pub prefix: Option<String>,
}

impl AssetStorage {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Public path for a file inside this storage
    pub fn public_path(&self, relative_path: &str) -> String {
        match self.prefix.as_deref().map(|p| p.trim_end_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{relative_path}"),
            _ => relative_path.to_string(),
        }
    }
}

/// A single file reported by a finder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    /// Path relative to the storage root, `/`-separated
    pub relative_path: String,
    pub storage: AssetStorage,
}

/// Capability interface implemented by every asset source
pub trait AssetFinder: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Enumerate files, skipping anything matched by `ignore`
    fn list(&self, ignore: &IgnorePatterns) -> Result<Vec<FoundFile>, DiscoveryError>;
}

/// Finds files in explicitly configured directories, each with an optional prefix
#[derive(Debug, Clone, Default)]
pub struct DirectoryFinder {
    locations: Vec<AssetStorage>,
}

impl DirectoryFinder {
    pub fn new(locations: Vec<AssetStorage>) -> Self {
        Self { locations }
    }
}

impl AssetFinder for DirectoryFinder {
    fn name(&self) -> &str {
        "directories"
    }

    fn list(&self, ignore: &IgnorePatterns) -> Result<Vec<FoundFile>, DiscoveryError> {
        let mut found = Vec::new();
        for storage in &self.locations {
            if !storage.location.is_dir() {
                debug!(location = %storage.location.display(), "Skipping missing static directory");
                continue;
            }
            for relative_path in walk_storage(self.name(), &storage.location, ignore)? {
                found.push(FoundFile {
                    relative_path,
                    storage: storage.clone(),
                });
            }
        }
        Ok(found)
    }
}

/// Finds files in the `static/` subdirectory of each application root
#[derive(Debug, Clone, Default)]
pub struct AppDirectoriesFinder {
    apps: Vec<PathBuf>,
}

impl AppDirectoriesFinder {
    /// Subdirectory scanned inside each application
    pub const DEFAULT_SOURCE_DIR: &'static str = "static";

    pub fn new(apps: Vec<PathBuf>) -> Self {
        Self { apps }
    }
}

impl AssetFinder for AppDirectoriesFinder {
    fn name(&self) -> &str {
        "apps"
    }

    fn list(&self, ignore: &IgnorePatterns) -> Result<Vec<FoundFile>, DiscoveryError> {
        let mut found = Vec::new();
        for app in &self.apps {
            let location = app.join(Self::DEFAULT_SOURCE_DIR);
            if !location.is_dir() {
                continue;
            }
            let storage = AssetStorage::new(location);
            for relative_path in walk_storage(self.name(), &storage.location, ignore)? {
                found.push(FoundFile {
                    relative_path,
                    storage: storage.clone(),
                });
            }
        }
        Ok(found)
    }
}

/// Walk a storage root depth-first: within a directory, files come before
/// subdirectories and both are sorted by name.
fn walk_storage(
    finder: &str,
    root: &Path,
    ignore: &IgnorePatterns,
) -> Result<Vec<String>, DiscoveryError> {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by(|a, b| {
            let a_dir = a.file_type().is_dir();
            let b_dir = b.file_type().is_dir();
            a_dir
                .cmp(&b_dir)
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !ignore.ignores_dir(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            finder: finder.to_string(),
            path: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative_path = to_public_separators(relative);
        if ignore.ignores_file(&relative_path) {
            continue;
        }
        files.push(relative_path);
    }
    Ok(files)
}

fn to_public_separators(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
