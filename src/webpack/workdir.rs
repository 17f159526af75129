//! Ephemeral webpack working directory.
//!
//! Holds the rendered config, the entry file and read-only mounts of the host
//! project's package manifest, lockfile and dependency cache. The directory
//! is removed when the [`WorkDir`] is dropped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SetupError;

pub const MANIFEST_FILE: &str = "package.json";
pub const LOCK_FILE: &str = "yarn.lock";
pub const DEPENDENCY_CACHE_DIR: &str = "node_modules";

/// Exclusive scratch directory for one orchestration run
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh directory under the system temp location
    pub fn temporary() -> Result<Self, SetupError> {
        Self::create(tempfile::Builder::new().prefix("assetpack-").tempdir())
    }

    /// Create a fresh directory under `parent`
    pub fn temporary_in(parent: &Path) -> Result<Self, SetupError> {
        Self::create(tempfile::Builder::new().prefix("assetpack-").tempdir_in(parent))
    }

    fn create(result: io::Result<TempDir>) -> Result<Self, SetupError> {
        let dir = result.map_err(|source| SetupError::Write {
            path: std::env::temp_dir(),
            source,
        })?;
        debug!(path = %dir.path().display(), "Created work directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `name` inside the directory
    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf, SetupError> {
        let path = self.path().join(name);
        fs::write(&path, contents).map_err(|source| SetupError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Make `source` visible as `name` inside the directory.
    ///
    /// Uses a symlink; falls back to a copy where links are unsupported. An
    /// earlier mount of the same name is replaced, never written through.
    pub fn mount(&self, source: &Path, name: &str) -> Result<PathBuf, SetupError> {
        let target = self.path().join(name);
        let mount_err = |err: io::Error| SetupError::Mount {
            source_path: source.to_path_buf(),
            target: target.clone(),
            source: err,
        };

        unmount(&target).map_err(mount_err)?;

        match symlink(source, &target) {
            Ok(()) => {}
            Err(e) if links_unsupported(&e) => {
                warn!(
                    source = %source.display(),
                    error = %e,
                    "Symlink failed, copying instead"
                );
                copy_recursive(source, &target).map_err(mount_err)?;
            }
            Err(e) => return Err(mount_err(e)),
        }
        Ok(target)
    }
}

/// Remove a previous mount at `target` without following links
fn unmount(target: &Path) -> io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target),
        Ok(_) => fs::remove_file(target),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn links_unsupported(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::Unsupported => true,
        // Windows refuses symlinks without developer mode
        io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => false,
    }
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}

#[cfg(not(any(unix, windows)))]
fn symlink(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn copy_recursive(source: &Path, target: &Path) -> io::Result<()> {
    if target.exists() && target.canonicalize()? == source.canonicalize()? {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "mount target resolves to its own source",
        ));
    }
    if source.is_file() {
        fs::copy(source, target)?;
        return Ok(());
    }
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(io::Error::other)?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Host project files mounted into every work directory
#[derive(Debug, Clone)]
pub struct HostProject {
    /// Project root searched first
    pub base_dir: PathBuf,
    /// Second location for the manifest and lockfile
    pub fallback_dir: Option<PathBuf>,
}

impl HostProject {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fallback_dir: None,
        }
    }

    pub fn with_fallback(mut self, dir: Option<PathBuf>) -> Self {
        self.fallback_dir = dir;
        self
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        std::iter::once(&self.base_dir)
            .chain(self.fallback_dir.as_ref())
            .map(|d| d.join(name))
            .collect()
    }

    /// The package manifest; required
    pub fn manifest(&self) -> Result<PathBuf, SetupError> {
        let searched = self.candidates(MANIFEST_FILE);
        let found = searched.iter().find(|p| p.is_file()).cloned();
        found.ok_or(SetupError::ManifestMissing { searched })
    }

    pub fn lockfile(&self) -> Option<PathBuf> {
        self.candidates(LOCK_FILE).into_iter().find(|p| p.is_file())
    }

    /// Pre-installed dependencies, only ever taken from the base directory
    pub fn dependency_cache(&self) -> Option<PathBuf> {
        let path = self.base_dir.join(DEPENDENCY_CACHE_DIR);
        path.is_dir().then_some(path)
    }
}
