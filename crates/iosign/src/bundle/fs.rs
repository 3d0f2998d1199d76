//! File-system access to the bundle being signed.
//!
//! Paths are always bundle-relative and `/`-separated, regardless of the host
//! platform. Implementations must be `Sync` so members can be hashed in
//! parallel.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Suffix of the sibling file a member is staged in before it replaces the original.
const STAGING_SUFFIX: &str = ".iosign-tmp";

/// Read/write/enumerate access to the members of a bundle.
pub trait BundleFileSystem: Sync {
    /// Read a member in full.
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or replace a member.
    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()>;

    /// Whether a member exists.
    fn file_exists(&self, path: &str) -> bool;

    /// Every member file, in a stable order.
    fn enumerate_files(&self) -> Result<Vec<String>>;
}

/// A bundle backed by a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    /// Open the bundle rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Bundle root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|c| !c.is_empty())
            .fold(self.root.clone(), |acc, c| acc.join(c))
    }
}

impl BundleFileSystem for DirectoryBundle {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        if !full.is_file() {
            return Err(Error::FileNotFound(path.to_string()));
        }
        Ok(fs::read(full)?)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }

        // Replace through a sibling file so readers never see a partial member
        let mut staging = full.clone().into_os_string();
        staging.push(STAGING_SUFFIX);
        let staging = PathBuf::from(staging);
        fs::write(&staging, data)?;
        if let Err(e) = fs::rename(&staging, &full) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        Ok(())
    }

    fn file_exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn enumerate_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                Error::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "bundle walk failed")
                }))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            // Left behind by an interrupted write
            if entry.file_name().to_string_lossy().ends_with(STAGING_SUFFIX) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
        Ok(files)
    }
}

/// A bundle held entirely in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member, builder style.
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }

    /// All members.
    pub fn files(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.files
    }

    /// Consume the bundle, returning its members.
    pub fn into_files(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }
}

impl BundleFileSystem for MemoryBundle {
    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(path.to_string()))
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn enumerate_files(&self) -> Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }
}
