//! Content classification of a mounted volume.
//!
//! Searches run in a fixed priority order and stop at the first hit:
//!
//! 1. a `.pkg` / `.mpkg` file within `depth` levels of the root
//! 2. an `.app` directory within `depth` levels of the root
//! 3. a well-known install directory (`Applications`, `Library`, ...) directly
//!    under the root
//!
//! Both bounded searches are breadth-first, and entries of a directory are
//! visited in name order, so "first" is stable for a given volume. Volume
//! metadata (`.Trashes`, `.fseventsd`, AppleDouble `._*` files, ...) is
//! skipped; other dot-prefixed entries are searched like any other.

use crate::config::{self, DEFAULT_EXCLUDED_NAMES, Settings};
use crate::error::{ErrorExt, Result};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::fs::FileType;
use std::path::{Path, PathBuf};

/// Top-level directory names that mark a volume as a payload tree
pub const PAYLOAD_DIRS: &[&str] = &[
    "Applications",
    "Library",
    "System",
    "usr",
    "opt",
    "bin",
    "sbin",
    "etc",
    "private",
];

/// What a mounted volume contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// An existing installer package
    InstallerPackage(PathBuf),
    /// An application bundle
    ApplicationBundle(PathBuf),
    /// The volume root, laid out as an install tree
    PayloadRoot(PathBuf),
    /// Nothing recognisable
    NoMatch,
}

impl Classification {
    /// Short label used in output
    pub fn label(&self) -> &'static str {
        match self {
            Classification::InstallerPackage(_) => "installer package",
            Classification::ApplicationBundle(_) => "application bundle",
            Classification::PayloadRoot(_) => "payload root",
            Classification::NoMatch => "no match",
        }
    }

    /// Path of the matched source, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Classification::InstallerPackage(p)
            | Classification::ApplicationBundle(p)
            | Classification::PayloadRoot(p) => Some(p),
            Classification::NoMatch => None,
        }
    }
}

/// Classifies volume contents
#[derive(Debug, Clone)]
pub struct Classifier {
    depth: usize,
    payload_dirs: Vec<String>,
    excluded_names: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(3, &[])
    }
}

impl Classifier {
    /// Create a classifier searching `depth` levels, recognising the standard
    /// payload directories plus `extra_payload_dirs`.
    pub fn new(depth: usize, extra_payload_dirs: &[String]) -> Self {
        let mut payload_dirs: Vec<String> =
            PAYLOAD_DIRS.iter().map(|d| (*d).to_string()).collect();
        payload_dirs.extend(extra_payload_dirs.iter().cloned());
        Self {
            depth,
            payload_dirs,
            excluded_names: DEFAULT_EXCLUDED_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }

    /// Replace the metadata names skipped during the searches
    pub fn with_excluded_names(mut self, excluded_names: &[String]) -> Self {
        self.excluded_names = excluded_names.to_vec();
        self
    }

    /// Classifier configured from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.search_depth, &settings.extra_payload_dirs)
            .with_excluded_names(&settings.excluded_names)
    }

    /// Classify the volume mounted at `root`.
    pub fn classify(&self, root: &Path) -> Result<Classification> {
        let pkg = self.breadth_first(root, is_package_file, |name, _| !is_package_name(name))?;
        if let Some(pkg) = pkg {
            return Ok(Classification::InstallerPackage(pkg));
        }

        let app = self.breadth_first(root, is_app_bundle, |name, _| !has_extension(name, "app"))?;
        if let Some(app) = app {
            return Ok(Classification::ApplicationBundle(app));
        }

        if self.has_payload_dir(root) {
            return Ok(Classification::PayloadRoot(root.to_path_buf()));
        }

        Ok(Classification::NoMatch)
    }

    /// Breadth-first search of entries at depths `1..=self.depth`.
    ///
    /// Symlinks are never followed and excluded metadata entries are skipped.
    /// Only directories accepted by `descend` are queued.
    fn breadth_first<M, D>(&self, root: &Path, matches: M, descend: D) -> Result<Option<PathBuf>>
    where
        M: Fn(&OsStr, FileType) -> bool,
        D: Fn(&OsStr, FileType) -> bool,
    {
        let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);

        while let Some((dir, depth)) = queue.pop_front() {
            let entries = match read_sorted(&dir) {
                Ok(entries) => entries,
                Err(e) if depth == 0 => return Err(e),
                Err(e) => {
                    log::debug!("Skipping unreadable directory: {}", e);
                    continue;
                }
            };

            for (path, file_type) in entries {
                let Some(name) = path.file_name() else {
                    continue;
                };
                if config::is_excluded(name, &self.excluded_names) {
                    continue;
                }
                if matches(name, file_type) {
                    log::debug!("Matched {} at depth {}", path.display(), depth + 1);
                    return Ok(Some(path));
                }
                if file_type.is_dir() && depth + 1 < self.depth && descend(name, file_type) {
                    queue.push_back((path, depth + 1));
                }
            }
        }

        Ok(None)
    }

    fn has_payload_dir(&self, root: &Path) -> bool {
        self.payload_dirs.iter().any(|name| {
            std::fs::symlink_metadata(root.join(name))
                .map(|meta| meta.file_type().is_dir())
                .unwrap_or(false)
        })
    }
}

/// Directory entries sorted by name, with their (unfollowed) file types
fn read_sorted(dir: &Path) -> Result<Vec<(PathBuf, FileType)>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).fs_context("reading directory", dir)? {
        let entry = entry.fs_context("reading directory", dir)?;
        let file_type = entry.file_type().fs_context("inspecting", entry.path())?;
        entries.push((entry.path(), file_type));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

fn has_extension(name: &OsStr, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn is_package_name(name: &OsStr) -> bool {
    has_extension(name, "pkg") || has_extension(name, "mpkg")
}

fn is_package_file(name: &OsStr, file_type: FileType) -> bool {
    file_type.is_file() && is_package_name(name)
}

fn is_app_bundle(name: &OsStr, file_type: FileType) -> bool {
    file_type.is_dir() && has_extension(name, "app")
}
