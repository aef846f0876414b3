//! Private scratch space for one conversion run.

use crate::error::{ErrorExt, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Uniquely named scratch directory, removed when dropped
///
/// Layout:
/// - `mnt/` mount point for the disk image
/// - `staging/` payload copy for root-mode builds
/// - `scripts/` install scripts attached to root-mode builds
/// - `out/` intermediate and finished packages
#[derive(Debug)]
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    /// Create a new scratch directory under the system temp dir
    pub fn create() -> Result<Self> {
        let base = std::env::temp_dir();
        let dir = tempfile::Builder::new()
            .prefix("dmgpkg-")
            .tempdir_in(&base)
            .fs_context("creating scratch directory in", &base)?;

        let scratch = Self { dir };
        for sub in [scratch.mount_point(), scratch.out_dir()] {
            std::fs::create_dir(&sub).fs_context("creating scratch directory", &sub)?;
        }
        log::debug!("Scratch directory: {}", scratch.path().display());
        Ok(scratch)
    }

    /// Root of the scratch directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the disk image is attached
    pub fn mount_point(&self) -> PathBuf {
        self.path().join("mnt")
    }

    /// Payload staging directory (created on demand)
    pub fn staging_dir(&self) -> PathBuf {
        self.path().join("staging")
    }

    /// Install scripts directory (present only when scripts were supplied)
    pub fn scripts_dir(&self) -> PathBuf {
        self.path().join("scripts")
    }

    /// Directory packages are built into
    pub fn out_dir(&self) -> PathBuf {
        self.path().join("out")
    }

    /// Remove the scratch directory, logging instead of failing.
    pub fn close(self) {
        let path = self.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            log::warn!("Failed to remove scratch directory {}: {}", path.display(), e);
        }
    }
}
