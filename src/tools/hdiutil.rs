//! Disk image attach/detach using the native hdiutil tool.

use super::ImageMounter;
use super::command::{self, Args};
use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use wait_timeout::ChildExt;

const TOOL: &str = "hdiutil";

/// [`ImageMounter`] backed by `hdiutil`
#[derive(Debug, Clone)]
pub struct Hdiutil {
    program: PathBuf,
    detach_timeout: Duration,
}

impl Hdiutil {
    /// Create a mounter running `program`; `detach_timeout` bounds each
    /// synchronous detach attempt.
    pub fn new(program: PathBuf, detach_timeout: Duration) -> Self {
        Self {
            program,
            detach_timeout,
        }
    }

    /// Run a detach synchronously, killing it after the configured timeout.
    ///
    /// Returns true when hdiutil reported success.
    fn detach_with_timeout(&self, mount_path: &Path, force: bool) -> bool {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.arg("detach").arg(mount_path);
        if force {
            cmd.arg("-force");
        }

        let mut child = match cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                log::warn!("Could not run {} detach: {}", self.program.display(), e);
                return false;
            }
        };

        match child.wait_timeout(self.detach_timeout) {
            Ok(Some(status)) => status.success(),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!(
                    "Timed out detaching {} after {} seconds",
                    mount_path.display(),
                    self.detach_timeout.as_secs()
                );
                false
            }
            Err(_) => {
                let _ = child.kill();
                let _ = child.wait();
                false
            }
        }
    }
}

/// Argument vector for `hdiutil attach`
///
/// -nobrowse keeps the volume out of Finder; -noautoopen stops it from opening
/// a window on a logged-in desktop.
fn attach_args(image: &Path, mount_point: &Path) -> Args {
    Args::new()
        .arg("attach")
        .arg(image)
        .arg("-nobrowse")
        .arg("-readonly")
        .arg("-noverify")
        .arg("-noautoopen")
        .arg("-mountpoint")
        .arg(mount_point)
}

/// True when a filesystem other than the parent's is mounted at `path`.
#[cfg(unix)]
fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(parent) = path.parent() else {
        return false;
    };
    match (std::fs::metadata(path), std::fs::metadata(parent)) {
        (Ok(dir), Ok(parent)) => dir.is_dir() && dir.dev() != parent.dev(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(path: &Path) -> bool {
    path.is_dir()
}

impl ImageMounter for Hdiutil {
    async fn attach(&self, image: &Path, mount_point: &Path) -> Result<PathBuf> {
        log::info!("Mounting {} at {}", image.display(), mount_point.display());

        command::run(TOOL, &self.program, &attach_args(image, mount_point))
            .await
            .map_err(|failure| failure.into_mount_failure(image))?;

        // Multi-partition images can attach cleanly without mounting anything
        // at the requested point.
        if !is_mount_point(mount_point) {
            return Err(ConvertError::MountFailure {
                image: image.to_path_buf(),
                reason: format!("no volume mounted at {} after attach", mount_point.display()),
                exit_code: None,
            });
        }

        Ok(mount_point.to_path_buf())
    }

    async fn detach(&self, mount_path: &Path) -> Result<()> {
        log::debug!("Detaching {}", mount_path.display());

        let args = Args::new().arg("detach").arg(mount_path);
        let Err(first) = command::run(TOOL, &self.program, &args).await else {
            return Ok(());
        };
        log::warn!("Detach of {} had issues: {}", mount_path.display(), first.reason);

        let args = args.arg("-force");
        command::run(TOOL, &self.program, &args)
            .await
            .map(|_| ())
            .map_err(|failure| failure.into_build_failure())
    }

    fn detach_blocking(&self, mount_path: &Path) {
        if self.detach_with_timeout(mount_path, false) {
            return;
        }
        if !self.detach_with_timeout(mount_path, true) {
            log::warn!(
                "Failed to detach {}; it may still be mounted",
                mount_path.display()
            );
        }
    }
}
