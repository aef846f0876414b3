//! RAII guard for an attached disk image.
//!
//! Ensures the volume is detached on every exit path. The normal path calls
//! [`MountedVolume::release`] and awaits the detach; if the guard is dropped
//! without that (early return, panic, or the conversion future being dropped
//! on interrupt) it falls back to the mounter's bounded synchronous detach.

use crate::error::Result;
use crate::tools::ImageMounter;
use std::path::{Path, PathBuf};

/// A disk image attached for the duration of a conversion
pub struct MountedVolume<'a, M: ImageMounter> {
    mounter: &'a M,
    path: PathBuf,
    attached: bool,
}

impl<'a, M: ImageMounter> MountedVolume<'a, M> {
    /// Attach `image` at `mount_point`
    pub async fn attach(mounter: &'a M, image: &Path, mount_point: &Path) -> Result<Self> {
        let path = mounter.attach(image, mount_point).await?;
        Ok(Self {
            mounter,
            path,
            attached: true,
        })
    }

    /// Root of the mounted volume
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Detach the volume. Failures are logged, never returned, so cleanup
    /// cannot mask the result of the conversion.
    pub async fn release(mut self) {
        if let Err(e) = self.mounter.detach(&self.path).await {
            log::warn!("Failed to detach {}: {}", self.path.display(), e);
        }
        self.attached = false;
    }
}

impl<M: ImageMounter> Drop for MountedVolume<'_, M> {
    fn drop(&mut self) {
        if self.attached {
            log::debug!("Detaching {} from cleanup path", self.path.display());
            self.mounter.detach_blocking(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::fake::FakeMounter;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_release_detaches_once() {
        let vol = tempfile::tempdir().unwrap();
        let mounter = FakeMounter::new(vol.path());

        let volume = MountedVolume::attach(&mounter, Path::new("a.dmg"), Path::new("/mnt"))
            .await
            .unwrap();
        assert_eq!(volume.path(), vol.path());
        volume.release().await;

        assert_eq!(mounter.detached.load(Ordering::SeqCst), 1);
        assert_eq!(mounter.detached_blocking.load(Ordering::SeqCst), 0);
        assert_eq!(mounter.still_attached(), 0);
    }

    #[tokio::test]
    async fn test_drop_without_release_detaches_blocking() {
        let vol = tempfile::tempdir().unwrap();
        let mounter = FakeMounter::new(vol.path());

        {
            let _volume = MountedVolume::attach(&mounter, Path::new("a.dmg"), Path::new("/mnt"))
                .await
                .unwrap();
        }

        assert_eq!(mounter.detached_blocking.load(Ordering::SeqCst), 1);
        assert_eq!(mounter.still_attached(), 0);
    }

    #[tokio::test]
    async fn test_failed_attach_leaves_nothing_to_detach() {
        let vol = tempfile::tempdir().unwrap();
        let mut mounter = FakeMounter::new(vol.path());
        mounter.fail_attach = true;

        let result = MountedVolume::attach(&mounter, Path::new("a.dmg"), Path::new("/mnt")).await;
        assert!(result.is_err());
        assert_eq!(mounter.detached.load(Ordering::SeqCst), 0);
        assert_eq!(mounter.detached_blocking.load(Ordering::SeqCst), 0);
    }
}
