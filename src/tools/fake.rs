//! In-memory collaborators for converter tests.
//!
//! The fake mounter "attaches" an image by handing back a prepared directory.
//! The fake builder and wrapper write small text packages describing what they
//! were asked to do, so tests can assert on the output file alone.

use super::{
    ComponentBuild, DistributionWrapper, ImageMounter, PackageBuilder, RootBuild, Toolchain,
};
use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) type FakeToolchain = Toolchain<FakeMounter, FakeBuilder, FakeWrapper>;

pub(crate) fn toolchain(volume: &Path) -> FakeToolchain {
    Toolchain {
        mounter: FakeMounter::new(volume),
        builder: FakeBuilder::default(),
        wrapper: FakeWrapper::default(),
    }
}

#[derive(Debug)]
pub(crate) struct FakeMounter {
    volume: PathBuf,
    pub(crate) fail_attach: bool,
    pub(crate) mount_points: Mutex<Vec<PathBuf>>,
    pub(crate) attached: AtomicUsize,
    pub(crate) detached: AtomicUsize,
    pub(crate) detached_blocking: AtomicUsize,
}

impl FakeMounter {
    pub(crate) fn new(volume: &Path) -> Self {
        Self {
            volume: volume.to_path_buf(),
            fail_attach: false,
            mount_points: Mutex::new(Vec::new()),
            attached: AtomicUsize::new(0),
            detached: AtomicUsize::new(0),
            detached_blocking: AtomicUsize::new(0),
        }
    }

    /// Attaches minus detaches of either kind
    pub(crate) fn still_attached(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
            - self.detached.load(Ordering::SeqCst)
            - self.detached_blocking.load(Ordering::SeqCst)
    }

    pub(crate) fn last_mount_point(&self) -> Option<PathBuf> {
        self.mount_points.lock().unwrap().last().cloned()
    }
}

impl ImageMounter for FakeMounter {
    async fn attach(&self, image: &Path, mount_point: &Path) -> Result<PathBuf> {
        self.mount_points
            .lock()
            .unwrap()
            .push(mount_point.to_path_buf());
        if self.fail_attach {
            return Err(ConvertError::MountFailure {
                image: image.to_path_buf(),
                reason: "simulated attach failure".into(),
                exit_code: Some(1),
            });
        }
        self.attached.fetch_add(1, Ordering::SeqCst);
        Ok(self.volume.clone())
    }

    async fn detach(&self, _mount_path: &Path) -> Result<()> {
        self.detached.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn detach_blocking(&self, _mount_path: &Path) {
        self.detached_blocking.fetch_add(1, Ordering::SeqCst);
    }
}

/// How a fake tool behaves when invoked
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behaviour {
    #[default]
    Succeed,
    /// Write a partial file, then fail with this exit code
    Fail(i32),
    /// Never complete
    Hang,
}

async fn act(behaviour: Behaviour, tool: &str, output: &Path, contents: String) -> Result<()> {
    match behaviour {
        Behaviour::Succeed => {
            std::fs::write(output, contents)?;
            Ok(())
        }
        Behaviour::Fail(code) => {
            std::fs::write(output, "partial")?;
            Err(ConvertError::BuildFailure {
                tool: tool.to_string(),
                reason: "simulated failure".into(),
                exit_code: Some(code),
            })
        }
        Behaviour::Hang => std::future::pending().await,
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeBuilder {
    pub(crate) behaviour: Behaviour,
    /// Relative paths of every file in the root at build time
    pub(crate) root_listing: Mutex<Vec<String>>,
    pub(crate) scripts_seen: Mutex<Option<PathBuf>>,
}

impl PackageBuilder for FakeBuilder {
    async fn build_component(&self, build: ComponentBuild<'_>) -> Result<()> {
        let name = build
            .component
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let contents = format!(
            "component {} -> {} id={} version={} sign={}\n",
            name,
            build.install_location,
            build.identifier,
            build.version,
            build.signing_identity.unwrap_or("-")
        );
        act(self.behaviour, "pkgbuild", build.output, contents).await
    }

    async fn build_from_root(&self, build: RootBuild<'_>) -> Result<()> {
        let mut listing: Vec<String> = walkdir::WalkDir::new(build.root)
            .min_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(build.root)
                    .ok()
                    .map(|p| p.to_string_lossy().into_owned())
            })
            .collect();
        listing.sort();
        *self.root_listing.lock().unwrap() = listing.clone();
        *self.scripts_seen.lock().unwrap() = build.scripts.map(Path::to_path_buf);

        let contents = format!(
            "root -> {} id={} version={} sign={}\n{}\n",
            build.install_location,
            build.identifier,
            build.version,
            build.signing_identity.unwrap_or("-"),
            listing.join("\n")
        );
        act(self.behaviour, "pkgbuild", build.output, contents).await
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeWrapper {
    pub(crate) behaviour: Behaviour,
    pub(crate) calls: AtomicUsize,
}

impl DistributionWrapper for FakeWrapper {
    async fn wrap(
        &self,
        input: &Path,
        signing_identity: Option<&str>,
        output: &Path,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let inner = std::fs::read_to_string(input)?;
        let contents = format!("distribution sign={}\n{}", signing_identity.unwrap_or("-"), inner);
        act(self.behaviour, "productbuild", output, contents).await
    }
}
