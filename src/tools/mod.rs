//! External tool collaborators.
//!
//! The converter never shells out directly. It talks to three traits:
//!
//! | Trait | Host implementation | Role |
//! |-------|---------------------|------|
//! | [`ImageMounter`] | [`Hdiutil`] | attach / detach the disk image |
//! | [`PackageBuilder`] | [`Pkgbuild`] | component and root-mode packages |
//! | [`DistributionWrapper`] | [`Productbuild`] | distribution wrap and signing |
//!
//! Tests substitute fakes that simulate success or failure without touching a
//! real disk-image subsystem.

mod command;
#[cfg(test)]
pub(crate) mod fake;
mod hdiutil;
mod pkgbuild;
mod productbuild;

pub use hdiutil::Hdiutil;
pub use pkgbuild::Pkgbuild;
pub use productbuild::Productbuild;

use crate::config::Settings;
use crate::error::Result;
use crate::preflight;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Attaches disk images to the filesystem and detaches them again.
pub trait ImageMounter: Send + Sync {
    /// Attach `image` read-only at `mount_point` and return the path the volume
    /// is reachable under.
    fn attach(
        &self,
        image: &Path,
        mount_point: &Path,
    ) -> impl Future<Output = Result<PathBuf>> + Send;

    /// Detach a mounted volume. Best-effort; calling it on a volume that is
    /// already gone must not cause harm.
    fn detach(&self, mount_path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Synchronous detach for cleanup paths that cannot await (`Drop`).
    ///
    /// Must never panic and must return within a bounded time.
    fn detach_blocking(&self, mount_path: &Path);
}

/// Inputs for a component-mode package build
#[derive(Debug, Clone, Copy)]
pub struct ComponentBuild<'a> {
    /// Bundle to package (an `.app`)
    pub component: &'a Path,
    /// Directory the bundle is installed into
    pub install_location: &'a str,
    /// Reverse-DNS package identifier
    pub identifier: &'a str,
    /// Package version
    pub version: &'a str,
    /// Installer signing identity
    pub signing_identity: Option<&'a str>,
    /// Where to write the component package
    pub output: &'a Path,
}

/// Inputs for a root-mode package build
#[derive(Debug, Clone, Copy)]
pub struct RootBuild<'a> {
    /// Directory tree snapshotted as the payload
    pub root: &'a Path,
    /// Path the payload root maps onto at install time
    pub install_location: &'a str,
    /// Reverse-DNS package identifier
    pub identifier: &'a str,
    /// Package version
    pub version: &'a str,
    /// Directory of install scripts
    pub scripts: Option<&'a Path>,
    /// Installer signing identity
    pub signing_identity: Option<&'a str>,
    /// Where to write the package
    pub output: &'a Path,
}

/// Builds installer packages from bundles or directory trees.
pub trait PackageBuilder: Send + Sync {
    /// Build a component package from a single bundle.
    fn build_component(&self, build: ComponentBuild<'_>)
    -> impl Future<Output = Result<()>> + Send;

    /// Build a package by snapshotting a directory tree.
    fn build_from_root(&self, build: RootBuild<'_>) -> impl Future<Output = Result<()>> + Send;
}

/// Wraps a package into a distribution package, signing it when asked.
pub trait DistributionWrapper: Send + Sync {
    /// Wrap `input` into `output`.
    fn wrap(
        &self,
        input: &Path,
        signing_identity: Option<&str>,
        output: &Path,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The set of collaborators a conversion runs against
#[derive(Debug, Clone)]
pub struct Toolchain<M, B, W> {
    /// Image mount service
    pub mounter: M,
    /// Package builder tool
    pub builder: B,
    /// Distribution wrapper tool
    pub wrapper: W,
}

/// Toolchain backed by the macOS command line tools
pub type HostToolchain = Toolchain<Hdiutil, Pkgbuild, Productbuild>;

impl HostToolchain {
    /// Resolve every host tool, failing before anything is mounted if one is missing.
    pub fn host(settings: &Settings) -> Result<Self> {
        let tools = &settings.tools;
        let hdiutil = preflight::resolve_tool("hdiutil", tools.hdiutil.as_deref())?;
        let pkgbuild = preflight::resolve_tool("pkgbuild", tools.pkgbuild.as_deref())?;
        let productbuild = preflight::resolve_tool("productbuild", tools.productbuild.as_deref())?;

        Ok(Self {
            mounter: Hdiutil::new(hdiutil, settings.detach_timeout()),
            builder: Pkgbuild::new(pkgbuild),
            wrapper: Productbuild::new(productbuild),
        })
    }
}
