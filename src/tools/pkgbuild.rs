//! Component and root-mode package builds using pkgbuild.

use super::command::{self, Args};
use super::{ComponentBuild, PackageBuilder, RootBuild};
use crate::error::Result;
use std::path::PathBuf;

const TOOL: &str = "pkgbuild";

/// [`PackageBuilder`] backed by `pkgbuild`
#[derive(Debug, Clone)]
pub struct Pkgbuild {
    program: PathBuf,
}

impl Pkgbuild {
    /// Create a builder running `program`
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    async fn run(&self, args: Args) -> Result<()> {
        command::run(TOOL, &self.program, &args)
            .await
            .map(|_| ())
            .map_err(|failure| failure.into_build_failure())
    }
}

/// Argument vector for `pkgbuild --component`
fn component_args(build: &ComponentBuild<'_>) -> Args {
    Args::new()
        .arg("--component")
        .arg(build.component)
        .arg("--install-location")
        .arg(build.install_location)
        .arg("--identifier")
        .arg(build.identifier)
        .arg("--version")
        .arg(build.version)
        .opt("--sign", build.signing_identity)
        .arg(build.output)
}

/// Argument vector for `pkgbuild --root`
fn root_args(build: &RootBuild<'_>) -> Args {
    Args::new()
        .arg("--root")
        .arg(build.root)
        .arg("--install-location")
        .arg(build.install_location)
        .arg("--identifier")
        .arg(build.identifier)
        .arg("--version")
        .arg(build.version)
        .opt("--scripts", build.scripts)
        .opt("--sign", build.signing_identity)
        .arg(build.output)
}

impl PackageBuilder for Pkgbuild {
    async fn build_component(&self, build: ComponentBuild<'_>) -> Result<()> {
        log::info!(
            "Building component package for {} ({} {})",
            build.component.display(),
            build.identifier,
            build.version
        );
        self.run(component_args(&build)).await
    }

    async fn build_from_root(&self, build: RootBuild<'_>) -> Result<()> {
        log::info!(
            "Building package from root {} ({} {})",
            build.root.display(),
            build.identifier,
            build.version
        );
        self.run(root_args(&build)).await
    }
}
