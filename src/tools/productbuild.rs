//! Distribution wrapping and signing using productbuild.

use super::DistributionWrapper;
use super::command::{self, Args};
use crate::error::Result;
use std::path::{Path, PathBuf};

const TOOL: &str = "productbuild";

/// [`DistributionWrapper`] backed by `productbuild`
#[derive(Debug, Clone)]
pub struct Productbuild {
    program: PathBuf,
}

impl Productbuild {
    /// Create a wrapper running `program`
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }
}

fn wrap_args(input: &Path, signing_identity: Option<&str>, output: &Path) -> Args {
    Args::new()
        .arg("--package")
        .arg(input)
        .opt("--sign", signing_identity)
        .arg(output)
}

impl DistributionWrapper for Productbuild {
    async fn wrap(
        &self,
        input: &Path,
        signing_identity: Option<&str>,
        output: &Path,
    ) -> Result<()> {
        match signing_identity {
            Some(identity) => log::info!("Wrapping {} signed by '{}'", input.display(), identity),
            None => log::info!("Wrapping {} (unsigned)", input.display()),
        }

        command::run(TOOL, &self.program, &wrap_args(input, signing_identity, output))
            .await
            .map(|_| ())
            .map_err(|failure| failure.into_build_failure())
    }
}
