//! Command line argument parsing and validation.

use crate::convert::ConversionRequest;
use crate::error::{ConvertError, Result};
use clap::Parser;
use std::path::PathBuf;

/// Convert a macOS disk image installer into an installer package
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "dmgpkg",
    version,
    about = "Convert a macOS disk image (DMG) into an installer package (PKG)",
    long_about = "Convert a macOS disk image (DMG) into an installer package (PKG).

The image is mounted read-only and its contents decide the package:
  - an embedded .pkg/.mpkg is copied (and re-signed with --sign)
  - an .app bundle is packaged to install into /Applications
  - top-level install directories (Applications, Library, usr, ...) are
    packaged as a payload rooted at /

Usage:
  dmgpkg Foo.dmg com.example.foo 2.0 Foo-2.0.pkg
  dmgpkg Foo.dmg com.example.foo 2.0 Foo-2.0.pkg --sign \"Developer ID Installer: Example\""
)]
pub struct Args {
    /// Disk image to convert
    #[arg(index = 1, value_name = "INPUT_IMAGE")]
    pub input: PathBuf,

    /// Package identifier (reverse-DNS)
    #[arg(index = 2, value_name = "IDENTIFIER")]
    pub identifier: String,

    /// Package version
    #[arg(index = 3, value_name = "VERSION")]
    pub package_version: String,

    /// Output package path
    #[arg(index = 4, value_name = "OUTPUT_PACKAGE")]
    pub output: PathBuf,

    /// Installer signing identity name
    #[arg(long, value_name = "IDENTITY", env = "DMGPKG_SIGN_IDENTITY")]
    pub sign: Option<String>,

    /// Directory of install scripts (preinstall/postinstall) for payload packages
    #[arg(long, value_name = "DIR")]
    pub scripts: Option<PathBuf>,

    /// Settings file
    #[arg(long, value_name = "FILE", env = "DMGPKG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only report how the image would be packaged
    #[arg(long)]
    pub classify_only: bool,

    /// Suppress progress output (errors are still shown)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<()> {
        if self.sign.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConvertError::InvalidArguments {
                reason: "--sign requires a non-empty identity".to_string(),
            });
        }
        Ok(())
    }

    /// The conversion these arguments describe
    pub fn request(&self) -> ConversionRequest {
        ConversionRequest::new(
            &self.input,
            &self.identifier,
            &self.package_version,
            &self.output,
        )
        .with_signing_identity(self.sign.clone())
        .with_scripts(self.scripts.clone())
    }
}
