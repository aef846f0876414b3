//! # dmgpkg
//!
//! Converts a macOS disk-image installer (DMG) into an installer package (PKG)
//! for enterprise deployment tools.
//!
//! The disk image is mounted read-only and classified into one of three shapes,
//! checked in this order:
//!
//! - **Installer package**: a `.pkg`/`.mpkg` within three levels of the root is
//!   copied as-is, and re-wrapped through `productbuild` when a signing
//!   identity is given.
//! - **Application bundle**: an `.app` within three levels is built into a
//!   component package installing to `/Applications`, then wrapped into a
//!   distribution package.
//! - **Payload root**: a volume whose root holds install directories such as
//!   `Applications` or `Library` is copied (minus Finder metadata) and built
//!   as a root-mode package installing at `/`.
//!
//! ## Usage
//!
//! ```bash
//! dmgpkg Foo.dmg com.example.foo 2.0 Foo-2.0.pkg
//! dmgpkg Foo.dmg com.example.foo 2.0 Foo-2.0.pkg --sign "Developer ID Installer: Example"
//! dmgpkg Foo.dmg com.example.foo 2.0 Foo-2.0.pkg --classify-only
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use dmgpkg::{ConversionRequest, Converter, HostToolchain, Settings};
//!
//! # async fn example() -> dmgpkg::Result<()> {
//! let settings = Settings::default();
//! let converter = Converter::new(HostToolchain::host(&settings)?, settings);
//! let request = ConversionRequest::new("Foo.dmg", "com.example.foo", "2.0", "Foo-2.0.pkg");
//! let built = converter.convert(&request).await?;
//! println!("Created {}", built.path.display());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod preflight;
pub mod tools;
pub mod utils;

pub use config::Settings;
pub use convert::{BuildOutput, Classification, Classifier, ConversionRequest, Converter};
pub use error::{ConvertError, Result};
pub use tools::{DistributionWrapper, HostToolchain, ImageMounter, PackageBuilder, Toolchain};
