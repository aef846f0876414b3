//! DMG to PKG conversion.
//!
//! A conversion runs as one sequence:
//!
//! 1. Validate the [`ConversionRequest`]
//! 2. Create a private [`Scratch`] directory and stage install scripts
//! 3. Attach the disk image ([`MountedVolume`])
//! 4. Classify the volume ([`Classifier`])
//! 5. Build the package for that classification
//! 6. Move the package into place at the output path
//! 7. Detach the image and remove scratch space
//!
//! Step 7 runs on every exit path. A failed build never leaves a file at the
//! output path.

pub mod classify;
mod mount;
mod scratch;

pub use classify::{Classification, Classifier, PAYLOAD_DIRS};
pub use mount::MountedVolume;
pub use scratch::Scratch;

use crate::config::Settings;
use crate::error::{ConvertError, Result};
use crate::tools::{
    ComponentBuild, DistributionWrapper, ImageMounter, PackageBuilder, RootBuild, Toolchain,
};
use crate::utils::fs;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Everything needed to convert one disk image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Disk image to convert
    pub source_image: PathBuf,
    /// Reverse-DNS package identifier
    pub identifier: String,
    /// Package version
    pub version: String,
    /// Where the finished package is written
    pub output: PathBuf,
    /// Installer signing identity, by name
    pub signing_identity: Option<String>,
    /// Install scripts attached to payload builds
    pub scripts: Option<PathBuf>,
}

impl ConversionRequest {
    /// Create an unsigned request without scripts
    pub fn new(
        source_image: impl Into<PathBuf>,
        identifier: impl Into<String>,
        version: impl Into<String>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_image: source_image.into(),
            identifier: identifier.into(),
            version: version.into(),
            output: output.into(),
            signing_identity: None,
            scripts: None,
        }
    }

    /// Sign the result with `identity`
    pub fn with_signing_identity(mut self, identity: Option<String>) -> Self {
        self.signing_identity = identity;
        self
    }

    /// Attach the scripts in `dir` to payload builds
    pub fn with_scripts(mut self, dir: Option<PathBuf>) -> Self {
        self.scripts = dir;
        self
    }

    /// Fail with `SourceNotFound` unless the source image is a regular file.
    pub fn validate_source(&self) -> Result<()> {
        if !self.source_image.is_file() {
            return Err(ConvertError::SourceNotFound {
                path: self.source_image.clone(),
            });
        }
        Ok(())
    }

    /// Check the request before anything is mounted.
    pub fn validate(&self) -> Result<()> {
        self.validate_source()?;

        let invalid = |reason: String| Err(ConvertError::InvalidArguments { reason });

        if self.identifier.is_empty() || self.identifier.chars().any(char::is_whitespace) {
            return invalid(format!(
                "identifier '{}' must be a non-empty reverse-DNS string",
                self.identifier
            ));
        }
        if self.version.trim().is_empty() {
            return invalid("version must not be empty".to_string());
        }
        if self.output.is_dir() {
            return invalid(format!("output {} is a directory", self.output.display()));
        }
        if let Some(parent) = self.output.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return invalid(format!(
                "output directory {} does not exist",
                parent.display()
            ));
        }
        if let Some(scripts) = &self.scripts
            && !scripts.is_dir()
        {
            return invalid(format!(
                "scripts path {} is not a directory",
                scripts.display()
            ));
        }
        Ok(())
    }
}

/// The package produced by a conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Final package path
    pub path: PathBuf,
    /// What the package was built from, with paths relative to the volume root
    pub source: Classification,
}

/// Runs conversions against a set of tool collaborators
#[derive(Debug)]
pub struct Converter<M, B, W> {
    tools: Toolchain<M, B, W>,
    settings: Settings,
    classifier: Classifier,
}

impl<M, B, W> Converter<M, B, W>
where
    M: ImageMounter,
    B: PackageBuilder,
    W: DistributionWrapper,
{
    /// Create a converter
    pub fn new(tools: Toolchain<M, B, W>, settings: Settings) -> Self {
        let classifier = Classifier::from_settings(&settings);
        Self {
            tools,
            settings,
            classifier,
        }
    }

    /// The collaborators this converter runs against
    pub fn tools(&self) -> &Toolchain<M, B, W> {
        &self.tools
    }

    /// Convert the disk image named by `request` into a package.
    pub async fn convert(&self, request: &ConversionRequest) -> Result<BuildOutput> {
        request.validate()?;
        log::info!(
            "Converting {} -> {}",
            request.source_image.display(),
            request.output.display()
        );

        let scratch = Scratch::create()?;
        if let Some(scripts) = &request.scripts {
            fs::copy_dir_filtered(scripts, &scratch.scripts_dir(), |name| {
                self.is_excluded(name)
            })
            .await?;
        }

        let volume = MountedVolume::attach(
            &self.tools.mounter,
            &request.source_image,
            &scratch.mount_point(),
        )
        .await?;

        let result = self.build(request, &scratch, volume.path()).await;

        volume.release().await;
        scratch.close();
        result
    }

    /// Mount the image, classify it, and clean up without building anything.
    pub async fn inspect(&self, request: &ConversionRequest) -> Result<Classification> {
        request.validate_source()?;

        let scratch = Scratch::create()?;
        let volume = MountedVolume::attach(
            &self.tools.mounter,
            &request.source_image,
            &scratch.mount_point(),
        )
        .await?;

        let result = self
            .classify(volume.path())
            .await
            .map(|c| relative_to(c, volume.path()));

        volume.release().await;
        scratch.close();
        result
    }

    async fn classify(&self, root: &Path) -> Result<Classification> {
        let classifier = self.classifier.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || classifier.classify(&root))
            .await
            .map_err(|e| ConvertError::Io(std::io::Error::other(e)))?
    }

    async fn build(
        &self,
        request: &ConversionRequest,
        scratch: &Scratch,
        root: &Path,
    ) -> Result<BuildOutput> {
        let classification = self.classify(root).await?;
        log::info!(
            "Classified {} as {}",
            request.source_image.display(),
            classification.label()
        );

        let built = match &classification {
            Classification::InstallerPackage(pkg) => self.repackage(pkg, request, scratch).await?,
            Classification::ApplicationBundle(app) => {
                self.package_app(app, request, scratch).await?
            }
            Classification::PayloadRoot(payload) => {
                self.package_payload(payload, request, scratch).await?
            }
            Classification::NoMatch => {
                return Err(ConvertError::ClassificationFailure {
                    image: request.source_image.clone(),
                });
            }
        };

        fs::persist(&built, &request.output).await?;

        Ok(BuildOutput {
            path: request.output.clone(),
            source: relative_to(classification, root),
        })
    }

    /// Copy an embedded package, re-wrapping it only when it must be signed.
    /// The embedded package keeps its own identifier and version.
    async fn repackage(
        &self,
        pkg: &Path,
        request: &ConversionRequest,
        scratch: &Scratch,
    ) -> Result<PathBuf> {
        let ext = pkg
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or("pkg")
            .to_ascii_lowercase();
        let copied = scratch.out_dir().join(format!("embedded.{ext}"));
        fs::copy_file(pkg, &copied).await?;

        let Some(identity) = request.signing_identity.as_deref() else {
            return Ok(copied);
        };

        let signed = scratch.out_dir().join("distribution.pkg");
        self.tools.wrapper.wrap(&copied, Some(identity), &signed).await?;
        Ok(signed)
    }

    /// Component package for the app, always wrapped into a distribution package.
    async fn package_app(
        &self,
        app: &Path,
        request: &ConversionRequest,
        scratch: &Scratch,
    ) -> Result<PathBuf> {
        let component = scratch.out_dir().join("component.pkg");
        self.tools
            .builder
            .build_component(ComponentBuild {
                component: app,
                install_location: &self.settings.app_install_location,
                identifier: &request.identifier,
                version: &request.version,
                signing_identity: request.signing_identity.as_deref(),
                output: &component,
            })
            .await?;

        let distribution = scratch.out_dir().join("distribution.pkg");
        self.tools
            .wrapper
            .wrap(
                &component,
                request.signing_identity.as_deref(),
                &distribution,
            )
            .await?;
        Ok(distribution)
    }

    /// Root-mode package over a metadata-free copy of the volume.
    async fn package_payload(
        &self,
        payload: &Path,
        request: &ConversionRequest,
        scratch: &Scratch,
    ) -> Result<PathBuf> {
        let staging = scratch.staging_dir();
        log::info!("Staging payload from {}", payload.display());
        fs::copy_dir_filtered(payload, &staging, |name| self.is_excluded(name)).await?;

        let scripts_dir = scratch.scripts_dir();
        let scripts = scripts_dir.is_dir().then_some(scripts_dir.as_path());

        let output = scratch.out_dir().join("payload.pkg");
        self.tools
            .builder
            .build_from_root(RootBuild {
                root: &staging,
                install_location: &self.settings.payload_install_location,
                identifier: &request.identifier,
                version: &request.version,
                scripts,
                signing_identity: request.signing_identity.as_deref(),
                output: &output,
            })
            .await?;
        Ok(output)
    }

    /// Disk-image metadata that must not end up in a payload
    fn is_excluded(&self, name: &OsStr) -> bool {
        self.settings.excludes(name)
    }
}

/// Rebase classification paths onto the volume root
fn relative_to(classification: Classification, root: &Path) -> Classification {
    let rebase = |path: PathBuf| {
        path.strip_prefix(root)
            .map(Path::to_path_buf)
            .unwrap_or(path)
    };
    match classification {
        Classification::InstallerPackage(p) => Classification::InstallerPackage(rebase(p)),
        Classification::ApplicationBundle(p) => Classification::ApplicationBundle(rebase(p)),
        Classification::PayloadRoot(p) => Classification::PayloadRoot(rebase(p)),
        Classification::NoMatch => Classification::NoMatch,
    }
}
