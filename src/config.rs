//! Conversion settings.
//!
//! Settings come from an optional TOML file. Every field has a default, so an
//! empty file (or no file at all) yields the standard behaviour:
//!
//! ```toml
//! app_install_location = "/Applications"
//! search_depth = 3
//! extra_payload_dirs = ["Users"]
//! detach_timeout_secs = 10
//!
//! [tools]
//! pkgbuild = "/usr/bin/pkgbuild"
//! ```

use crate::error::{ConvertError, ErrorExt, Result};
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up under the user's config directory when no path is given.
const DEFAULT_FILE: &str = "dmgpkg/config.toml";

/// Names never copied into a payload staging directory.
///
/// These are Finder and volume metadata that only make sense on the disk image.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    ".DS_Store",
    ".VolumeIcon.icns",
    ".background",
    ".Trashes",
    ".fseventsd",
    ".Spotlight-V100",
    ".TemporaryItems",
    ".DocumentRevisions-V100",
];

/// Whether `name` is an AppleDouble `._*` file or appears in `excluded_names`.
pub fn is_excluded(name: &OsStr, excluded_names: &[String]) -> bool {
    let name = name.to_string_lossy();
    name.starts_with("._") || excluded_names.iter().any(|n| n.as_str() == name.as_ref())
}

/// Settings for a conversion run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Install location for packages built from an application bundle
    pub app_install_location: String,
    /// Install location for packages built from a payload root
    pub payload_install_location: String,
    /// Directory levels below the volume root searched for packages and apps
    pub search_depth: usize,
    /// Additional top-level directory names that mark a payload root
    pub extra_payload_dirs: Vec<String>,
    /// Entry names excluded from payload staging
    pub excluded_names: Vec<String>,
    /// Seconds to wait for a detach during interrupted cleanup before forcing it
    pub detach_timeout_secs: u64,
    /// Host tool overrides
    pub tools: ToolPaths,
}

/// Explicit paths for host tools; unset entries are resolved on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    /// Disk image tool
    pub hdiutil: Option<PathBuf>,
    /// Component / root package builder
    pub pkgbuild: Option<PathBuf>,
    /// Distribution package builder
    pub productbuild: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_install_location: "/Applications".to_string(),
            payload_install_location: "/".to_string(),
            search_depth: 3,
            extra_payload_dirs: Vec::new(),
            excluded_names: DEFAULT_EXCLUDED_NAMES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
            detach_timeout_secs: 10,
            tools: ToolPaths::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text. `origin` is only used for error messages.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        let settings: Settings = toml::from_str(text).map_err(|e| ConvertError::Config {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })?;
        settings.validate(origin)?;
        Ok(settings)
    }

    /// Load settings from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).fs_context("reading settings file", path)?;
        Self::from_toml(&text, path)
    }

    /// Load from `explicit` if given, otherwise from the user config directory
    /// when that file exists, otherwise defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match dirs::config_dir().map(|dir| dir.join(DEFAULT_FILE)) {
            Some(path) if path.is_file() => {
                log::debug!("Using settings from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Bounded wait used when detaching from a `Drop` path
    pub fn detach_timeout(&self) -> Duration {
        Duration::from_secs(self.detach_timeout_secs)
    }

    /// Whether an entry called `name` is volume metadata rather than content
    pub fn excludes(&self, name: &OsStr) -> bool {
        is_excluded(name, &self.excluded_names)
    }

    fn validate(&self, origin: &Path) -> Result<()> {
        let invalid = |reason: &str| ConvertError::Config {
            path: origin.to_path_buf(),
            reason: reason.to_string(),
        };

        if self.search_depth == 0 {
            return Err(invalid("search_depth must be at least 1"));
        }
        if !self.app_install_location.starts_with('/') {
            return Err(invalid("app_install_location must be an absolute path"));
        }
        if !self.payload_install_location.starts_with('/') {
            return Err(invalid("payload_install_location must be an absolute path"));
        }
        if self
            .extra_payload_dirs
            .iter()
            .any(|name| name.is_empty() || name.contains('/'))
        {
            return Err(invalid("extra_payload_dirs entries must be plain directory names"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml("", Path::new("x.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.search_depth, 3);
        assert_eq!(settings.app_install_location, "/Applications");
        assert_eq!(settings.payload_install_location, "/");
    }

    #[test]
    fn test_partial_file_overrides_fields() {
        let text = r#"
            search_depth = 5
            extra_payload_dirs = ["Users"]

            [tools]
            pkgbuild = "/opt/bin/pkgbuild"
        "#;
        let settings = Settings::from_toml(text, Path::new("x.toml")).unwrap();
        assert_eq!(settings.search_depth, 5);
        assert_eq!(settings.extra_payload_dirs, vec!["Users".to_string()]);
        assert_eq!(
            settings.tools.pkgbuild.as_deref(),
            Some(Path::new("/opt/bin/pkgbuild"))
        );
        assert_eq!(settings.tools.hdiutil, None);
        assert_eq!(settings.excluded_names.len(), DEFAULT_EXCLUDED_NAMES.len());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = Settings::from_toml("serch_depth = 2", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConvertError::Config { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = Settings::from_toml("search_depth = 0", Path::new("x.toml")).unwrap_err();
        assert!(err.to_string().contains("search_depth"));
    }

    #[test]
    fn test_relative_install_location_is_rejected() {
        let err = Settings::from_toml(
            r#"app_install_location = "Applications""#,
            Path::new("x.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("app_install_location"));
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Fs { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_excludes_metadata_and_appledouble() {
        let settings = Settings::default();
        assert!(settings.excludes(OsStr::new(".Trashes")));
        assert!(settings.excludes(OsStr::new("._Foo.pkg")));
        assert!(!settings.excludes(OsStr::new(".payload")));
        assert!(!settings.excludes(OsStr::new("Library")));
    }

    #[test]
    fn test_resolve_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "detach_timeout_secs = 2\n").unwrap();
        let settings = Settings::resolve(Some(&path)).unwrap();
        assert_eq!(settings.detach_timeout(), Duration::from_secs(2));
    }
}
