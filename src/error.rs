//! Error types for dmgpkg conversions.
//!
//! Every failure a conversion can hit is a [`ConvertError`] variant. Each variant
//! maps onto a process exit status through [`ConvertError::exit_code`], so the CLI
//! never has to inspect messages to decide how to exit.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Result type alias for dmgpkg operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Exit status used when the run was interrupted by a signal.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Main error type for all dmgpkg operations
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Malformed invocation
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// Input disk image does not exist or is not a regular file
    #[error("Source image not found: {}", path.display())]
    SourceNotFound {
        /// Path that was given as the source image
        path: PathBuf,
    },

    /// The image mount service failed to attach the disk image
    #[error("Failed to mount {}: {reason}", image.display())]
    MountFailure {
        /// Disk image being attached
        image: PathBuf,
        /// Tool output or spawn error
        reason: String,
        /// Exit status of the mount tool, if it exited normally
        exit_code: Option<i32>,
    },

    /// No installer package, application bundle or payload tree was found
    #[error(
        "No installer package, application bundle, or payload directories found in {}",
        image.display()
    )]
    ClassificationFailure {
        /// Disk image that was inspected
        image: PathBuf,
    },

    /// A packaging or signing tool returned a nonzero status
    #[error("{tool} failed: {reason}")]
    BuildFailure {
        /// Tool that failed (pkgbuild, productbuild, ...)
        tool: String,
        /// Tool output or spawn error
        reason: String,
        /// Exit status of the tool, if it exited normally
        exit_code: Option<i32>,
    },

    /// A required host tool could not be resolved
    #[error("Required tool '{tool}' not found: {reason}")]
    MissingTool {
        /// Tool name
        tool: String,
        /// Resolution error
        reason: String,
    },

    /// Settings file could not be read or parsed
    #[error("Invalid configuration {}: {reason}", path.display())]
    Config {
        /// Settings file path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// File system error with path context
    #[error("{context} {}: {error}", path.display())]
    Fs {
        /// Operation being performed (e.g. "copying installer package")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// IO errors without path context
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Directory traversal errors
    #[error("Traversal error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The run was interrupted before it completed
    #[error("Interrupted")]
    Interrupted,
}

impl ConvertError {
    /// Process exit status for this error.
    ///
    /// Tool failures propagate the tool's own status; a tool killed by a signal
    /// (or one that never started) maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvertError::InvalidArguments { .. } | ConvertError::Config { .. } => 2,
            ConvertError::SourceNotFound { .. } => 1,
            ConvertError::ClassificationFailure { .. } => 3,
            ConvertError::MountFailure { exit_code, .. }
            | ConvertError::BuildFailure { exit_code, .. } => {
                exit_code.filter(|code| *code != 0).unwrap_or(1)
            }
            ConvertError::Interrupted => EXIT_INTERRUPTED,
            ConvertError::MissingTool { .. }
            | ConvertError::Fs { .. }
            | ConvertError::Io(_)
            | ConvertError::Walk(_) => 1,
        }
    }

    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            ConvertError::SourceNotFound { .. } => vec![
                "Check the path to the .dmg file".to_string(),
            ],
            ConvertError::MountFailure { image, .. } => vec![
                format!("Verify the image opens manually: hdiutil imageinfo {}", image.display()),
                "Images with a license agreement or encryption cannot be attached unattended"
                    .to_string(),
            ],
            ConvertError::ClassificationFailure { .. } => vec![
                "The image must contain a .pkg/.mpkg, an .app, or top-level install \
                 directories such as Applications or Library"
                    .to_string(),
            ],
            ConvertError::MissingTool { tool, .. } => vec![
                format!(
                    "Install the Xcode Command Line Tools to get '{tool}': xcode-select --install"
                ),
                "Or point the settings file at the tool with the [tools] table".to_string(),
            ],
            ConvertError::BuildFailure { tool, .. } if tool == "productbuild" => vec![
                "If signing, confirm the identity exists: security find-identity -v".to_string(),
            ],
            _ => vec![],
        }
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g. "reading file", "creating directory".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| ConvertError::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_for_fixed_kinds() {
        let invalid = ConvertError::InvalidArguments {
            reason: "x".into(),
        };
        let missing = ConvertError::SourceNotFound {
            path: "/nope.dmg".into(),
        };
        let no_match = ConvertError::ClassificationFailure {
            image: "/a.dmg".into(),
        };
        assert_eq!(invalid.exit_code(), 2);
        assert_eq!(missing.exit_code(), 1);
        assert_eq!(no_match.exit_code(), 3);
        assert_eq!(ConvertError::Interrupted.exit_code(), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_tool_exit_code_is_propagated() {
        let err = ConvertError::BuildFailure {
            tool: "pkgbuild".into(),
            reason: "boom".into(),
            exit_code: Some(42),
        };
        assert_eq!(err.exit_code(), 42);
    }

    #[test]
    fn test_signalled_tool_maps_to_one() {
        let err = ConvertError::MountFailure {
            image: "/a.dmg".into(),
            reason: "killed".into(),
            exit_code: None,
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_fs_context_keeps_path() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = result.fs_context("reading settings", "/etc/x.toml").unwrap_err();
        assert_eq!(err.to_string(), "reading settings /etc/x.toml: gone");
    }
}
