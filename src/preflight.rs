//! Host tool validation.
//!
//! Resolves the packaging tools before a disk image is mounted, so a missing
//! tool fails fast with a message naming it.

use crate::error::{ConvertError, Result};
use std::path::{Path, PathBuf};

/// Resolve `name` to an executable path.
///
/// An explicit override must point at an existing file; otherwise `name` is
/// looked up on `PATH`.
pub fn resolve_tool(name: &str, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            log::debug!("Using configured {}: {}", name, path.display());
            return Ok(path.to_path_buf());
        }
        return Err(ConvertError::MissingTool {
            tool: name.to_string(),
            reason: format!("configured path {} is not a file", path.display()),
        });
    }

    match which::which(name) {
        Ok(path) => {
            log::debug!("Found {} at: {}", name, path.display());
            Ok(path)
        }
        Err(e) => Err(ConvertError::MissingTool {
            tool: name.to_string(),
            reason: e.to_string(),
        }),
    }
}
