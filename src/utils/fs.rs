//! File system utilities for conversions.
//!
//! Provides filtered tree copies for payload staging and atomic placement of
//! finished packages at their output path.

use crate::error::{ConvertError, ErrorExt, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Makes a symbolic link.
#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(not(unix))]
fn symlink(src: &Path, dst: &Path) -> std::io::Result<()> {
    log::warn!("Skipping symlink {} -> {}", dst.display(), src.display());
    Ok(())
}

/// Keep the owner rwx bits on copied directories; a tree copied off a
/// read-only volume must still be removable afterwards.
#[cfg(unix)]
fn owner_writable(permissions: std::fs::Permissions) -> std::fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    std::fs::Permissions::from_mode(permissions.mode() | 0o700)
}

#[cfg(not(unix))]
fn owner_writable(mut permissions: std::fs::Permissions) -> std::fs::Permissions {
    permissions.set_readonly(false);
    permissions
}

/// Copies a regular file from one path to another, creating any parent
/// directories of the destination path as necessary.
///
/// Fails if the source path is a directory or doesn't exist.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if !from.is_file() {
        return Err(ConvertError::Fs {
            context: "copying file",
            path: from.to_path_buf(),
            error: std::io::Error::new(std::io::ErrorKind::NotFound, "not a regular file"),
        });
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file to", to)?;
    Ok(())
}

/// Recursively copies a directory, skipping every entry (at any depth) whose
/// name matches `exclude`.
///
/// Symlinks are recreated rather than followed. File modes are preserved, and
/// directory modes are applied once the tree is complete so that read-only
/// source directories can still be populated.
pub async fn copy_dir_filtered<F>(from: &Path, to: &Path, exclude: F) -> Result<()>
where
    F: Fn(&OsStr) -> bool,
{
    if !from.is_dir() {
        return Err(ConvertError::Fs {
            context: "copying directory",
            path: from.to_path_buf(),
            error: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut directories: Vec<(PathBuf, std::fs::Permissions)> = Vec::new();
    let walker = walkdir::WalkDir::new(from)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !exclude(entry.file_name()));

    for entry in walker {
        let entry = entry?;
        let rel_path = entry
            .path()
            .strip_prefix(from)
            .map_err(|_| ConvertError::Fs {
                context: "resolving path below",
                path: from.to_path_buf(),
                error: std::io::Error::other(entry.path().display().to_string()),
            })?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            let target = fs::read_link(entry.path())
                .await
                .fs_context("reading symlink", entry.path())?;
            symlink(&target, &dest_path).fs_context("creating symlink", &dest_path)?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context("creating directory", &dest_path)?;
            let permissions = owner_writable(entry.metadata()?.permissions());
            directories.push((dest_path, permissions));
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context("copying file to", &dest_path)?;
        }
    }

    // Deepest first, so a read-only parent is locked only after its children.
    for (dir, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&dir, permissions)
            .await
            .fs_context("setting permissions on", &dir)?;
    }

    Ok(())
}

/// Places `from` at `to` atomically.
///
/// The file is first copied to a temporary file next to `to` and then renamed
/// over it, so `to` is either untouched or the complete new file.
pub async fn persist(from: &Path, to: &Path) -> Result<()> {
    let parent = match to.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let staged = tempfile::Builder::new()
        .prefix(".dmgpkg-")
        .suffix(".partial")
        .tempfile_in(parent)
        .fs_context("creating temporary output in", parent)?;

    fs::copy(from, staged.path())
        .await
        .fs_context("writing temporary output", staged.path())?;

    staged.persist(to).map_err(|e| ConvertError::Fs {
        context: "moving package into place at",
        path: to.to_path_buf(),
        error: e.error,
    })?;

    log::debug!("Placed {} at {}", from.display(), to.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_dir_filtered_skips_excluded_names_at_any_depth() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("copy");

        std::fs::create_dir_all(src.path().join("Library/Fonts")).unwrap();
        std::fs::write(src.path().join("Library/Fonts/a.ttf"), "font").unwrap();
        std::fs::write(src.path().join("Library/.DS_Store"), "meta").unwrap();
        std::fs::write(src.path().join(".DS_Store"), "meta").unwrap();

        copy_dir_filtered(src.path(), &target, |name| name == ".DS_Store")
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(target.join("Library/Fonts/a.ttf")).unwrap(),
            "font"
        );
        assert!(!target.join(".DS_Store").exists());
        assert!(!target.join("Library/.DS_Store").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_dir_filtered_preserves_symlinks_and_modes() {
        use std::os::unix::fs::PermissionsExt;

        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let target = dst.path().join("copy");

        std::fs::create_dir_all(src.path().join("usr/local/bin")).unwrap();
        let tool = src.path().join("usr/local/bin/tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("tool", src.path().join("usr/local/bin/alias")).unwrap();

        copy_dir_filtered(src.path(), &target, |_| false).await.unwrap();

        let copied = target.join("usr/local/bin/tool");
        let mode = std::fs::metadata(&copied).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        let link = std::fs::read_link(target.join("usr/local/bin/alias")).unwrap();
        assert_eq!(link, Path::new("tool"));
    }

    #[tokio::test]
    async fn test_copy_dir_filtered_rejects_missing_source() {
        let dst = tempfile::tempdir().unwrap();
        let err = copy_dir_filtered(Path::new("/nonexistent/dmgpkg"), dst.path(), |_| false)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Fs { .. }));
    }

    #[tokio::test]
    async fn test_persist_replaces_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let built = dir.path().join("built.pkg");
        let output = dir.path().join("out.pkg");
        std::fs::write(&built, "new").unwrap();
        std::fs::write(&output, "old").unwrap();

        persist(&built, &output).await.unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "new");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_copy_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_file(dir.path(), &dir.path().join("x")).await.unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }
}
