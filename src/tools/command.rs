//! Child process execution shared by the host tool implementations.

use crate::error::ConvertError;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Output, Stdio};

/// A tool that could not be started or exited unsuccessfully.
#[derive(Debug)]
pub(super) struct ToolFailure {
    pub(super) tool: String,
    pub(super) reason: String,
    pub(super) exit_code: Option<i32>,
}

impl ToolFailure {
    pub(super) fn into_build_failure(self) -> ConvertError {
        ConvertError::BuildFailure {
            tool: self.tool,
            reason: self.reason,
            exit_code: self.exit_code,
        }
    }

    pub(super) fn into_mount_failure(self, image: &Path) -> ConvertError {
        ConvertError::MountFailure {
            image: image.to_path_buf(),
            reason: self.reason,
            exit_code: self.exit_code,
        }
    }
}

/// Argument vector builder; tools take a mix of flags, strings and paths.
#[derive(Debug, Default)]
pub(super) struct Args(Vec<OsString>);

impl Args {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn arg(mut self, value: impl AsRef<OsStr>) -> Self {
        self.0.push(value.as_ref().to_os_string());
        self
    }

    /// Push `flag value` only when `value` is present.
    pub(super) fn opt(self, flag: &str, value: Option<impl AsRef<OsStr>>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    pub(super) fn as_slice(&self) -> &[OsString] {
        &self.0
    }
}

/// Run `program` to completion, capturing its output.
///
/// The child is killed if the returned future is dropped, so an interrupted
/// conversion does not leave packaging tools running.
pub(super) async fn run(tool: &str, program: &Path, args: &Args) -> Result<Output, ToolFailure> {
    log::debug!(
        "Running {} {}",
        program.display(),
        args.as_slice()
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let output = tokio::process::Command::new(program)
        .args(args.as_slice())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ToolFailure {
            tool: tool.to_string(),
            reason: format!("failed to execute {}: {}", program.display(), e),
            exit_code: None,
        })?;

    if !output.status.success() {
        return Err(ToolFailure {
            tool: tool.to_string(),
            reason: failure_reason(&output),
            exit_code: output.status.code(),
        });
    }

    Ok(output)
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }
    format!("exited with {}", output.status)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_opt_skips_absent_values() {
        let args = Args::new()
            .arg("--root")
            .opt("--sign", None::<&str>)
            .opt("--scripts", Some("/tmp/s"));
        let rendered: Vec<_> = args.as_slice().iter().map(|a| a.to_string_lossy()).collect();
        assert_eq!(rendered, vec!["--root", "--scripts", "/tmp/s"]);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported_with_code() {
        let args = Args::new().arg("-c").arg("echo broken >&2; exit 7");
        let failure = run("sh", Path::new("/bin/sh"), &args).await.unwrap_err();
        assert_eq!(failure.exit_code, Some(7));
        assert_eq!(failure.reason, "broken");
        assert_eq!(failure.into_build_failure().exit_code(), 7);
    }

    #[tokio::test]
    async fn test_missing_program_has_no_exit_code() {
        let failure = run("nope", Path::new("/nonexistent/dmgpkg-tool"), &Args::new())
            .await
            .unwrap_err();
        assert_eq!(failure.exit_code, None);
        assert!(failure.reason.contains("failed to execute"));
    }

    #[tokio::test]
    async fn test_success_returns_output() {
        let args = Args::new().arg("-c").arg("printf ok");
        let output = run("sh", Path::new("/bin/sh"), &args).await.unwrap();
        assert_eq!(output.stdout, b"ok");
    }
}
