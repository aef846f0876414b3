//! Command line interface for dmgpkg.
//!
//! Parses arguments, builds the host toolchain and runs one conversion,
//! racing it against SIGINT/SIGTERM so an interrupted run still unwinds
//! through the converter's cleanup guards.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::config::Settings;
use crate::convert::{Classification, ConversionRequest, Converter};
use crate::error::{ConvertError, Result};
use crate::tools::HostToolchain;
use clap::Parser;

/// Main CLI entry point. Returns the process exit status.
pub async fn run() -> i32 {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Usage errors exit 2; --help and --version exit 0.
            let _ = e.print();
            return e.exit_code();
        }
    };

    let output = OutputManager::new(args.quiet);
    match execute(&args, &output).await {
        Ok(()) => 0,
        Err(e) => {
            output.error(&e.to_string());
            for suggestion in e.recovery_suggestions() {
                output.indent(&format!("• {suggestion}"));
            }
            e.exit_code()
        }
    }
}

async fn execute(args: &Args, output: &OutputManager) -> Result<()> {
    args.validate()?;
    let settings = Settings::resolve(args.config.as_deref())?;
    let request = args.request();

    // Input problems are reported before host tools are looked up.
    if args.classify_only {
        request.validate_source()?;
    } else {
        request.validate()?;
    }

    let converter = Converter::new(HostToolchain::host(&settings)?, settings);

    if args.classify_only {
        let classification = until_interrupted(converter.inspect(&request)).await?;
        return report_classification(&request, &classification, output);
    }

    output.info(&format!(
        "Converting {} into {}",
        request.source_image.display(),
        request.output.display()
    ));
    let built = until_interrupted(converter.convert(&request)).await?;
    // Payload roots rebase to the empty path.
    match built.source.path().filter(|p| !p.as_os_str().is_empty()) {
        Some(source) => output.info(&format!(
            "Built from {} '{}'",
            built.source.label(),
            source.display()
        )),
        None => output.info(&format!("Built from {}", built.source.label())),
    }
    if request.scripts.is_some() && !matches!(built.source, Classification::PayloadRoot(_)) {
        output.warn(&format!(
            "--scripts only applies to payload packages; ignored for this {}",
            built.source.label()
        ));
    }
    output.success(&format!("Package written to {}", built.path.display()));
    Ok(())
}

fn report_classification(
    request: &ConversionRequest,
    classification: &Classification,
    output: &OutputManager,
) -> Result<()> {
    match classification {
        Classification::NoMatch => Err(ConvertError::ClassificationFailure {
            image: request.source_image.clone(),
        }),
        Classification::PayloadRoot(_) => {
            output.success("payload root: volume will be packaged rooted at /");
            Ok(())
        }
        other => {
            let path = other.path().map(|p| p.display().to_string()).unwrap_or_default();
            output.success(&format!("{}: {}", other.label(), path));
            Ok(())
        }
    }
}

/// Run `work` unless a termination signal arrives first.
///
/// On a signal `work` is dropped, which releases its mount and scratch guards.
async fn until_interrupted<T>(work: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        result = work => result,
        () = shutdown_signal() => {
            log::warn!("Interrupted, cleaning up");
            Err(ConvertError::Interrupted)
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Could not install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                () = ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Could not install SIGTERM handler: {}", e);
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}
