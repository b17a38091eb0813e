use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use canvas_viewer::config::Configuration;
use canvas_viewer::tasks::viewer;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "canvas-viewer",
    version,
    about = "Image viewer with a click-through canvas mode"
)]
struct Args {
    /// Image to open, or a directory to browse (defaults to the working directory)
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,
    /// Path to YAML config; built-in defaults when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
    /// Enter canvas mode as soon as the first image is shown
    #[arg(long)]
    canvas: bool,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info").add_directive("canvas_viewer=debug".parse()?),
        _ => EnvFilter::new("info").add_directive("canvas_viewer=trace".parse()?),
    };
    let filter = filter
        .add_directive("winit=warn".parse()?)
        .add_directive("x11rb=warn".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let Args {
        path,
        config,
        verbose,
        canvas,
    } = Args::parse();
    init_tracing(verbose)?;

    let cfg = match config.as_ref() {
        Some(file) => Configuration::load_or_default(file)
            .with_context(|| format!("failed to load configuration from {}", file.display()))?,
        None => Configuration::default(),
    }
    .validated()
    .context("invalid configuration values")?;
    tracing::debug!("configuration:\n{:#?}", cfg);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    // The viewer owns the main thread until its window closes.
    let result = viewer::run_windowed(cfg, cancel.clone(), path, canvas).context("viewer failed");
    cancel.cancel();
    result
}
