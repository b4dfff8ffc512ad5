use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use drive_panel::cli::Cli;
use drive_panel::runtime::{self, PanelError};

// Everything runs on one thread; see runtime.rs
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = start(cli).await {
        eprintln!("Panel error: {}", e);
        std::process::exit(1);
    }
}

async fn start(cli: Cli) -> Result<(), PanelError> {
    init_logging(&cli.log_file)?;
    let config = cli.resolve_config()?;
    runtime::run(config).await
}

/// Log to a file (set RUST_LOG=debug for frame-level detail)
fn init_logging(path: &Path) -> Result<(), PanelError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
