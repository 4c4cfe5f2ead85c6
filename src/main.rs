use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use photo_desktop_sync::cli::{self, Cli};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli::run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "photo-sync failed");
            eprintln!("error: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}
