use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use transfer_sync::app::App;
use transfer_sync::cli::{Args, Command};
use transfer_sync::config::Config;
use transfer_sync::logging::setup_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logging depends on config, so a config error can only go to stderr
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config.log_level, args.tracing);

    let command = args.command.unwrap_or(Command::Serve);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("GIT_COMMIT_SHORT"),
        command = ?command,
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting transfer-sync"
    );

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Serve => app.serve().await,
        Command::Run => app.run_once().await,
    }
}
