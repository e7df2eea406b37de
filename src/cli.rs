use clap::{Parser, Subcommand, ValueEnum};

/// Refreshes transfer course equivalencies from the upstream service.
#[derive(Parser, Debug)]
#[command(name = "transfer-sync", version, about)]
pub struct Args {
    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::default())]
    pub tracing: TracingFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP trigger (and the scheduler, when configured)
    Serve,
    /// Run a single refresh batch and exit
    Run,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    Pretty,
    Json,
}

impl Default for TracingFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            TracingFormat::Pretty
        } else {
            TracingFormat::Json
        }
    }
}
