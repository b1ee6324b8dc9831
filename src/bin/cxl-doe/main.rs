use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;

fn main() -> Result<()> {
    let cli = crate::cli::Cli::parse();
    init_tracing(cli.verbose);
    crate::app::run(cli)
}

/// `-v` flags win over `RUST_LOG`; with neither, only warnings are shown.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
