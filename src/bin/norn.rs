//! Norn CLI - static-analysis driver front end.

use clap::error::ErrorKind;
use clap::Parser;

use norn_rs::core::reporter::USAGE_EXIT;

mod cli;

use cli::Cli;

fn main() -> anyhow::Result<()> {
    // Bad arguments must exit with the usage status, not a category bit.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => USAGE_EXIT,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let code = cli::execute(cli)?;
    std::process::exit(code);
}
