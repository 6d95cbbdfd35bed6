use clap::Parser;
use std::process::ExitCode;

mod commands;
mod logging;
mod output;
pub mod ux_error;

use commands::Cli;

/// 128 + SIGINT
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let logging = logging::init(cli.verbose);

    tokio::select! {
        result = commands::run(cli, &logging) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                match ux_error::from_error(&err) {
                    Some(ux) => ux.display(),
                    None => output::error(&format!("{:#}", err))
                }
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            output::warn("Interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}
