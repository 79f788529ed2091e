//! fleetup - bring up a broker, an object store and a scaled worker pool in
//! dependency order.
//!
//! ```text
//! fleetup <SCALE_FACTOR> <EPOCH_SIZE> [OPTIONS]
//! ```

use std::process::ExitCode;

use clap::Parser;

mod cli;
mod error;
mod logging;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Usage errors exit with code 2 from inside clap.
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(error::codes::INTERNAL_ERROR);
    }

    match cli.run().await {
        Ok(()) => ExitCode::from(error::codes::SUCCESS),
        Err(e) => {
            error::print_error(&e);
            ExitCode::from(error::exit_code(&e))
        }
    }
}
