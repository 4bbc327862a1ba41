use stowage_core::handlers::ErrorHandlers;
use stowage_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible; fall back to stderr when the
    // state directory is not writable.
    if let Err(e) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable: {:#}", e);
    }

    let handlers = ErrorHandlers::standard();

    // Parse CLI and dispatch; failures come back rendered by `handlers`.
    if let Err(failed) = CliCommand::run_from_args(&handlers).await {
        eprintln!("{failed}");
        std::process::exit(1);
    }
}
