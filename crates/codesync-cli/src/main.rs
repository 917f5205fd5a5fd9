mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    // Logging is set up inside `Cli::run`, after the tasks are selected.
    if let Err(err) = Cli::run_from_args().await {
        eprintln!("\ncode-sync error: {:#}", err);
        std::process::exit(1);
    }
}
