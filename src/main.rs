// Aircom - Wireless serial console client
use anyhow::Result;
use clap::Parser;

use aircom::cli::args::Args;
use aircom::cli::commands::execute_command;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match execute_command(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
