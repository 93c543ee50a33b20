use std::process::ExitCode;

use clap::Parser;
use typo_sniper::cli::commands::run;
use typo_sniper::cli::flags::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    run(cli).await
}
