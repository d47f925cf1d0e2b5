//! Command-line entry point: parses flags, initialises tracing, and either
//! renders the selected lesson or validates its inputs with `check`.

mod check;
mod cli;
mod lessons;
mod run;
mod settings;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check) => check::run_check(&cli.run),
        None => run::run(cli.run),
    }
}
