// Headless front end: every invocation is a CLI run over scene files.

mod cli;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
