mod capture;
mod cli;
mod core;
mod error;
mod filter;
mod packet;
mod ui;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::CliArgs;
use crate::core::logging::init_logging;
use crate::core::runner::run;

fn main() -> ExitCode {
    init_logging();

    // clap would exit with 2 on bad flags; every input error here is a 1.
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
