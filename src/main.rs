//! thingshot - command-line entity capture tool

use std::process::ExitCode;

use thingshot::cli;

fn main() -> ExitCode {
    env_logger::init();
    cli::run()
}
