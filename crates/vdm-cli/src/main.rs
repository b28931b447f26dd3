use vdm_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    if logging::init_logging().is_err() {
        logging::init_logging_stderr();
    }

    if let Err(err) = Cli::run_from_args() {
        eprintln!("vdm error: {:#}", err);
        std::process::exit(1);
    }
}
