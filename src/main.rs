//! echelon - time-aware organizational hierarchies

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = echelon::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
