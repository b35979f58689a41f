//! angreal - project-local task runner

use std::process::ExitCode;

fn main() -> ExitCode {
    match angreal::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
