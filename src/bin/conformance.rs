//! Golden-fixture conformance runner.
//!
//! Usage: stylus-conformance run [--suite <name>]... -- <compiler command>

use std::process::ExitCode;

fn main() -> ExitCode {
    stylus_conformance::cli::run()
}
