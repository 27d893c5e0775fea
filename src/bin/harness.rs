use anyhow::Result;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    code_harness::cli::run().map(ExitCode::from)
}
