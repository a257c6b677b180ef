use std::process::ExitCode;

fn main() -> ExitCode {
    aerolens_cli::run()
}
