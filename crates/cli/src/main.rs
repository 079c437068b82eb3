use std::process::ExitCode;

fn main() -> ExitCode {
    intune_cli::run()
}
