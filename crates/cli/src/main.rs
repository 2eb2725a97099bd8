use std::process::ExitCode;

fn main() -> ExitCode {
    docbot_cli::run()
}
