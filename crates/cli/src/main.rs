use std::process::ExitCode;

fn main() -> ExitCode {
    voicely_cli::run()
}
