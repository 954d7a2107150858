use std::process::ExitCode;

fn main() -> ExitCode {
    mall_cli::run()
}
