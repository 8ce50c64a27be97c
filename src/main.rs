use clap::Parser;
use optionpilot::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
