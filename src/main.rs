use std::process::ExitCode;

use clap::Parser;

use targeted_test::commands::{self, RunArgs};
use targeted_test::logger;

#[derive(Parser)]
#[command(
    name = "tt",
    version,
    about = "Run a single test by typing part of its description."
)]
struct Cli {
    #[command(flatten)]
    run: RunArgs,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init();

    match commands::run(cli.run) {
        Ok(code) => exit_code(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(c) => ExitCode::from(c),
        Err(_) => ExitCode::FAILURE,
    }
}
