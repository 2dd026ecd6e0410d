use std::io::{self, IsTerminal};
use std::process::ExitCode;

use dsbridge::cat::{self, CatArgs};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .with_writer(io::stderr)
        .init();
}

#[allow(clippy::print_stderr)]
fn main() -> ExitCode {
    init_tracing();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.iter().any(|arg| arg == "--help" || arg == "-h") {
        eprintln!("{}", cat::USAGE);
        return ExitCode::SUCCESS;
    }

    let args = match CatArgs::parse(raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n\n{}", cat::USAGE);
            return ExitCode::from(2);
        }
    };

    let stdout = io::stdout();
    match cat::run(&args, &mut stdout.lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dsbridge-cat: {e}");
            ExitCode::FAILURE
        }
    }
}
