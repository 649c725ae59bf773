use std::io;
use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::error;

use clockmem::{run, Args, StdinGate};

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version go to stdout and are not errors.
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    let (options, files) = args.into_parts();

    env_logger::Builder::from_env(Env::default().default_filter_or(options.log_level().as_str()))
        .format_timestamp(None)
        .init();

    let mut stdout = io::stdout().lock();
    match run(&options, &files, &mut StdinGate, &mut stdout) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}
