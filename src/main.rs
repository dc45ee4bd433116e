use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use log::info;

use vela::errors::DriverError;
use vela::virtual_machine::{InterpretResult, Vm};

/// A bytecode compiler and stack-based VM for a small scripting language.
#[derive(ClapParser, Debug)]
#[command(name = "vela", version, about)]
struct Cli {
    /// Script to run. Omit to start an interactive REPL.
    path: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.path {
        Some(path) => run_file(&path),
        None => run_repl().map(|()| InterpretResult::Ok),
    };

    match result {
        Ok(InterpretResult::Ok) => ExitCode::from(0),
        Ok(InterpretResult::CompileError) => ExitCode::from(65),
        Ok(InterpretResult::RuntimeError) => ExitCode::from(70),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(74)
        }
    }
}

fn run_file(path: &PathBuf) -> Result<InterpretResult, DriverError> {
    let source = std::fs::read_to_string(path)
        .map_err(|source| DriverError::ReadSource { path: path.display().to_string(), source })?;

    info!("running {}", path.display());
    let mut vm = Vm::new();
    Ok(vm.interpret(&source))
}

/// Reads one line at a time from stdin and interprets it, matching the
/// reference implementation's REPL: a single line's compile or runtime
/// error never terminates the session, and the REPL itself always exits
/// cleanly on EOF (Ctrl-D).
fn run_repl() -> Result<(), DriverError> {
    let mut vm = Vm::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        let _ = stdout.flush();

        let line = match lines.next() {
            Some(Ok(l)) => l,
            Some(Err(source)) => return Err(DriverError::ReplRead(source)),
            None => break,
        };

        if line.is_empty() {
            continue;
        }

        vm.interpret(&line);
    }

    Ok(())
}
