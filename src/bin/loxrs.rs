//! Command line interface of `loxrs` tree-walk interpreter.

use anyhow::{anyhow, Context, Result};
use loxrs::{ConsoleReporter, Interpreter};
use std::{
    env, fs,
    io::{self, BufRead, BufWriter, Write},
    process,
};

#[derive(Default)]
struct Cli {
    run_file: Option<String>,
}

impl Cli {
    fn parse_args() -> Result<Self> {
        let mut cli = Cli::default();
        for arg in env::args().skip(1) {
            if cli.run_file.is_some() {
                return Err(anyhow!("Given more than one argument"));
            }
            cli.run_file = Some(arg);
        }
        Ok(cli)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse_args()?;

    if let Some(path) = &cli.run_file {
        run_file(path)
    } else {
        run_repl()
    }
}

/// Runs a script file. Exits 65 on a scan/parse/resolve error and 70 on a
/// runtime error, matching jlox's exit-code convention.
fn run_file(path: &str) -> Result<()> {
    let source = fs::read_to_string(path).with_context(|| format!("could not read {}", path))?;
    let mut interpreter = Interpreter::new(false);
    let mut reporter = ConsoleReporter::new();

    loxrs::run_source(&source, &mut interpreter, &mut reporter);

    if reporter.had_error {
        process::exit(65);
    }
    if reporter.had_runtime_error {
        process::exit(70);
    }
    Ok(())
}

fn run_repl() -> Result<()> {
    println!("Entered loxrs REPL (press q<Enter> or Ctrl-c to quit)");
    let prompt = "> ";

    let mut line = String::new();
    let out = io::stdout();
    let mut out = BufWriter::new(out.lock());
    let input = io::stdin();
    let mut input = input.lock();

    let mut interpreter = Interpreter::new(true);

    loop {
        print!("{}", prompt);
        out.flush().context("error when flushing stdout")?;
        line.clear();
        input.read_line(&mut line).context("error when reading stdin")?;

        if line.is_empty() {
            break; // EOF
        }
        match line.trim_end() {
            "q" | "quit" => break,
            line => {
                let mut reporter = ConsoleReporter::new();
                loxrs::run_source(line, &mut interpreter, &mut reporter);
            }
        }
    }

    Ok(())
}
