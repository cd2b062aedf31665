//! loxrs is a tree-walking interpreter for a small Lox-like language:
//! dynamically typed, class-based, with first-class functions, multiple
//! inheritance, getters, arrays and a handful of native callables.
//!
//! The core never touches stdin/stdout/the filesystem directly — it talks
//! to the embedding program exclusively through the `Reporter` trait, so a
//! REPL, a batch file-runner and a test harness can all drive the same
//! pipeline. `run_source` is that pipeline: scan, parse, resolve,
//! interpret.

#![warn(rust_2018_idioms)]

pub mod ast;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod natives;
pub mod parser;
pub mod reporter;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

pub use error::LoxError;
pub use interpreter::Interpreter;
pub use reporter::{CollectingReporter, ConsoleReporter, Reporter};

/// Scans, parses, resolves and interprets `source` against `interpreter`,
/// reporting every diagnostic through `reporter`. Used both for top-level
/// runs and for `import`'s recursion into another file's source.
pub fn run_source(source: &str, interpreter: &mut Interpreter, reporter: &mut dyn Reporter) {
    let tokens = scanner::Scanner::new(source).scan(reporter);
    let statements = parser::parse(tokens, reporter);

    // A scan or parse error leaves `statements` full of gaps (skipped
    // declarations); resolving or running it would just cascade into
    // unrelated "undefined variable" noise.
    if reporter.had_error() {
        return;
    }

    resolver::resolve(interpreter, reporter, &statements);
    if reporter.had_error() {
        return;
    }

    interpreter.interpret(&statements, reporter);
}
