//! The `Reporter` trait is the CORE's only way of talking to the outside
//! world: it never prints, never reads a file. Everything it needs from
//! the embedding program — diagnostics sink, and the ability to recurse
//! into `import` — goes through here.

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::Token;

pub trait Reporter {
    /// A lexing error at `line` with no offending token.
    fn error(&mut self, line: usize, message: &str);

    /// A parser/resolver error tied to a token. `token.kind == Eof` is
    /// reported as "at end"; otherwise "at '<lexeme>'".
    fn parse_error(&mut self, token: &Token, message: &str);

    /// Whether `error` or `parse_error` has fired since the last reset.
    /// `run_source` uses this to skip resolving/interpreting a source that
    /// failed to scan or parse.
    fn had_error(&self) -> bool;

    /// A runtime error that aborted the current `interpret()` call.
    fn runtime_error(&mut self, error: &LoxError);

    /// An index/native error (no token) that aborted the current
    /// `interpret()` call.
    fn exception_error(&mut self, error: &LoxError);

    /// Re-entrancy point used by `import`: scan, parse, resolve and
    /// interpret `source` against the same `interpreter`, so definitions
    /// it introduces land in the same globals.
    fn run(&mut self, source: &str, interpreter: &mut Interpreter);
}

/// Default `Reporter`: writes line-tagged diagnostics to stderr and
/// tracks whether any error kind has been seen, for exit-code mapping.
#[derive(Default)]
pub struct ConsoleReporter {
    pub had_error: bool,
    pub had_runtime_error: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, line: usize, place: &str, message: &str) {
        eprintln!("[line {}] Error{}: {}", line, place, message);
        self.had_error = true;
    }
}

impl Reporter for ConsoleReporter {
    fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    fn parse_error(&mut self, token: &Token, message: &str) {
        use crate::token::TokenType;
        if token.kind == TokenType::Eof {
            self.report(token.line, " at end", message);
        } else {
            self.report(token.line, &format!(" at '{}'", token.lexeme), message);
        }
    }

    fn had_error(&self) -> bool {
        self.had_error
    }

    fn runtime_error(&mut self, error: &LoxError) {
        if let LoxError::Runtime { token, message } = error {
            eprintln!("{}\n[line {}]", message, token.line);
        } else {
            eprintln!("{}", error);
        }
        self.had_runtime_error = true;
    }

    fn exception_error(&mut self, error: &LoxError) {
        eprintln!("{}", error);
        self.had_runtime_error = true;
    }

    fn run(&mut self, source: &str, interpreter: &mut Interpreter) {
        crate::run_source(source, interpreter, self);
    }
}

/// Test-only `Reporter`: records every call instead of printing, so tests
/// can assert on exactly what was reported.
#[derive(Default)]
pub struct CollectingReporter {
    pub errors: Vec<String>,
    pub parse_errors: Vec<String>,
    pub runtime_errors: Vec<String>,
    pub exception_errors: Vec<String>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty() || !self.parse_errors.is_empty()
    }

    pub fn had_runtime_error(&self) -> bool {
        !self.runtime_errors.is_empty() || !self.exception_errors.is_empty()
    }
}

impl Reporter for CollectingReporter {
    fn error(&mut self, line: usize, message: &str) {
        self.errors.push(format!("[line {}] {}", line, message));
    }

    fn parse_error(&mut self, token: &Token, message: &str) {
        use crate::token::TokenType;
        let place = if token.kind == TokenType::Eof {
            "at end".to_string()
        } else {
            format!("at '{}'", token.lexeme)
        };
        self.parse_errors.push(format!("[line {}] {} {}", token.line, place, message));
    }

    fn had_error(&self) -> bool {
        CollectingReporter::had_error(self)
    }

    fn runtime_error(&mut self, error: &LoxError) {
        self.runtime_errors.push(error.to_string());
    }

    fn exception_error(&mut self, error: &LoxError) {
        self.exception_errors.push(error.to_string());
    }

    fn run(&mut self, source: &str, interpreter: &mut Interpreter) {
        crate::run_source(source, interpreter, self);
    }
}
