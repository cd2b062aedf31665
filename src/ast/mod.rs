//! Sum types for `Expr` and `Stmt`. Dispatch is a `match`, not a visitor:
//! see `interpreter::Interpreter::eval`/`execute` and
//! `resolver::Resolver::resolve_expr`/`resolve_stmt`.

pub mod expr;
pub mod stmt;

pub use expr::Expr;
pub use stmt::Stmt;
