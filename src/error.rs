//! Runtime and native-call error kinds.
//!
//! Static errors (scan/parse/resolve) never become a `LoxError`: they are
//! reported straight through `Reporter::error`/`parse_error` and recovery
//! continues. `LoxError` covers the two kinds that can abort an
//! `interpret()` call: a runtime check that failed against a known token,
//! and an index/native failure that has none. Control-flow signals
//! (`break`/`return`) are a separate, non-error type; see `interpreter::Flow`.

use crate::token::Token;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoxError {
    /// A failed runtime check with a token to blame for the diagnostic.
    #[error("{message}")]
    Runtime { token: Token, message: String },

    /// An index or native-call failure with no associated token; the
    /// message itself names the failing operation.
    #[error("{message}")]
    Exception { message: String },
}

impl LoxError {
    pub fn runtime(token: &Token, message: impl Into<String>) -> Self {
        LoxError::Runtime {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        LoxError::Exception {
            message: message.into(),
        }
    }
}
