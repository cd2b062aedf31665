//! Lexical scopes as a chain of reference-counted, interior-mutable frames.
//!
//! A name present in a scope's map but bound to `None` is declared but
//! uninitialized; reading it is a runtime error. Parent links are strong
//! (`Rc`, not `Weak`): closures that outlive their defining scope keep it
//! alive, and a closure stored in a variable of its own enclosing scope
//! leaks rather than dangling. That leak is accepted.

use crate::error::LoxError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Option<Value>>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn root() -> EnvRef {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: None,
        }))
    }

    pub fn nested(enclosing: &EnvRef) -> EnvRef {
        Rc::new(RefCell::new(Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing.clone()),
        }))
    }

    /// Declares `name` without a value; reading it before `initialize` or
    /// `assign` is a runtime error.
    pub fn define(&mut self, name: &str) {
        self.values.insert(name.to_string(), None);
    }

    /// Declares and binds `name` in one step.
    pub fn initialize(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), Some(value));
    }

    pub fn assign(env: &EnvRef, name: &Token, value: Value) -> Result<(), LoxError> {
        let parent = {
            let mut frame = env.borrow_mut();
            if frame.values.contains_key(&name.lexeme) {
                frame.values.insert(name.lexeme.clone(), Some(value));
                return Ok(());
            }
            frame.enclosing.clone()
        };
        match parent {
            Some(parent) => Environment::assign(&parent, name, value),
            None => Err(LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))),
        }
    }

    pub fn get(env: &EnvRef, name: &Token) -> Result<Value, LoxError> {
        let (slot, parent) = {
            let frame = env.borrow();
            (frame.values.get(&name.lexeme).cloned(), frame.enclosing.clone())
        };
        match slot {
            Some(Some(value)) => Ok(value),
            Some(None) => Err(LoxError::runtime(
                name,
                format!("Accessing uninitialized variable '{}'.", name.lexeme),
            )),
            None => match parent {
                Some(parent) => Environment::get(&parent, name),
                None => Err(LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))),
            },
        }
    }

    /// Walks `distance` parent hops up from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> EnvRef {
        let mut current = env.clone();
        for _ in 0..distance {
            let parent = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolver distance exceeds environment chain length");
            current = parent;
        }
        current
    }

    pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value, LoxError> {
        let target = Environment::ancestor(env, distance);
        let frame = target.borrow();
        match frame.values.get(&name.lexeme) {
            Some(Some(value)) => Ok(value.clone()),
            Some(None) => Err(LoxError::runtime(
                name,
                format!("Accessing uninitialized variable '{}'.", name.lexeme),
            )),
            None => Err(LoxError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))),
        }
    }

    pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<(), LoxError> {
        let target = Environment::ancestor(env, distance);
        target.borrow_mut().values.insert(name.lexeme.clone(), Some(value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn name(lexeme: &str) -> Token {
        Token::new(TokenType::Identifier, lexeme, None, 1)
    }

    #[test]
    fn get_at_matches_ancestor_distance() {
        let root = Environment::root();
        root.borrow_mut().initialize("x", Value::Number(1.0));
        let child = Environment::nested(&root);
        let grandchild = Environment::nested(&child);

        assert_eq!(Environment::get_at(&grandchild, 2, &name("x")).unwrap(), Value::Number(1.0));
        assert!(Rc::ptr_eq(&Environment::ancestor(&grandchild, 2), &root));
    }

    #[test]
    fn uninitialized_read_is_an_error() {
        let root = Environment::root();
        root.borrow_mut().define("x");
        assert!(Environment::get(&root, &name("x")).is_err());
    }

    #[test]
    fn assign_walks_up_to_declaring_scope() {
        let root = Environment::root();
        root.borrow_mut().initialize("x", Value::Number(1.0));
        let child = Environment::nested(&root);

        Environment::assign(&child, &name("x"), Value::Number(2.0)).unwrap();
        assert_eq!(Environment::get(&root, &name("x")).unwrap(), Value::Number(2.0));
    }
}
