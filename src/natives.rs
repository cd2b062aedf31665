//! Built-in callables installed into globals at interpreter construction.

use crate::callable::Arity;
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::value::Value;
use std::fmt;
use std::fs;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct NativeFn {
    pub name: &'static str,
    pub arity: Arity,
    pub func: fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError>,
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn: {}>", self.name)
    }
}

fn exception(message: impl Into<String>) -> LoxError {
    LoxError::exception(message)
}

fn clock(_interp: &mut Interpreter, _args: Vec<Value>) -> Result<Value, LoxError> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64();
    Ok(Value::Number(seconds))
}

fn array(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Array(Rc::new(std::cell::RefCell::new(vec![Value::Nil; *n as usize])))),
        _ => Err(exception("array: Argument must be a number.")),
    }
}

fn len(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
    match &args[0] {
        Value::Array(elements) => Ok(Value::Number(elements.borrow().len() as f64)),
        Value::Str(s) => Ok(Value::Number(s.chars().count() as f64)),
        _ => Err(exception("len: Argument must be array or string.")),
    }
}

fn int(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(n.trunc())),
        Value::Str(s) if s.chars().count() == 1 => {
            let c = s.chars().next().unwrap();
            Ok(Value::Number(c as u32 as f64))
        }
        _ => Err(exception("int: Argument must be a number or character.")),
    }
}

fn chr(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
    match &args[0] {
        Value::Number(n) => {
            let code = *n as u32;
            let c = char::from_u32(code).ok_or_else(|| exception("chr: Argument is not a valid code point."))?;
            Ok(Value::Str(c.to_string()))
        }
        _ => Err(exception("chr: Argument must be a number.")),
    }
}

fn readfile(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
    match &args[0] {
        Value::Str(path) => {
            let bytes = fs::read(path).map_err(|_| exception("readfile: File cannot be found."))?;
            Ok(Value::Str(bytes.into_iter().map(|b| b as char).collect()))
        }
        _ => Err(exception("readfile: Argument must be a string.")),
    }
}

fn writefile(_interp: &mut Interpreter, args: Vec<Value>) -> Result<Value, LoxError> {
    let path = match &args[0] {
        Value::Str(p) => p,
        _ => return Err(exception("writefile: First argument must be a string.")),
    };
    let text = match &args[1] {
        Value::Str(t) => t,
        _ => return Err(exception("writefile: Second argument must be a string.")),
    };
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        let code = c as u32;
        if code > 0xFF {
            return Err(exception("writefile: Invalid character set. Can only handle ASCII."));
        }
        bytes.push(code as u8);
    }
    fs::write(path, bytes).map_err(|_| exception("writefile: Could not write file."))?;
    Ok(Value::Nil)
}

fn noop(_interp: &mut Interpreter, _args: Vec<Value>) -> Result<Value, LoxError> {
    Ok(Value::Nil)
}

pub fn install(interpreter: &mut Interpreter) {
    let entries: &[(&'static str, Arity, fn(&mut Interpreter, Vec<Value>) -> Result<Value, LoxError>)] = &[
        ("clock", Arity::Exact(0), clock),
        ("array", Arity::Exact(1), array),
        ("len", Arity::Exact(1), len),
        ("int", Arity::Exact(1), int),
        ("chr", Arity::Exact(1), chr),
        ("readfile", Arity::Exact(1), readfile),
        ("writefile", Arity::Exact(2), writefile),
        ("noop", Arity::Any, noop),
    ];
    for (name, arity, func) in entries {
        interpreter.define_global(name, Value::Native(Rc::new(NativeFn { name, arity: *arity, func: *func })));
    }
}
