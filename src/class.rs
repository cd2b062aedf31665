//! Classes and instances. Method resolution is depth-first, left-to-right
//! over the superclass list; the first hit wins (no C3 linearization).

use crate::callable::{Arity, LoxFunction};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::reporter::Reporter;
use crate::token::Token;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclasses: Vec<Rc<LoxClass>>,
    pub class_methods: HashMap<String, Rc<LoxFunction>>,
    pub instance_methods: HashMap<String, Rc<LoxFunction>>,
    pub getters: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclasses: Vec<Rc<LoxClass>>,
        class_methods: HashMap<String, Rc<LoxFunction>>,
        instance_methods: HashMap<String, Rc<LoxFunction>>,
        getters: HashMap<String, Rc<LoxFunction>>,
    ) -> Self {
        Self {
            name,
            superclasses,
            class_methods,
            instance_methods,
            getters,
        }
    }

    /// Instance-visible lookup: this class's getters, then instance
    /// methods, then class-side methods, then each superclass in
    /// declaration order, recursively.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(m) = self.getters.get(name) {
            return Some(m.clone());
        }
        if let Some(m) = self.instance_methods.get(name) {
            return Some(m.clone());
        }
        if let Some(m) = self.class_methods.get(name) {
            return Some(m.clone());
        }
        for superclass in &self.superclasses {
            if let Some(m) = superclass.find_method(name) {
                return Some(m);
            }
        }
        None
    }

    /// Class-side lookup only; `recurse` controls whether superclasses
    /// are searched.
    pub fn find_class_method(&self, name: &str, recurse: bool) -> Option<Rc<LoxFunction>> {
        if let Some(m) = self.class_methods.get(name) {
            return Some(m.clone());
        }
        if recurse {
            for superclass in &self.superclasses {
                if let Some(m) = superclass.find_class_method(name, true) {
                    return Some(m);
                }
            }
        }
        None
    }

    pub fn arity(&self) -> Arity {
        match self.find_method("init") {
            Some(init) => init.arity(),
            None => Arity::Exact(0),
        }
    }

    /// Constructs an instance and runs `init` if the class (or a
    /// superclass) defines one. Takes `class` as a plain `&Rc<LoxClass>`
    /// rather than as a receiver: stable Rust doesn't allow `&Rc<Self>` as
    /// a method's `self` type.
    pub fn construct(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        reporter: &mut dyn Reporter,
    ) -> Result<Value, LoxError> {
        let instance = LoxInstance::new(class.clone());
        if let Some(init) = class.find_method("init") {
            init.bind(Value::Instance(instance.clone())).call(interpreter, args, reporter)?;
        }
        Ok(Value::Instance(instance))
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Rc<std::cell::RefCell<LoxInstance>> {
        Rc::new(std::cell::RefCell::new(LoxInstance {
            class,
            fields: HashMap::new(),
        }))
    }

    /// `None` means "no field and no method" — the caller (the `Get`
    /// evaluator) turns that into "Undefined property" with the token.
    pub fn get(instance: &Rc<std::cell::RefCell<LoxInstance>>, name: &Token) -> Option<Value> {
        let this = instance.borrow();
        if let Some(value) = this.fields.get(&name.lexeme) {
            return Some(value.clone());
        }
        let method = this.class.find_method(&name.lexeme)?;
        drop(this);
        Some(Value::Function(Rc::new(method.bind(Value::Instance(instance.clone())))))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
