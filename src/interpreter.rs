//! Tree-walking evaluator. `eval`/`execute` are the two match points
//! everything else in the core feeds into — no visitor traits.

use crate::ast::expr::*;
use crate::ast::stmt::*;
use crate::ast::Stmt;
use crate::callable::LoxFunction;
use crate::class::{LoxClass, LoxInstance};
use crate::environment::{EnvRef, Environment};
use crate::error::LoxError;
use crate::natives;
use crate::reporter::Reporter;
use crate::token::{Token, TokenType};
use crate::value::{stringify, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Result of executing a statement: either it ran to completion, or it
/// unwound with a control-flow signal. Neither variant is a `LoxError` —
/// see `error.rs`.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Return(Value),
}

pub struct Interpreter {
    pub globals: EnvRef,
    pub environment: EnvRef,
    locals: HashMap<NodeId, usize>,
    pub is_repl: bool,
}

/// Restores the interpreter's environment pointer on every exit path,
/// including early return via `?` and the break/return control-flow
/// signals — the invariant holds by construction, not by remembering to
/// undo it at each call site.
struct EnvGuard<'i> {
    interpreter: &'i mut Interpreter,
    previous: EnvRef,
}

impl<'i> EnvGuard<'i> {
    fn new(interpreter: &'i mut Interpreter, new_env: EnvRef) -> Self {
        let previous = interpreter.environment.clone();
        interpreter.environment = new_env;
        EnvGuard { interpreter, previous }
    }
}

impl<'i> Drop for EnvGuard<'i> {
    fn drop(&mut self) {
        self.interpreter.environment = self.previous.clone();
    }
}

impl Interpreter {
    pub fn new(is_repl: bool) -> Self {
        let globals = Environment::root();
        let mut interpreter = Interpreter {
            globals: globals.clone(),
            environment: globals,
            locals: HashMap::new(),
            is_repl,
        };
        natives::install(&mut interpreter);
        interpreter
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.borrow_mut().initialize(name, value);
    }

    /// Called by the resolver: records that the node `id` resolved `depth`
    /// lexical hops from wherever it's evaluated.
    pub fn resolve(&mut self, id: NodeId, depth: usize) {
        self.locals.insert(id, depth);
    }

    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut dyn Reporter) {
        for stmt in statements {
            if let Err(error) = self.execute(stmt, reporter) {
                match &error {
                    LoxError::Runtime { .. } => reporter.runtime_error(&error),
                    LoxError::Exception { .. } => reporter.exception_error(&error),
                }
                return;
            }
        }
    }

    fn lookup_variable(&mut self, id: NodeId, name: &Token) -> Result<Value, LoxError> {
        match self.locals.get(&id) {
            Some(&depth) => Environment::get_at(&self.environment, depth, name),
            None => Environment::get(&self.globals, name),
        }
    }

    pub fn execute(&mut self, stmt: &Stmt, reporter: &mut dyn Reporter) -> Result<Flow, LoxError> {
        match stmt {
            Stmt::Block(statements) => {
                let env = Environment::nested(&self.environment);
                self.execute_block(statements, env, reporter)
            }
            Stmt::Class(class) => self.execute_class(class, reporter),
            Stmt::Break(_) => Ok(Flow::Break),
            Stmt::Expression(expr) => {
                let value = self.eval(expr, reporter)?;
                if self.is_repl {
                    println!("{}", stringify(&value));
                }
                Ok(Flow::Normal)
            }
            Stmt::Function(decl) => {
                let function = LoxFunction::new(decl.clone(), self.environment.clone(), false, false);
                self.environment.borrow_mut().initialize(&decl.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }
            Stmt::If(stmt) => {
                if self.eval(&stmt.condition, reporter)?.is_truthy() {
                    self.execute(&stmt.then_branch, reporter)
                } else if let Some(else_branch) = &stmt.else_branch {
                    self.execute(else_branch, reporter)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::Import(filename) => self.execute_import(filename, reporter),
            Stmt::Print(expr) => {
                let value = self.eval(expr, reporter)?;
                println!("{}", stringify(&value));
                Ok(Flow::Normal)
            }
            Stmt::Return(stmt) => {
                let value = match &stmt.value {
                    Some(expr) => self.eval(expr, reporter)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Var(stmt) => {
                match &stmt.initializer {
                    Some(init) => {
                        let value = self.eval(init, reporter)?;
                        self.environment.borrow_mut().initialize(&stmt.name.lexeme, value);
                    }
                    None => self.environment.borrow_mut().define(&stmt.name.lexeme),
                }
                Ok(Flow::Normal)
            }
            Stmt::While(stmt) => {
                while self.eval(&stmt.condition, reporter)?.is_truthy() {
                    match self.execute(&stmt.body, reporter)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal => {}
                    }
                }
                Ok(Flow::Normal)
            }
        }
    }

    /// Runs `statements` against a fresh environment, restoring the
    /// previous one on every exit path (see `EnvGuard`).
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvRef, reporter: &mut dyn Reporter) -> Result<Flow, LoxError> {
        let guard = EnvGuard::new(self, env);
        for stmt in statements {
            match guard.interpreter.execute(stmt, reporter)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_class(&mut self, class: &ClassStmt, reporter: &mut dyn Reporter) -> Result<Flow, LoxError> {
        let mut superclasses = Vec::with_capacity(class.superclasses.len());
        for expr in &class.superclasses {
            match self.eval(expr, reporter)? {
                Value::Class(c) => superclasses.push(c),
                _ => {
                    let token = expr.anchor_token().expect("superclass expression carries a token");
                    return Err(LoxError::runtime(token, "Superclass must be a class."));
                }
            }
        }

        self.environment.borrow_mut().define(&class.name.lexeme);

        let build_methods = |methods: &[Rc<FunctionStmt>], is_getter: bool, env: &EnvRef| -> HashMap<String, Rc<LoxFunction>> {
            methods
                .iter()
                .map(|method| {
                    let is_initializer = method.name.lexeme == "init";
                    let function = LoxFunction::new(method.clone(), env.clone(), is_initializer, is_getter);
                    (method.name.lexeme.clone(), Rc::new(function))
                })
                .collect()
        };

        let class_methods = build_methods(&class.class_methods, false, &self.environment);
        let instance_methods = build_methods(&class.instance_methods, false, &self.environment);
        let getters = build_methods(&class.getters, true, &self.environment);

        let lox_class = LoxClass::new(class.name.lexeme.clone(), superclasses, class_methods, instance_methods, getters);
        Environment::assign(&self.environment, &class.name, Value::Class(Rc::new(lox_class)))?;

        Ok(Flow::Normal)
    }

    fn execute_import(&mut self, filename: &Token, reporter: &mut dyn Reporter) -> Result<Flow, LoxError> {
        if !Path::new(&filename.lexeme).exists() {
            return Err(LoxError::runtime(filename, "Imported filename cannot be found."));
        }
        let source = std::fs::read_to_string(&filename.lexeme)
            .map_err(|_| LoxError::runtime(filename, "Imported filename cannot be found."))?;
        reporter.run(&source, self);
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr, reporter: &mut dyn Reporter) -> Result<Value, LoxError> {
        match expr {
            Expr::Array(array) => {
                let mut values = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    values.push(self.eval(element, reporter)?);
                }
                Ok(Value::Array(Rc::new(RefCell::new(values))))
            }
            Expr::Assign(assign) => {
                let value = self.eval(&assign.value, reporter)?;
                match self.locals.get(&assign.id) {
                    Some(&depth) => Environment::assign_at(&self.environment, depth, &assign.name, value.clone())?,
                    None => Environment::assign(&self.globals, &assign.name, value.clone())?,
                }
                Ok(value)
            }
            Expr::Binary(binary) => self.eval_binary(binary, reporter),
            Expr::Call(call) => self.eval_call(call, reporter),
            Expr::Index(index) => self.eval_index(index, reporter),
            Expr::Get(get) => self.eval_get(get, reporter),
            Expr::Grouping(inner) => self.eval(inner, reporter),
            Expr::Lambda(lambda) => {
                let declaration = Rc::new(FunctionStmt {
                    name: Token::new(TokenType::Identifier, "", None, 0),
                    params: lambda.params.clone(),
                    body: lambda.body.clone(),
                });
                Ok(Value::Function(Rc::new(LoxFunction::new(declaration, self.environment.clone(), false, false))))
            }
            Expr::Literal(literal) => Ok(match literal {
                Literal_::Nil => Value::Nil,
                Literal_::Bool(b) => Value::Bool(*b),
                Literal_::Number(n) => Value::Number(*n),
                Literal_::Str(s) => Value::Str(s.clone()),
            }),
            Expr::Logical(logical) => {
                let left = self.eval(&logical.left, reporter)?;
                if logical.op.kind == TokenType::Or {
                    if left.is_truthy() {
                        return Ok(left);
                    }
                } else if !left.is_truthy() {
                    return Ok(left);
                }
                self.eval(&logical.right, reporter)
            }
            Expr::Set(set) => {
                let object = self.eval(&set.object, reporter)?;
                let instance = match object {
                    Value::Instance(inst) => inst,
                    _ => return Err(LoxError::runtime(&set.name, "Only instances have fields.")),
                };
                let value = self.eval(&set.value, reporter)?;
                instance.borrow_mut().set(&set.name, value.clone());
                Ok(value)
            }
            Expr::SetArray(set) => {
                let object = self.eval(&set.object, reporter)?;
                let array = match object {
                    Value::Array(elements) => elements,
                    _ => return Err(LoxError::runtime(&set.bracket, "Can only index array.")),
                };
                let index = match self.eval(&set.index, reporter)? {
                    Value::Number(n) => n,
                    _ => return Err(LoxError::runtime(&set.bracket, "Index must be a number.")),
                };
                let value = self.eval(&set.value, reporter)?;
                let i = clean_index(index, array.borrow().len())?;
                array.borrow_mut()[i] = value.clone();
                Ok(value)
            }
            Expr::Ternary(ternary) => {
                if self.eval(&ternary.cond, reporter)?.is_truthy() {
                    self.eval(&ternary.then_branch, reporter)
                } else {
                    self.eval(&ternary.else_branch, reporter)
                }
            }
            Expr::This(this) => self.lookup_variable(this.id, &this.keyword),
            Expr::Unary(unary) => self.eval_unary(unary, reporter),
            Expr::Variable(var) => self.lookup_variable(var.id, &var.name),
        }
    }

    fn eval_binary(&mut self, binary: &BinaryExpr, reporter: &mut dyn Reporter) -> Result<Value, LoxError> {
        let left = self.eval(&binary.left, reporter)?;
        let right = self.eval(&binary.right, reporter)?;
        let op = &binary.op;

        match op.kind {
            TokenType::Comma => Ok(right),
            TokenType::EqualEqual => Ok(Value::Bool(left == right)),
            TokenType::BangEqual => Ok(Value::Bool(left != right)),
            TokenType::Greater => {
                let (l, r) = check_numbers(op, &left, &right)?;
                Ok(Value::Bool(l > r))
            }
            TokenType::GreaterEqual => {
                let (l, r) = check_numbers(op, &left, &right)?;
                Ok(Value::Bool(l >= r))
            }
            TokenType::Less => {
                let (l, r) = check_numbers(op, &left, &right)?;
                Ok(Value::Bool(l < r))
            }
            TokenType::LessEqual => {
                let (l, r) = check_numbers(op, &left, &right)?;
                Ok(Value::Bool(l <= r))
            }
            TokenType::Minus => {
                let (l, r) = check_numbers(op, &left, &right)?;
                Ok(Value::Number(l - r))
            }
            TokenType::Plus => match (&left, &right) {
                (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
                (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{}{}", stringify(&left), stringify(&right)))),
                _ => Err(LoxError::runtime(op, "Operands must be two numbers or two strings.")),
            },
            TokenType::Slash => {
                let (l, r) = check_numbers(op, &left, &right)?;
                if r == 0.0 {
                    return Err(LoxError::runtime(op, "Division by zero."));
                }
                Ok(Value::Number(l / r))
            }
            TokenType::Star => {
                let (l, r) = check_numbers(op, &left, &right)?;
                Ok(Value::Number(l * r))
            }
            _ => unreachable!("scanner/parser never produce this token as a binary operator"),
        }
    }

    fn eval_unary(&mut self, unary: &UnaryExpr, reporter: &mut dyn Reporter) -> Result<Value, LoxError> {
        let right = self.eval(&unary.right, reporter)?;
        match unary.op.kind {
            TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
            TokenType::Minus => match right {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(LoxError::runtime(&unary.op, "Operand must be a number.")),
            },
            _ => unreachable!("scanner/parser never produce this token as a unary operator"),
        }
    }

    fn eval_call(&mut self, call: &CallExpr, reporter: &mut dyn Reporter) -> Result<Value, LoxError> {
        let callee = self.eval(&call.callee, reporter)?;
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.eval(arg, reporter)?);
        }

        let arity = match &callee {
            Value::Function(f) => f.arity(),
            Value::Class(c) => c.arity(),
            Value::Native(n) => n.arity,
            _ => return Err(LoxError::runtime(&call.paren, "Can only call functions and classes.")),
        };
        if !arity.matches(args.len()) {
            return Err(LoxError::runtime(&call.paren, format!("Expected {} arguments but got {}.", arity, args.len())));
        }

        match callee {
            Value::Function(f) => f.call(self, args, reporter),
            Value::Class(c) => LoxClass::construct(&c, self, args, reporter),
            Value::Native(n) => (n.func)(self, args),
            _ => unreachable!("checked above"),
        }
    }

    fn eval_index(&mut self, index: &IndexExpr, reporter: &mut dyn Reporter) -> Result<Value, LoxError> {
        let object = self.eval(&index.object, reporter)?;
        let idx = match self.eval(&index.index, reporter)? {
            Value::Number(n) => n,
            _ => return Err(LoxError::runtime(&index.bracket, "Index must be a number.")),
        };

        match object {
            Value::Array(elements) => {
                let i = clean_index(idx, elements.borrow().len())?;
                Ok(elements.borrow()[i].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = clean_index(idx, chars.len())?;
                Ok(Value::Str(chars[i].to_string()))
            }
            _ => Err(LoxError::runtime(&index.bracket, "Can only index arrays and strings.")),
        }
    }

    fn eval_get(&mut self, get: &GetExpr, reporter: &mut dyn Reporter) -> Result<Value, LoxError> {
        let object = self.eval(&get.object, reporter)?;
        match object {
            Value::Instance(instance) => match LoxInstance::get(&instance, &get.name) {
                Some(Value::Function(f)) if f.is_getter => f.call(self, Vec::new(), reporter),
                Some(value) => Ok(value),
                None => Err(LoxError::runtime(&get.name, format!("Undefined property '{}'.", get.name.lexeme))),
            },
            Value::Class(class) => match class.find_class_method(&get.name.lexeme, true) {
                Some(method) => Ok(Value::Function(method)),
                None => Err(LoxError::runtime(&get.name, format!("Undefined property '{}'.", get.name.lexeme))),
            },
            _ => Err(LoxError::runtime(&get.name, "Only instances have properties.")),
        }
    }
}

fn check_numbers(op: &Token, left: &Value, right: &Value) -> Result<(f64, f64), LoxError> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
        _ => Err(LoxError::runtime(op, "Operands must be numbers.")),
    }
}

/// Truncates `index` toward zero and bounds-checks it against `len`.
fn clean_index(index: f64, len: usize) -> Result<usize, LoxError> {
    let truncated = index.trunc();
    if truncated >= 0.0 && (truncated as usize) < len {
        Ok(truncated as usize)
    } else {
        Err(LoxError::exception("Invalid index."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;

    /// Runs `source` (with `result` bound to whatever the source stores
    /// into it) and returns the stringified value of the global `result`,
    /// sidestepping stdout capture.
    fn eval_result(source: &str) -> (String, CollectingReporter) {
        let mut interpreter = Interpreter::new(false);
        let mut reporter = CollectingReporter::new();
        let wrapped = format!("var result = 0; {}", source);
        crate::run_source(&wrapped, &mut interpreter, &mut reporter);
        let token = Token::new(TokenType::Identifier, "result", None, 0);
        let value = Environment::get(&interpreter.globals, &token).unwrap_or(Value::Nil);
        (stringify(&value), reporter)
    }

    #[test]
    fn arithmetic_precedence() {
        let (value, reporter) = eval_result("result = 1 + 2 * 3;");
        assert!(!reporter.had_error());
        assert_eq!(value, "7");
    }

    #[test]
    fn string_concatenation() {
        let (value, reporter) = eval_result("var a = \"a\"; var b = \"b\"; result = a + b;");
        assert!(!reporter.had_error());
        assert_eq!(value, "ab");
    }

    #[test]
    fn recursive_fibonacci() {
        let (value, reporter) = eval_result(
            "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); } result = fib(10);",
        );
        assert!(!reporter.had_error());
        assert_eq!(value, "55");
    }

    #[test]
    fn method_call_prints_via_field_assignment() {
        let (value, reporter) = eval_result(
            "class A { greet() { return \"hi\"; } } result = A().greet();",
        );
        assert!(!reporter.had_error());
        assert_eq!(value, "hi");
    }

    #[test]
    fn getter_is_auto_invoked() {
        let (value, reporter) = eval_result("class B { area { return 2 * 2; } } result = B().area;");
        assert!(!reporter.had_error());
        assert_eq!(value, "4");
    }

    #[test]
    fn multiple_inheritance_first_hit_wins_left_to_right() {
        let (value, reporter) = eval_result(
            "class P { speak() { return \"p\"; } }\n\
             class Q < P { speak() { return \"q\"; } }\n\
             result = Q().speak();",
        );
        assert!(!reporter.had_error());
        assert_eq!(value, "q");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let (_, reporter) = eval_result("result = 1 / 0;");
        assert!(reporter.had_runtime_error());
    }

    #[test]
    fn init_called_directly_returns_the_instance() {
        let mut interpreter = Interpreter::new(false);
        let mut reporter = CollectingReporter::new();
        crate::run_source(
            "class Point { init(x) { this.x = x; } } var p = Point(3); result = p.init(9).x;",
            &mut interpreter,
            &mut reporter,
        );
        assert!(!reporter.had_error());
        let token = Token::new(TokenType::Identifier, "result", None, 0);
        assert_eq!(Environment::get(&interpreter.globals, &token).unwrap(), Value::Number(9.0));
    }

    #[test]
    fn multiple_inheritance_falls_through_to_second_superclass() {
        let (value, reporter) = eval_result(
            "class A { } class B { hello() { return \"b\"; } } class C < A, B {} result = C().hello();",
        );
        assert!(!reporter.had_error());
        assert_eq!(value, "b");
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let (value, reporter) = eval_result(
            "fun make_counter() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }\n\
             var counter = make_counter();\n\
             counter(); counter();\n\
             result = counter();",
        );
        assert!(!reporter.had_error());
        assert_eq!(value, "3");
    }

    #[test]
    fn array_indexing_and_assignment() {
        let (value, reporter) = eval_result("var a = [1, 2, 3]; a[1] = 9; result = a[1];");
        assert!(!reporter.had_error());
        assert_eq!(value, "9");
    }

    #[test]
    fn out_of_bounds_array_index_is_an_exception() {
        let (_, reporter) = eval_result("var a = [1]; result = a[5];");
        assert!(reporter.had_runtime_error());
    }

    #[test]
    fn ternary_and_comma_operators() {
        let (value, reporter) = eval_result("result = (1, true ? \"yes\" : \"no\");");
        assert!(!reporter.had_error());
        assert_eq!(value, "yes");
    }
}
