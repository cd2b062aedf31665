//! Static pass: resolves every variable-bearing expression to a lexical
//! depth (written into `Interpreter::locals`), and enforces scoping rules
//! that don't need runtime values to check.

use crate::ast::expr::*;
use crate::ast::stmt::*;
use crate::ast::Stmt;
use crate::interpreter::Interpreter;
use crate::reporter::Reporter;
use crate::token::Token;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

struct Local {
    token: Token,
    ready: bool,
    used: bool,
}

pub fn resolve(interpreter: &mut Interpreter, reporter: &mut dyn Reporter, statements: &[Stmt]) {
    let mut resolver = Resolver {
        interpreter,
        reporter,
        scopes: Vec::new(),
        current_function: FunctionType::None,
        current_class: ClassType::None,
        loop_depth: 0,
    };
    resolver.resolve_stmts(statements);
}

struct Resolver<'a> {
    interpreter: &'a mut Interpreter,
    reporter: &'a mut dyn Reporter,
    scopes: Vec<HashMap<String, Local>>,
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'a> Resolver<'a> {
    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, local) in scope {
                if !local.used && name != "this" {
                    self.reporter.parse_error(&local.token, &format!("Unused local variable {}.", name));
                }
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.reporter.parse_error(name, "Variable with this name already declared in this scope.");
            }
            scope.insert(name.lexeme.clone(), Local { token: name.clone(), ready: false, used: false });
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(local) = scope.get_mut(&name.lexeme) {
                local.ready = true;
            }
        }
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (depth, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(local) = scope.get_mut(&name.lexeme) {
                local.used = true;
                self.interpreter.resolve(id, depth);
                return;
            }
        }
        // Not found in any local scope: it's global, left out of `locals`.
    }

    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Class(class) => self.resolve_class(class),
            Stmt::Break(keyword) => {
                if self.loop_depth == 0 {
                    self.reporter.parse_error(keyword, "Break statement outside of enclosing loop.");
                }
            }
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(&decl.params, &decl.body, FunctionType::Function);
            }
            Stmt::If(stmt) => {
                self.resolve_expr(&stmt.condition);
                self.resolve_stmt(&stmt.then_branch);
                if let Some(else_branch) = &stmt.else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::Import(_) => {}
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Return(stmt) => {
                if self.current_function == FunctionType::None {
                    self.reporter.parse_error(&stmt.keyword, "Can't return from top-level code.");
                }
                if let Some(value) = &stmt.value {
                    if self.current_function == FunctionType::Initializer {
                        self.reporter.parse_error(&stmt.keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Var(stmt) => {
                self.declare(&stmt.name);
                if let Some(init) = &stmt.initializer {
                    self.resolve_expr(init);
                }
                self.define(&stmt.name);
            }
            Stmt::While(stmt) => {
                self.resolve_expr(&stmt.condition);
                self.loop_depth += 1;
                self.resolve_stmt(&stmt.body);
                self.loop_depth -= 1;
            }
        }
    }

    fn resolve_class(&mut self, class: &ClassStmt) {
        let enclosing_class = self.current_class;
        self.current_class = if class.superclasses.is_empty() { ClassType::Class } else { ClassType::Subclass };

        self.declare(&class.name);

        for superclass in &class.superclasses {
            if let Expr::Variable(v) = superclass {
                if v.name.lexeme == class.name.lexeme {
                    self.reporter.parse_error(&v.name, "A class can't inherit from itself.");
                }
            }
            self.resolve_expr(superclass);
        }

        self.define(&class.name);

        self.begin_scope();
        self.scopes
            .last_mut()
            .expect("just pushed")
            .insert("this".to_string(), Local { token: class.name.clone(), ready: true, used: true });

        for method in &class.class_methods {
            let kind = if method.name.lexeme == "init" { FunctionType::Initializer } else { FunctionType::Method };
            self.resolve_function(&method.params, &method.body, kind);
        }
        for method in &class.instance_methods {
            let kind = if method.name.lexeme == "init" { FunctionType::Initializer } else { FunctionType::Method };
            self.resolve_function(&method.params, &method.body, kind);
        }
        for getter in &class.getters {
            self.resolve_function(&getter.params, &getter.body, FunctionType::Method);
        }

        self.end_scope();

        self.current_class = enclosing_class;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Array(array) => {
                for element in &array.elements {
                    self.resolve_expr(element);
                }
            }
            Expr::Assign(assign) => {
                self.resolve_expr(&assign.value);
                self.resolve_local(assign.id, &assign.name);
            }
            Expr::Binary(binary) => {
                self.resolve_expr(&binary.left);
                self.resolve_expr(&binary.right);
            }
            Expr::Call(call) => {
                self.resolve_expr(&call.callee);
                for arg in &call.args {
                    self.resolve_expr(arg);
                }
            }
            Expr::Index(index) => {
                self.resolve_expr(&index.object);
                self.resolve_expr(&index.index);
            }
            Expr::Get(get) => self.resolve_expr(&get.object),
            Expr::Grouping(inner) => self.resolve_expr(inner),
            Expr::Lambda(lambda) => self.resolve_function(&lambda.params, &lambda.body, FunctionType::Function),
            Expr::Literal(_) => {}
            Expr::Logical(logical) => {
                self.resolve_expr(&logical.left);
                self.resolve_expr(&logical.right);
            }
            Expr::Set(set) => {
                self.resolve_expr(&set.value);
                self.resolve_expr(&set.object);
            }
            Expr::SetArray(set) => {
                self.resolve_expr(&set.value);
                self.resolve_expr(&set.object);
                self.resolve_expr(&set.index);
            }
            Expr::Ternary(ternary) => {
                self.resolve_expr(&ternary.cond);
                self.resolve_expr(&ternary.then_branch);
                self.resolve_expr(&ternary.else_branch);
            }
            Expr::This(this) => {
                if self.current_class == ClassType::None {
                    self.reporter.parse_error(&this.keyword, "Cannot use 'this' outside of a class.");
                } else {
                    self.resolve_local(this.id, &this.keyword);
                }
            }
            Expr::Unary(unary) => self.resolve_expr(&unary.right),
            Expr::Variable(var) => {
                if let Some(scope) = self.scopes.last() {
                    if let Some(local) = scope.get(&var.name.lexeme) {
                        if !local.ready {
                            self.reporter.parse_error(&var.name, "Can't read local variable in its own initializer.");
                        }
                    }
                }
                self.resolve_local(var.id, &var.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use crate::scanner::Scanner;

    fn check(source: &str) -> CollectingReporter {
        let mut reporter = CollectingReporter::new();
        let tokens = Scanner::new(source).scan(&mut reporter);
        let statements = crate::parser::parse(tokens, &mut reporter);
        let mut interpreter = Interpreter::new(false);
        resolve(&mut interpreter, &mut reporter, &statements);
        reporter
    }

    #[test]
    fn self_read_in_initializer_is_an_error() {
        let reporter = check("var a = 1; { var a = a; }");
        assert!(reporter.had_error());
    }

    #[test]
    fn shadowing_in_the_same_scope_is_an_error() {
        let reporter = check("{ var a = 1; var a = 2; }");
        assert!(reporter.had_error());
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let reporter = check("return 1;");
        assert!(reporter.had_error());
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let reporter = check("break;");
        assert!(reporter.had_error());
    }

    #[test]
    fn this_outside_class_is_an_error() {
        let reporter = check("print this;");
        assert!(reporter.had_error());
    }

    #[test]
    fn class_inheriting_itself_is_an_error() {
        let reporter = check("class Oops < Oops {}");
        assert!(reporter.had_error());
    }

    #[test]
    fn well_formed_class_and_loop_resolve_cleanly() {
        let reporter = check(
            "class Greeter {\n\
               init(name) { this.name = name; }\n\
               greet() { return this.name; }\n\
             }\n\
             var g = Greeter(\"a\");\n\
             while (false) { break; }\n\
             print g.greet();",
        );
        assert!(!reporter.had_error());
    }

    #[test]
    fn initializer_with_explicit_return_value_is_an_error() {
        let reporter = check("class C { init() { return 1; } }");
        assert!(reporter.had_error());
    }
}
