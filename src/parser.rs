//! Recursive-descent parser: token list -> AST. On a parse error the
//! parser reports through `Reporter::parse_error`, synchronizes to the
//! next statement boundary, and continues — the caller never sees
//! anything but a (possibly incomplete) statement list.

use crate::ast::expr::*;
use crate::ast::stmt::*;
use crate::ast::Stmt;
use crate::reporter::Reporter;
use crate::token::{Token, TokenType};
use std::rc::Rc;

/// Marker for "a parse error was already reported"; carries no data since
/// the report itself happened at the call site.
struct ParseError;

pub fn parse(tokens: Vec<Token>, reporter: &mut dyn Reporter) -> Vec<Stmt> {
    let mut parser = Parser {
        tokens,
        current: 0,
        next_id: 0,
        reporter,
    };
    let mut statements = Vec::new();
    while !parser.is_at_end() {
        if let Some(stmt) = parser.declaration() {
            statements.push(stmt);
        }
    }
    statements
}

struct Parser<'r> {
    tokens: Vec<Token>,
    current: usize,
    next_id: NodeId,
    reporter: &'r mut dyn Reporter,
}

impl<'r> Parser<'r> {
    fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // --- declarations -----------------------------------------------

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_one(TokenType::Class) {
            self.class_declaration()
        } else if self.check(TokenType::Fun) && !self.check_next(TokenType::LeftParen) {
            self.advance();
            self.function_declaration("function").map(Stmt::Function)
        } else if self.match_one(TokenType::Var) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;

        let mut superclasses = Vec::new();
        if self.match_one(TokenType::Less) {
            let first = self.consume(TokenType::Identifier, "Expect superclass name.")?;
            superclasses.push(Expr::Variable(VariableExpr { id: self.next_id(), name: first }));
            while self.match_one(TokenType::Comma) {
                let next = self.consume(TokenType::Identifier, "Expect superclass name.")?;
                superclasses.push(Expr::Variable(VariableExpr { id: self.next_id(), name: next }));
            }
        }

        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut class_methods = Vec::new();
        let mut instance_methods = Vec::new();
        let mut getters = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if self.match_one(TokenType::Class) {
                class_methods.push(self.function_declaration("method")?);
            } else if self.check_next(TokenType::LeftParen) {
                instance_methods.push(self.function_declaration("method")?);
            } else {
                let getter_name = self.consume(TokenType::Identifier, "Expect getter name.")?;
                self.consume(TokenType::LeftBrace, "Expect '{' before the getter body.")?;
                let body = self.block()?;
                getters.push(Rc::new(FunctionStmt {
                    name: getter_name,
                    params: Vec::new(),
                    body: Rc::new(body),
                }));
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class(ClassStmt {
            name,
            superclasses,
            class_methods,
            instance_methods,
            getters,
        }))
    }

    fn function_declaration(&mut self, kind: &str) -> Result<Rc<FunctionStmt>, ParseError> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {} name.", kind))?;
        let (params, body) = self.function(kind)?;
        Ok(Rc::new(FunctionStmt { name, params, body: Rc::new(body) }))
    }

    fn function(&mut self, kind: &str) -> Result<(Vec<Token>, Vec<Stmt>), ParseError> {
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {} declaration.", kind))?;
        let mut params = Vec::new();
        if !self.check(TokenType::RightParen) {
            params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
            while self.match_one(TokenType::Comma) {
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if params.len() >= 255 {
                    let here = self.peek().clone();
                    self.reporter.parse_error(&here, "Can't have more than 255 parameters.");
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before the {} body.", kind))?;
        let body = self.block()?;
        Ok((params, body))
    }

    fn var_declaration(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_one(TokenType::Equal) { Some(self.expression()?) } else { None };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var(VarStmt { name, initializer }))
    }

    // --- statements ----------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_one(TokenType::For) {
            return self.for_statement();
        }
        if self.match_one(TokenType::If) {
            return self.if_statement();
        }
        if self.match_one(TokenType::Print) {
            return self.print_statement();
        }
        if self.match_one(TokenType::Return) {
            return self.return_statement();
        }
        if self.match_one(TokenType::While) {
            return self.while_statement();
        }
        if self.match_one(TokenType::Break) {
            return self.break_statement();
        }
        if self.match_one(TokenType::LeftBrace) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.match_one(TokenType::Import) {
            let import = Stmt::Import(self.previous().clone());
            self.consume(TokenType::Semicolon, "Expect ';' after import statement.")?;
            return Ok(import);
        }
        self.expression_statement()
    }

    fn for_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_one(TokenType::Semicolon) {
            None
        } else if self.match_one(TokenType::Var) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) { Some(self.expression()?) } else { None };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or(Expr::Literal(Literal_::Bool(true)));
        body = Stmt::While(WhileStmt { condition, body: Box::new(body) });

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_one(TokenType::Else) { Some(Box::new(self.statement()?)) } else { None };

        Ok(Stmt::If(IfStmt { condition, then_branch, else_branch }))
    }

    fn print_statement(&mut self) -> Result<Stmt, ParseError> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenType::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return(ReturnStmt { keyword, value }))
    }

    fn while_statement(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While(WhileStmt { condition, body }))
    }

    fn break_statement(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        self.consume(TokenType::Semicolon, "Expect ';' after break.")?;
        Ok(Stmt::Break(keyword))
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // --- expressions -----------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.comma()
    }

    fn comma(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary("Comma", &[TokenType::Comma], Parser::array, &[TokenType::Comma])
    }

    fn array(&mut self) -> Result<Expr, ParseError> {
        if self.match_one(TokenType::LeftBracket) {
            if self.match_one(TokenType::RightBracket) {
                return Ok(Expr::Array(ArrayExpr { elements: Vec::new() }));
            }
            let mut elements = vec![self.array()?];
            while !self.check(TokenType::RightBracket) && !self.is_at_end() {
                self.consume(TokenType::Comma, "Expect ',' to delimit array elements.")?;
                elements.push(self.array()?);
            }
            self.consume(TokenType::RightBracket, "Expect ']' to complete array.")?;
            return Ok(Expr::Array(ArrayExpr { elements }));
        }
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, ParseError> {
        if self.match_one(TokenType::Fun) {
            let (params, body) = self.function("function")?;
            let body = Rc::new(body);
            if self.match_one(TokenType::LeftParen) {
                let lambda = Expr::Lambda(LambdaExpr { params, body });
                let called = self.finish_call(lambda)?;
                return self.call_tail(called);
            }
            return Ok(Expr::Lambda(LambdaExpr { params, body }));
        }

        let expr = self.inv_ternary()?;

        if self.match_one(TokenType::Equal) {
            let equals = self.previous().clone();
            let value = self.array()?;

            return match expr {
                Expr::Variable(v) => Ok(Expr::Assign(AssignExpr {
                    id: self.next_id(),
                    name: v.name,
                    value: Box::new(value),
                })),
                Expr::Get(g) => Ok(Expr::Set(SetExpr { object: g.object, name: g.name, value: Box::new(value) })),
                Expr::Index(i) => Ok(Expr::SetArray(SetArrayExpr {
                    object: i.object,
                    index: i.index,
                    value: Box::new(value),
                    bracket: i.bracket,
                })),
                other => {
                    self.reporter.parse_error(&equals, "Invalid assignment target.");
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn inv_ternary(&mut self) -> Result<Expr, ParseError> {
        if self.match_any(&[TokenType::Question, TokenType::Colon]) {
            let here = self.peek().clone();
            self.reporter.parse_error(&here, "Ternary operator without left-hand operand.");
            self.ternary()?;
        }
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logic_or()?;
        while self.match_one(TokenType::Question) {
            let then_branch = self.ternary()?;
            if self.match_one(TokenType::Colon) {
                let else_branch = self.ternary()?;
                expr = Expr::Ternary(TernaryExpr {
                    cond: Box::new(expr),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                });
            } else {
                let here = self.peek().clone();
                return Err(self.error(&here, "Expect ':'."));
            }
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logic_and()?;
        while self.match_one(TokenType::Or) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::Logical(LogicalExpr { left: Box::new(expr), op, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_one(TokenType::And) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical(LogicalExpr { left: Box::new(expr), op, right: Box::new(right) });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(
            "Equality",
            &[TokenType::BangEqual, TokenType::EqualEqual],
            Parser::comparison,
            &[TokenType::BangEqual, TokenType::EqualEqual],
        )
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let ops = [TokenType::Greater, TokenType::GreaterEqual, TokenType::Less, TokenType::LessEqual];
        self.parse_binary("Comparison", &ops, Parser::term, &ops)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary("Term", &[TokenType::Minus, TokenType::Plus], Parser::factor, &[TokenType::Plus])
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        self.parse_binary(
            "Factor",
            &[TokenType::Slash, TokenType::Star],
            Parser::unary,
            &[TokenType::Slash, TokenType::Star],
        )
    }

    /// Shared shape for left-associative binary levels. If the level's
    /// operator appears with no left operand (`invalid_ops`), reports it,
    /// discards one parse of the sub-level, then parses again from there.
    fn parse_binary(
        &mut self,
        name: &str,
        ops: &[TokenType],
        subexpr: fn(&mut Parser<'r>) -> Result<Expr, ParseError>,
        invalid_ops: &[TokenType],
    ) -> Result<Expr, ParseError> {
        fn parse_valid<'r>(
            p: &mut Parser<'r>,
            ops: &[TokenType],
            subexpr: fn(&mut Parser<'r>) -> Result<Expr, ParseError>,
        ) -> Result<Expr, ParseError> {
            let mut expr = subexpr(p)?;
            while p.match_any(ops) {
                let op = p.previous().clone();
                let right = subexpr(p)?;
                expr = Expr::Binary(BinaryExpr { left: Box::new(expr), op, right: Box::new(right) });
            }
            Ok(expr)
        }

        if self.match_any(invalid_ops) {
            let here = self.peek().clone();
            self.reporter.parse_error(&here, &format!("{} operator without left-hand operand.", name));
            parse_valid(self, ops, subexpr)?;
        }

        parse_valid(self, ops, subexpr)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_any(&[TokenType::Bang, TokenType::Minus]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::Unary(UnaryExpr { op, right: Box::new(right) }));
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr, ParseError> {
        let expr = self.primary()?;
        self.call_tail(expr)
    }

    fn call_tail(&mut self, mut expr: Expr) -> Result<Expr, ParseError> {
        loop {
            if self.match_one(TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.match_one(TokenType::Dot) {
                let name = self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = Expr::Get(GetExpr { object: Box::new(expr), name });
            } else if self.match_one(TokenType::LeftBracket) {
                let bracket = self.previous().clone();
                let index = self.assignment()?;
                self.consume(TokenType::RightBracket, "Expect ']' after indexing operation.")?;
                expr = Expr::Index(IndexExpr { object: Box::new(expr), index: Box::new(index), bracket });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenType::RightParen) {
            args.push(self.array()?);
            while self.match_one(TokenType::Comma) {
                if args.len() >= 255 {
                    let here = self.peek().clone();
                    self.reporter.parse_error(&here, "Can't have more than 255 arguments.");
                }
                args.push(self.array()?);
            }
        }
        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::Call(CallExpr { callee: Box::new(callee), paren, args }))
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_one(TokenType::False) {
            return Ok(Expr::Literal(Literal_::Bool(false)));
        }
        if self.match_one(TokenType::True) {
            return Ok(Expr::Literal(Literal_::Bool(true)));
        }
        if self.match_one(TokenType::Nil) {
            return Ok(Expr::Literal(Literal_::Nil));
        }
        if self.match_any(&[TokenType::Number, TokenType::String]) {
            let token = self.previous().clone();
            return Ok(Expr::Literal(Literal_::from_token(&token).expect("scanner-produced literal token")));
        }
        if self.match_one(TokenType::This) {
            return Ok(Expr::This(ThisExpr { id: self.next_id(), keyword: self.previous().clone() }));
        }
        if self.match_one(TokenType::Identifier) {
            return Ok(Expr::Variable(VariableExpr { id: self.next_id(), name: self.previous().clone() }));
        }
        if self.match_one(TokenType::LeftParen) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        let here = self.peek().clone();
        Err(self.error(&here, "Expect expression."))
    }

    // --- token-stream plumbing -------------------------------------------

    fn match_one(&mut self, kind: TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any(&mut self, kinds: &[TokenType]) -> bool {
        kinds.iter().any(|&kind| self.match_one(kind))
    }

    fn consume(&mut self, kind: TokenType, message: &str) -> Result<Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance().clone());
        }
        let here = self.peek().clone();
        Err(self.error(&here, message))
    }

    fn check(&self, kind: TokenType) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn check_next(&self, kind: TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.kind == kind,
            None => false,
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.reporter.parse_error(token, message);
        ParseError
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenType::Semicolon {
                return;
            }
            if matches!(
                self.peek().kind,
                TokenType::Class
                    | TokenType::Fun
                    | TokenType::Var
                    | TokenType::For
                    | TokenType::If
                    | TokenType::While
                    | TokenType::Print
                    | TokenType::Return
            ) {
                return;
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use crate::scanner::Scanner;

    fn parse_source(source: &str) -> (Vec<Stmt>, CollectingReporter) {
        let mut reporter = CollectingReporter::new();
        let tokens = Scanner::new(source).scan(&mut reporter);
        let statements = parse(tokens, &mut reporter);
        (statements, reporter)
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let (stmts, reporter) = parse_source("1 + 2 * 3;");
        assert!(!reporter.had_error());
        match &stmts[0] {
            Stmt::Expression(Expr::Binary(b)) => {
                assert_eq!(b.op.kind, TokenType::Plus);
                assert!(matches!(&*b.right, Expr::Binary(r) if r.op.kind == TokenType::Star));
            }
            other => panic!("expected a binary expression statement, got {:?}", other),
        }
    }

    #[test]
    fn parses_ternary_right_associatively() {
        let (stmts, reporter) = parse_source("a ? b : c ? d : e;");
        assert!(!reporter.had_error());
        assert!(matches!(&stmts[0], Stmt::Expression(Expr::Ternary(_))));
    }

    #[test]
    fn for_loop_desugars_to_while_in_a_block() {
        let (stmts, reporter) = parse_source("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!reporter.had_error());
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert!(matches!(inner[0], Stmt::Var(_)));
                assert!(matches!(inner[1], Stmt::While(_)));
            }
            other => panic!("expected desugared for-loop block, got {:?}", other),
        }
    }

    #[test]
    fn class_with_multiple_superclasses_and_getter() {
        let (stmts, reporter) = parse_source(
            "class Cake < Flour, Sugar {\n\
               class bake() { return 1; }\n\
               mix() { return 2; }\n\
               taste { return 3; }\n\
             }",
        );
        assert!(!reporter.had_error());
        match &stmts[0] {
            Stmt::Class(class) => {
                assert_eq!(class.superclasses.len(), 2);
                assert_eq!(class.class_methods.len(), 1);
                assert_eq!(class.instance_methods.len(), 1);
                assert_eq!(class.getters.len(), 1);
            }
            other => panic!("expected a class statement, got {:?}", other),
        }
    }

    #[test]
    fn invalid_assignment_target_is_reported_but_not_fatal() {
        let (stmts, reporter) = parse_source("1 = 2;");
        assert!(reporter.had_error());
        assert!(!stmts.is_empty());
    }

    #[test]
    fn missing_semicolon_synchronizes_to_next_statement() {
        let (stmts, reporter) = parse_source("var a = 1 var b = 2; print a;");
        assert!(reporter.had_error());
        // The bad declaration is discarded; synchronize() resumes at `print a;`.
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Print(_)));
    }
}
