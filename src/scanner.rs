//! Source text → token stream.

use crate::reporter::Reporter;
use crate::token::{Literal, Token, TokenType};
use itertools::{multipeek, MultiPeek};
use std::str::Chars;

const KEYWORDS: &[(&str, TokenType)] = &[
    ("and", TokenType::And),
    ("break", TokenType::Break),
    ("class", TokenType::Class),
    ("else", TokenType::Else),
    ("false", TokenType::False),
    ("fun", TokenType::Fun),
    ("for", TokenType::For),
    ("if", TokenType::If),
    ("import", TokenType::Import),
    ("nil", TokenType::Nil),
    ("or", TokenType::Or),
    ("print", TokenType::Print),
    ("return", TokenType::Return),
    ("this", TokenType::This),
    ("true", TokenType::True),
    ("var", TokenType::Var),
    ("while", TokenType::While),
];

fn keyword(text: &str) -> Option<TokenType> {
    KEYWORDS.iter().find(|(kw, _)| *kw == text).map(|(_, t)| *t)
}

/// Single left-to-right pass over the source text, two characters of
/// lookahead via `itertools::multipeek` (the same tool the closest teacher
/// scanner variants reach for instead of hand-rolled index bookkeeping).
pub struct Scanner<'a> {
    chars: MultiPeek<Chars<'a>>,
    tokens: Vec<Token>,
    lexeme: String,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: multipeek(source.chars()),
            tokens: Vec::new(),
            lexeme: String::new(),
            line: 1,
        }
    }

    /// Scans the whole source, reporting lexical errors through `reporter`.
    /// Always produces a token list terminated with `EOF`.
    pub fn scan(mut self, reporter: &mut dyn Reporter) -> Vec<Token> {
        while !self.is_at_end() {
            self.lexeme.clear();
            self.scan_token(reporter);
        }
        self.tokens.push(Token::eof(self.line));
        self.tokens
    }

    fn is_at_end(&mut self) -> bool {
        self.chars.reset_peek();
        self.chars.peek().is_none()
    }

    fn advance(&mut self) -> char {
        let c = self.chars.next().expect("advance called at end of input");
        self.lexeme.push(c);
        if c == '\n' {
            self.line += 1;
        }
        c
    }

    fn peek(&mut self) -> char {
        self.chars.reset_peek();
        *self.chars.peek().unwrap_or(&'\0')
    }

    fn peek_next(&mut self) -> char {
        self.chars.reset_peek();
        self.chars.peek();
        *self.chars.peek().unwrap_or(&'\0')
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn push(&mut self, kind: TokenType) {
        self.push_literal(kind, None);
    }

    fn push_literal(&mut self, kind: TokenType, literal: Option<Literal>) {
        self.tokens.push(Token::new(kind, self.lexeme.clone(), literal, self.line));
    }

    fn scan_token(&mut self, reporter: &mut dyn Reporter) {
        let c = self.advance();
        match c {
            '(' => self.push(TokenType::LeftParen),
            ')' => self.push(TokenType::RightParen),
            '{' => self.push(TokenType::LeftBrace),
            '}' => self.push(TokenType::RightBrace),
            '[' => self.push(TokenType::LeftBracket),
            ']' => self.push(TokenType::RightBracket),
            ',' => self.push(TokenType::Comma),
            '.' => self.push(TokenType::Dot),
            '-' => self.push(TokenType::Minus),
            '+' => self.push(TokenType::Plus),
            ';' => self.push(TokenType::Semicolon),
            '*' => self.push(TokenType::Star),
            '?' => self.push(TokenType::Question),
            ':' => self.push(TokenType::Colon),
            '!' => {
                let kind = if self.matches('=') { TokenType::BangEqual } else { TokenType::Bang };
                self.push(kind);
            }
            '=' => {
                let kind = if self.matches('=') { TokenType::EqualEqual } else { TokenType::Equal };
                self.push(kind);
            }
            '<' => {
                let kind = if self.matches('=') { TokenType::LessEqual } else { TokenType::Less };
                self.push(kind);
            }
            '>' => {
                let kind = if self.matches('=') { TokenType::GreaterEqual } else { TokenType::Greater };
                self.push(kind);
            }
            '/' => self.scan_slash(reporter),
            ' ' | '\r' | '\t' => {}
            '\n' => {} // line already bumped by `advance`
            '"' => self.scan_string(reporter),
            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_ascii_alphabetic() => self.scan_identifier(),
            _ => reporter.error(self.line, "Unexpected character."),
        }
    }

    fn scan_slash(&mut self, reporter: &mut dyn Reporter) {
        if self.matches('/') {
            while self.peek() != '\n' && !self.is_at_end() {
                self.advance();
            }
        } else if self.matches('*') {
            while !(self.peek() == '*' && self.peek_next() == '/') && !self.is_at_end() {
                self.advance();
            }
            if self.is_at_end() {
                reporter.error(self.line, "Unterminated block comment.");
                return;
            }
            self.advance();
            self.advance();
        } else {
            self.push(TokenType::Slash);
        }
    }

    fn scan_string(&mut self, reporter: &mut dyn Reporter) {
        while self.peek() != '"' && !self.is_at_end() {
            self.advance();
        }
        if self.is_at_end() {
            reporter.error(self.line, "Unterminated string.");
            return;
        }
        self.advance(); // closing quote
        let value = self.lexeme[1..self.lexeme.len() - 1].to_string();
        self.push_literal(TokenType::String, Some(Literal::Str(value)));
    }

    fn scan_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let value: f64 = self.lexeme.parse().expect("scanned number must parse as f64");
        self.push_literal(TokenType::Number, Some(Literal::Number(value)));
    }

    fn scan_identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() {
            self.advance();
        }
        let kind = keyword(&self.lexeme).unwrap_or(TokenType::Identifier);

        if kind == TokenType::Import {
            while matches!(self.peek(), ' ' | '\r' | '\t') {
                self.advance();
            }
            self.lexeme.clear();
            while self.peek() != ';' && !self.is_at_end() {
                self.advance();
            }
        }

        self.push(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut reporter = CollectingReporter::new();
        Scanner::new(source).scan(&mut reporter).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_punctuation_and_operators() {
        assert_eq!(
            kinds("(){}[],.-+;*?:"),
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::LeftBracket,
                TokenType::RightBracket,
                TokenType::Comma,
                TokenType::Dot,
                TokenType::Minus,
                TokenType::Plus,
                TokenType::Semicolon,
                TokenType::Star,
                TokenType::Question,
                TokenType::Colon,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_one_and_two_character_operators() {
        assert_eq!(
            kinds("! != = == < <= > >="),
            vec![
                TokenType::Bang,
                TokenType::BangEqual,
                TokenType::Equal,
                TokenType::EqualEqual,
                TokenType::Less,
                TokenType::LessEqual,
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scans_string_and_number_literals() {
        let mut reporter = CollectingReporter::new();
        let tokens = Scanner::new("\"hi\" 12.5").scan(&mut reporter);
        assert_eq!(tokens[0].literal, Some(Literal::Str("hi".to_string())));
        assert_eq!(tokens[1].literal, Some(Literal::Number(12.5)));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert_eq!(kinds("class fun var"), vec![TokenType::Class, TokenType::Fun, TokenType::Var, TokenType::Eof]);
        assert_eq!(kinds("classy"), vec![TokenType::Identifier, TokenType::Eof]);
    }

    #[test]
    fn import_lexeme_captures_verbatim_filename() {
        let mut reporter = CollectingReporter::new();
        let tokens = Scanner::new("import some path/file.lox;").scan(&mut reporter);
        assert_eq!(tokens[0].kind, TokenType::Import);
        assert_eq!(tokens[0].lexeme, "some path/file.lox");
    }

    #[test]
    fn unterminated_string_is_reported() {
        let mut reporter = CollectingReporter::new();
        Scanner::new("\"abc").scan(&mut reporter);
        assert!(reporter.had_error());
    }

    #[test]
    fn block_comments_are_skipped() {
        assert_eq!(kinds("/* comment \n spanning lines */ nil"), vec![TokenType::Nil, TokenType::Eof]);
    }
}
