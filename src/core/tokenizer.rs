// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Tokenizer for Z80 assembly source with spans.
//!
//! The tokenizer is a single pass over the whole source string. Newlines
//! are significant (they terminate statements) and are emitted as tokens;
//! comments are emitted as tokens and filtered by the parser on intake.
//! Identifier classification (mnemonic/register/directive) is provided by
//! a [`Lexicon`] so the scanner itself stays table-free.

use crate::core::text_utils::{
    is_bin_digit, is_digit, is_hex_digit, is_ident_char, is_ident_start, is_space,
};

/// Classification callbacks for identifier tokens.
///
/// After scanning an identifier the tokenizer uppercases it and asks, in
/// order: mnemonic, register, directive. Anything left over is a label.
#[derive(Clone, Copy)]
pub struct Lexicon {
    pub is_mnemonic: fn(&str) -> bool,
    pub is_register: fn(&str) -> bool,
    pub is_directive: fn(&str) -> bool,
}

fn no(_ident: &str) -> bool {
    false
}

impl Lexicon {
    /// A lexicon that classifies every identifier as a label.
    pub fn empty() -> Self {
        Self {
            is_mnemonic: no,
            is_register: no,
            is_directive: no,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub col_start: usize,
    pub col_end: usize,
}

impl Span {
    fn new(line: u32, start: usize, end: usize) -> Self {
        Self {
            line,
            col_start: start + 1,
            col_end: end + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Plus,
    Minus,
    Multiply,
    Divide,
    /// `$` standing alone: the current assembly address.
    Dollar,
}

/// A numeric literal with the radix it was written in. The radix only
/// matters for diagnostics; the value is already parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberLiteral {
    pub value: i64,
    pub base: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier that is not a mnemonic, register, or directive. Uppercased.
    Label(String),
    Mnemonic(String),
    Register(String),
    Directive(String),
    Number(NumberLiteral),
    /// String literal body, one byte per character, no escape processing.
    String(Vec<u8>),
    Operator(OperatorKind),
    OpenParen,
    CloseParen,
    Comma,
    Colon,
    Newline,
    Comment,
    Eof,
    /// Unrecognized input; scanning continues after it.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Original source text, casing preserved.
    pub raw: String,
}

impl Token {
    pub fn line(&self) -> u32 {
        self.span.line
    }

    pub fn column(&self) -> usize {
        self.span.col_start
    }
}

pub struct Tokenizer<'a> {
    input: &'a [u8],
    cursor: usize,
    line: u32,
    line_start: usize,
    lexicon: Lexicon,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(source: &'a str, lexicon: Lexicon) -> Self {
        Self {
            input: source.as_bytes(),
            cursor: 0,
            line: 1,
            line_start: 0,
            lexicon,
        }
    }

    /// Tokenize the whole source. The result always ends with `Eof`.
    #[must_use]
    pub fn tokenize(source: &'a str, lexicon: Lexicon) -> Vec<Token> {
        let mut scanner = Self::new(source, lexicon);
        let mut tokens = Vec::new();
        loop {
            let token = scanner.next_token();
            let at_end = token.kind == TokenKind::Eof;
            tokens.push(token);
            if at_end {
                break;
            }
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_white();
        let start = self.cursor;
        let c = self.current_byte();
        match c {
            0 if self.cursor >= self.input.len() => self.make(TokenKind::Eof, start),
            b'\n' => {
                self.cursor += 1;
                let token = self.make(TokenKind::Newline, start);
                self.line += 1;
                self.line_start = self.cursor;
                token
            }
            b';' => {
                while self.current_byte() != b'\n' && self.cursor < self.input.len() {
                    self.cursor += 1;
                }
                self.make(TokenKind::Comment, start)
            }
            _ if is_ident_start(c) => self.scan_identifier(start),
            _ if is_digit(c) => self.scan_number(start),
            b'"' | b'\'' => self.scan_string(start),
            b'$' => {
                if is_hex_digit(self.peek_byte(1)) {
                    self.scan_prefixed_number(start, 16)
                } else {
                    self.cursor += 1;
                    self.make(TokenKind::Operator(OperatorKind::Dollar), start)
                }
            }
            b'%' => {
                if is_bin_digit(self.peek_byte(1)) {
                    self.scan_prefixed_number(start, 2)
                } else {
                    self.cursor += 1;
                    self.make(TokenKind::Error("Unexpected character: %".to_string()), start)
                }
            }
            _ => self.scan_punct(start, c),
        }
    }

    fn scan_punct(&mut self, start: usize, c: u8) -> Token {
        self.cursor += 1;
        let kind = match c {
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'+' => TokenKind::Operator(OperatorKind::Plus),
            b'-' => TokenKind::Operator(OperatorKind::Minus),
            b'*' => TokenKind::Operator(OperatorKind::Multiply),
            b'/' => TokenKind::Operator(OperatorKind::Divide),
            _ => TokenKind::Error(format!("Unexpected character: {}", c as char)),
        };
        self.make(kind, start)
    }

    fn scan_identifier(&mut self, start: usize) -> Token {
        while is_ident_char(self.current_byte()) {
            self.cursor += 1;
        }
        let mut upper = self.slice(start).to_ascii_uppercase();

        // AF followed immediately by ' is the shadow register pair AF'.
        if upper == "AF" && self.current_byte() == b'\'' {
            self.cursor += 1;
            upper.push('\'');
        }

        let kind = if (self.lexicon.is_mnemonic)(&upper) {
            TokenKind::Mnemonic(upper)
        } else if (self.lexicon.is_register)(&upper) {
            TokenKind::Register(upper)
        } else if (self.lexicon.is_directive)(&upper) {
            TokenKind::Directive(upper)
        } else if let Some(value) = parse_hex_suffix(&upper) {
            // Letter-leading hex literals like FFH scan as identifiers.
            TokenKind::Number(NumberLiteral { value, base: 16 })
        } else {
            TokenKind::Label(upper)
        };
        self.make(kind, start)
    }

    /// Unprefixed number: decimal digits, or hex digits with an `H` suffix.
    /// The scan is greedy over identifier characters so that forms like
    /// `0FFh` and `1AH` stay one token.
    fn scan_number(&mut self, start: usize) -> Token {
        while is_ident_char(self.current_byte()) {
            self.cursor += 1;
        }
        let text = self.slice(start).to_ascii_uppercase();

        let parsed = if text.ends_with('H') {
            parse_hex_suffix(&text).map(|v| (v, 16))
        } else {
            text.parse::<i64>().ok().map(|v| (v, 10))
        };

        match parsed {
            Some((value, base)) => {
                self.make(TokenKind::Number(NumberLiteral { value, base }), start)
            }
            None => self.make(
                TokenKind::Error(format!("Invalid number: {}", self.slice(start))),
                start,
            ),
        }
    }

    /// `$hhhh` or `%bbbb`. The prefix byte has already been checked to be
    /// followed by at least one digit of the right radix.
    fn scan_prefixed_number(&mut self, start: usize, base: u32) -> Token {
        self.cursor += 1;
        let digits_start = self.cursor;
        loop {
            let c = self.current_byte();
            let ok = match base {
                2 => is_bin_digit(c),
                _ => is_hex_digit(c),
            };
            if !ok {
                break;
            }
            self.cursor += 1;
        }
        let digits = &self.input[digits_start..self.cursor];
        let digits = String::from_utf8_lossy(digits);
        match i64::from_str_radix(&digits, base) {
            Ok(value) => self.make(TokenKind::Number(NumberLiteral { value, base }), start),
            Err(_) => self.make(
                TokenKind::Error(format!("Invalid number: {}", self.slice(start))),
                start,
            ),
        }
    }

    /// String literal. A newline terminates the literal just like the
    /// opening quote does; escape sequences are not interpreted.
    fn scan_string(&mut self, start: usize) -> Token {
        let quote = self.current_byte();
        self.cursor += 1;
        let body_start = self.cursor;
        while self.cursor < self.input.len() {
            let c = self.current_byte();
            if c == quote || c == b'\n' {
                break;
            }
            self.cursor += 1;
        }
        let bytes = self.input[body_start..self.cursor].to_vec();
        if self.current_byte() == quote {
            self.cursor += 1;
        }
        self.make(TokenKind::String(bytes), start)
    }

    fn make(&self, kind: TokenKind, start: usize) -> Token {
        let span = Span::new(
            self.line,
            start - self.line_start,
            self.cursor - self.line_start,
        );
        Token {
            kind,
            span,
            raw: self.slice(start).to_string(),
        }
    }

    fn slice(&self, start: usize) -> &str {
        std::str::from_utf8(&self.input[start..self.cursor]).unwrap_or("")
    }

    fn skip_white(&mut self) {
        while is_space(self.current_byte()) {
            self.cursor += 1;
        }
    }

    fn current_byte(&self) -> u8 {
        self.input.get(self.cursor).copied().unwrap_or(0)
    }

    fn peek_byte(&self, offset: usize) -> u8 {
        self.input.get(self.cursor + offset).copied().unwrap_or(0)
    }
}

/// Parse an uppercased lexeme as a hex literal with a trailing `H`
/// suffix (`0FFH`, `EAH`). Returns `None` when the suffix or the digits
/// are missing.
fn parse_hex_suffix(text: &str) -> Option<i64> {
    let digits = text.strip_suffix('H')?;
    if digits.is_empty() || !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    i64::from_str_radix(digits, 16).ok()
}
