// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Expression evaluation over token runs.
//!
//! The parser hands the evaluator a slice of tokens making up one
//! expression (an instruction operand or a directive argument). Values
//! are computed in `i64`; the caller narrows to 8 or 16 bits at emission.
//!
//! Grammar (left-associative within each level):
//!
//! ```text
//! expression     ::= additive
//! additive       ::= multiplicative (('+' | '-') multiplicative)*
//! multiplicative ::= unary (('*' | '/') unary)*
//! unary          ::= ('+' | '-') unary | primary
//! primary        ::= NUMBER | '(' expression ')' | '$' | LABEL
//! ```

use crate::core::symbol_table::SymbolTable;
use crate::core::tokenizer::{OperatorKind, Span, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalErrorKind {
    UndefinedSymbol(String),
    DivByZero,
    SyntaxError,
    EmptyExpr,
    UnmatchedParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Span,
}

impl EvalError {
    fn new(kind: EvalErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            EvalErrorKind::UndefinedSymbol(name) => format!("Undefined symbol: {name}"),
            EvalErrorKind::DivByZero => "Division by zero".to_string(),
            EvalErrorKind::SyntaxError => "Syntax error in expression".to_string(),
            EvalErrorKind::EmptyExpr => "Empty expression".to_string(),
            EvalErrorKind::UnmatchedParen => "Unmatched parenthesis".to_string(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EvalError {}

/// Evaluate an expression token run.
///
/// `pc` is the value of `$` (the address at which the enclosing statement
/// starts). With `allow_forward`, an unknown symbol evaluates to 0 so
/// pass-1 sizing can proceed before all labels are bound; without it, an
/// unknown symbol is a hard error.
pub fn evaluate(
    tokens: &[Token],
    symbols: &SymbolTable,
    pc: u16,
    allow_forward: bool,
) -> Result<i64, EvalError> {
    let mut cursor = ExprCursor {
        tokens,
        index: 0,
        symbols,
        pc,
        allow_forward,
    };
    if cursor.at_end() {
        return Err(EvalError::new(EvalErrorKind::EmptyExpr, cursor.here()));
    }
    let value = cursor.additive()?;
    if !cursor.at_end() {
        return Err(EvalError::new(EvalErrorKind::SyntaxError, cursor.here()));
    }
    Ok(value)
}

struct ExprCursor<'a> {
    tokens: &'a [Token],
    index: usize,
    symbols: &'a SymbolTable,
    pc: u16,
    allow_forward: bool,
}

impl ExprCursor<'_> {
    fn additive(&mut self) -> Result<i64, EvalError> {
        let mut value = self.multiplicative()?;
        loop {
            match self.peek_operator() {
                Some(OperatorKind::Plus) => {
                    self.index += 1;
                    value = value.wrapping_add(self.multiplicative()?);
                }
                Some(OperatorKind::Minus) => {
                    self.index += 1;
                    value = value.wrapping_sub(self.multiplicative()?);
                }
                _ => return Ok(value),
            }
        }
    }

    fn multiplicative(&mut self) -> Result<i64, EvalError> {
        let mut value = self.unary()?;
        loop {
            match self.peek_operator() {
                Some(OperatorKind::Multiply) => {
                    self.index += 1;
                    value = value.wrapping_mul(self.unary()?);
                }
                Some(OperatorKind::Divide) => {
                    self.index += 1;
                    let span = self.here();
                    let divisor = self.unary()?;
                    if divisor == 0 {
                        return Err(EvalError::new(EvalErrorKind::DivByZero, span));
                    }
                    value = floor_div(value, divisor);
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<i64, EvalError> {
        match self.peek_operator() {
            Some(OperatorKind::Plus) => {
                self.index += 1;
                self.unary()
            }
            Some(OperatorKind::Minus) => {
                self.index += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i64, EvalError> {
        let token = match self.tokens.get(self.index) {
            Some(token) => token,
            None => return Err(EvalError::new(EvalErrorKind::SyntaxError, self.here())),
        };
        match &token.kind {
            TokenKind::Number(num) => {
                self.index += 1;
                Ok(num.value)
            }
            TokenKind::Operator(OperatorKind::Dollar) => {
                self.index += 1;
                Ok(self.pc as i64)
            }
            TokenKind::Label(name) => {
                self.index += 1;
                match self.symbols.lookup(name) {
                    Some(address) => Ok(address as i64),
                    None if self.allow_forward => Ok(0),
                    None => Err(EvalError::new(
                        EvalErrorKind::UndefinedSymbol(name.clone()),
                        token.span,
                    )),
                }
            }
            TokenKind::OpenParen => {
                self.index += 1;
                let value = self.additive()?;
                match self.tokens.get(self.index).map(|t| &t.kind) {
                    Some(TokenKind::CloseParen) => {
                        self.index += 1;
                        Ok(value)
                    }
                    _ => Err(EvalError::new(EvalErrorKind::UnmatchedParen, token.span)),
                }
            }
            _ => Err(EvalError::new(EvalErrorKind::SyntaxError, token.span)),
        }
    }

    fn peek_operator(&self) -> Option<OperatorKind> {
        match self.tokens.get(self.index).map(|t| &t.kind) {
            Some(TokenKind::Operator(op)) => Some(*op),
            _ => None,
        }
    }

    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn here(&self) -> Span {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }
}

/// Integer division truncating toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Returns true if the value fits in an unsigned 8-bit byte.
pub fn value_fits_byte(value: i64) -> bool {
    (0..=0xff).contains(&value)
}

/// Returns true if the value fits in an unsigned 16-bit word.
pub fn value_fits_word(value: i64) -> bool {
    (0..=0xffff).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::symbol_table::SymbolKind;
    use crate::core::tokenizer::{Lexicon, Tokenizer};
    use proptest::prelude::*;

    fn tokens(expr: &str) -> Vec<Token> {
        let mut toks = Tokenizer::tokenize(expr, Lexicon::empty());
        toks.retain(|t| {
            !matches!(
                t.kind,
                TokenKind::Eof | TokenKind::Newline | TokenKind::Comment
            )
        });
        toks
    }

    fn eval(expr: &str) -> Result<i64, EvalError> {
        let symbols = SymbolTable::new();
        evaluate(&tokens(expr), &symbols, 0x4200, false)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("2+3*4").unwrap(), 14);
        assert_eq!(eval("(2+3)*4").unwrap(), 20);
        assert_eq!(eval("10-2-3").unwrap(), 5);
        assert_eq!(eval("20/2/5").unwrap(), 2);
    }

    #[test]
    fn unary_operators() {
        assert_eq!(eval("-5").unwrap(), -5);
        assert_eq!(eval("+5").unwrap(), 5);
        assert_eq!(eval("--5").unwrap(), 5);
        assert_eq!(eval("2*-3").unwrap(), -6);
    }

    #[test]
    fn division_floors_toward_negative_infinity() {
        assert_eq!(eval("7/2").unwrap(), 3);
        assert_eq!(eval("-7/2").unwrap(), -4);
        assert_eq!(eval("7/-2").unwrap(), -4);
        assert_eq!(eval("-7/-2").unwrap(), 3);
    }

    #[test]
    fn division_by_zero_errors() {
        let err = eval("1/0").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::DivByZero);
    }

    #[test]
    fn dollar_is_current_address() {
        assert_eq!(eval("$").unwrap(), 0x4200);
        assert_eq!(eval("$+3").unwrap(), 0x4203);
    }

    #[test]
    fn symbols_resolve() {
        let mut symbols = SymbolTable::new();
        let _ = symbols.define("RESULT", 0x4209, SymbolKind::Label);
        let value = evaluate(&tokens("RESULT+1"), &symbols, 0, false).unwrap();
        assert_eq!(value, 0x420A);
    }

    #[test]
    fn undefined_symbol_is_hard_error_without_forward() {
        let symbols = SymbolTable::new();
        let err = evaluate(&tokens("NOWHERE"), &symbols, 0, false).unwrap_err();
        assert_eq!(
            err.kind,
            EvalErrorKind::UndefinedSymbol("NOWHERE".to_string())
        );
    }

    #[test]
    fn undefined_symbol_is_zero_with_forward() {
        let symbols = SymbolTable::new();
        let value = evaluate(&tokens("NOWHERE+5"), &symbols, 0, true).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn empty_expression_errors() {
        let err = eval("").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::EmptyExpr);
    }

    #[test]
    fn unmatched_paren_errors() {
        let err = eval("(1+2").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::UnmatchedParen);
    }

    #[test]
    fn trailing_tokens_are_a_syntax_error() {
        let err = eval("1 2").unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::SyntaxError);
    }

    #[test]
    fn number_radixes_evaluate() {
        assert_eq!(eval("$FF").unwrap(), 255);
        assert_eq!(eval("0FFh").unwrap(), 255);
        assert_eq!(eval("FFH").unwrap(), 255);
        assert_eq!(eval("EAh").unwrap(), 0xEA);
        assert_eq!(eval("%1010").unwrap(), 10);
        assert_eq!(eval("255").unwrap(), 255);
    }

    proptest! {
        #[test]
        fn decimal_literals_round_trip(value in 0u32..=0xFFFF) {
            prop_assert_eq!(eval(&value.to_string()).unwrap(), value as i64);
        }

        #[test]
        fn hex_literals_round_trip(value in 0u32..=0xFFFF) {
            prop_assert_eq!(eval(&format!("${value:X}")).unwrap(), value as i64);
            prop_assert_eq!(eval(&format!("0{value:X}H")).unwrap(), value as i64);
        }

        #[test]
        fn floor_div_matches_euclidean_identity(a in -10_000i64..10_000, b in 1i64..100) {
            let q = floor_div(a, b);
            prop_assert!(q * b <= a);
            prop_assert!((q + 1) * b > a);
        }

        #[test]
        fn addition_is_commutative(a in 0i64..0x8000, b in 0i64..0x8000) {
            let left = eval(&format!("{a}+{b}")).unwrap();
            let right = eval(&format!("{b}+{a}")).unwrap();
            prop_assert_eq!(left, right);
        }
    }
}
