// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Two-pass parser for the tokenized source.
//!
//! Pass 1 walks the statements to compute addresses and bind symbols:
//! labels bind to the current address, `.EQU`/`.DEFL` bind to their
//! evaluated right-hand sides, and every instruction is sized by the
//! encoder so forward labels land on their final addresses. Pass 2 walks
//! the same tokens again and emits the intermediate list the code
//! generator consumes. Bare label operands (and `(label)` forms) are
//! deferred as [`Operand::LabelRef`] so the generator can resolve them
//! against the finished symbol table.
//!
//! Diagnostics policy: statement-level errors are reported during pass 2
//! (pass 1 would duplicate them), except `.EQU`/`.DEFL` right-hand sides,
//! which are evaluated and reported during pass 1 — that is the only pass
//! whose symbol-table state reflects source order, which is what makes a
//! forward reference detectable.

use crate::core::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::expr::{evaluate, EvalError};
use crate::core::symbol_table::{SymbolKind, SymbolTable, SymbolTableResult};
use crate::core::tokenizer::{Span, Token, TokenKind};
use crate::trs80::DEFAULT_ORG;
use crate::z80::encoder::encoded_size;
use crate::z80::registry::is_condition;

/// An instruction operand as produced by pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Named register: `A`, `HL`, `AF'`, ...
    Register(String),
    /// Register indirection: `(HL)`, `(BC)`, `(C)`, ...
    Indirect(String),
    /// Fully evaluated numeric expression.
    Immediate(i64),
    /// Parenthesized numeric expression: contents at that address.
    IndirectAddr(i64),
    /// Deferred label reference, resolved by the code generator.
    /// `indirect` records whether the label was written as `(label)`.
    LabelRef { name: String, indirect: bool },
    /// Condition code on `JP`/`JR`/`CALL`/`RET`.
    Condition(String),
}

impl Operand {
    pub fn is_label_ref(&self) -> bool {
        matches!(self, Operand::LabelRef { .. })
    }
}

/// One entry of the intermediate list handed to the code generator.
#[derive(Debug, Clone)]
pub enum IrItem {
    /// Origin change. Emitted bytes are unaffected; only the logical
    /// address counter moves.
    Org { address: u16 },
    /// Bytes from `.DB`, `.DW`, or `.DS`.
    Data {
        address: u16,
        bytes: Vec<u8>,
        label: Option<String>,
        line: u32,
    },
    /// One Z80 instruction. `bytes` is filled in by the code generator.
    Instruction {
        address: u16,
        mnemonic: String,
        operands: Vec<Operand>,
        bytes: Vec<u8>,
        label: Option<String>,
        line: u32,
    },
}

impl IrItem {
    pub fn bytes(&self) -> &[u8] {
        match self {
            IrItem::Org { .. } => &[],
            IrItem::Data { bytes, .. } => bytes,
            IrItem::Instruction { bytes, .. } => bytes,
        }
    }

    pub fn address(&self) -> u16 {
        match self {
            IrItem::Org { address } => *address,
            IrItem::Data { address, .. } => *address,
            IrItem::Instruction { address, .. } => *address,
        }
    }
}

/// Result of both parser passes.
pub struct ParseOutput {
    pub items: Vec<IrItem>,
    pub symbols: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
    pub start_address: u16,
}

/// Run both passes over a token stream.
pub fn parse(tokens: Vec<Token>) -> ParseOutput {
    let mut parser = Parser::new(tokens);
    parser.run_pass(1);
    parser.run_pass(2);
    ParseOutput {
        items: parser.items,
        symbols: parser.symbols,
        diagnostics: parser.diagnostics,
        start_address: parser.start_address,
    }
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    pass: u8,
    current_address: u16,
    start_address: u16,
    origin_seen: bool,
    emitted_any: bool,
    ended: bool,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    items: Vec<IrItem>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        // Comments never reach statement parsing; error tokens are
        // reported by the facade and dropped here so a bad character does
        // not cascade into a second syntax error.
        let tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Comment | TokenKind::Error(_)))
            .collect();
        Self {
            tokens,
            index: 0,
            pass: 1,
            current_address: DEFAULT_ORG,
            start_address: DEFAULT_ORG,
            origin_seen: false,
            emitted_any: false,
            ended: false,
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
            items: Vec::new(),
        }
    }

    fn run_pass(&mut self, pass: u8) {
        self.pass = pass;
        self.index = 0;
        self.current_address = DEFAULT_ORG;
        self.start_address = DEFAULT_ORG;
        self.origin_seen = false;
        self.emitted_any = false;
        self.ended = false;
        self.symbols.begin_pass();

        while !self.ended {
            self.skip_newlines();
            if self.at_eof() {
                break;
            }
            self.statement();
            self.sync_to_newline();
        }
    }

    // ------------------------------------------------------------------
    // Statement dispatch
    // ------------------------------------------------------------------

    fn statement(&mut self) {
        let label = self.take_label_prefix();
        if self.ended {
            return;
        }

        match self.peek_kind().cloned() {
            Some(TokenKind::Directive(name)) => {
                self.index += 1;
                self.directive(&name, label);
            }
            Some(TokenKind::Mnemonic(name)) => {
                self.index += 1;
                self.instruction(&name, label);
            }
            Some(TokenKind::Newline) | Some(TokenKind::Eof) | None => {}
            Some(_) => {
                let span = self.here();
                let raw = self.peek_raw();
                self.report(
                    Severity::Error,
                    AsmErrorKind::Syntax,
                    "Unexpected token",
                    Some(&raw),
                    span,
                );
            }
        }
    }

    /// Consume an optional label prefix. `NAME:` binds immediately; a
    /// bare `NAME` is consumed only when a directive follows (the
    /// `.EQU`/`.DEFL` forms take the name as their left-hand side, any
    /// other directive gets an address label). Returns the label to
    /// attach to the statement's first emitted record.
    fn take_label_prefix(&mut self) -> Option<String> {
        let TokenKind::Label(name) = self.peek_kind()? else {
            return None;
        };
        let name = name.clone();

        match self.peek_kind_at(1) {
            Some(TokenKind::Colon) => {
                self.index += 2;
                if let Some(kind) = self.peek_assignment_directive() {
                    self.index += 1;
                    self.assignment(&name, kind);
                    return None;
                }
                self.bind_label(&name);
                Some(name)
            }
            Some(TokenKind::Directive(_)) => {
                self.index += 1;
                if let Some(kind) = self.peek_assignment_directive() {
                    self.index += 1;
                    self.assignment(&name, kind);
                    return None;
                }
                self.bind_label(&name);
                Some(name)
            }
            _ => None,
        }
    }

    fn peek_assignment_directive(&self) -> Option<SymbolKind> {
        match self.peek_kind() {
            Some(TokenKind::Directive(d)) => match d.trim_start_matches('.') {
                "EQU" => Some(SymbolKind::Equ),
                "DEFL" => Some(SymbolKind::Defl),
                _ => None,
            },
            _ => None,
        }
    }

    fn bind_label(&mut self, name: &str) {
        let result = self
            .symbols
            .define(name, self.current_address, SymbolKind::Label);
        if result == SymbolTableResult::Redefined && self.pass == 2 {
            let span = self.here();
            self.report(
                Severity::Warning,
                AsmErrorKind::SymbolRedefined,
                "Symbol redefined",
                Some(name),
                span,
            );
        }
    }

    // ------------------------------------------------------------------
    // Directives
    // ------------------------------------------------------------------

    fn directive(&mut self, name: &str, label: Option<String>) {
        match name.trim_start_matches('.') {
            "ORG" => self.dir_org(),
            "DB" | "DEFB" | "DEFM" => self.dir_db(label),
            "DW" | "DEFW" => self.dir_dw(label),
            "DS" | "DEFS" => self.dir_ds(label),
            "EQU" | "DEFL" => {
                let span = self.here();
                self.report(
                    Severity::Error,
                    AsmErrorKind::Syntax,
                    "Assignment directive requires a label",
                    Some(name),
                    span,
                );
            }
            "END" => {
                self.ended = true;
                self.index = self.tokens.len();
            }
            other => {
                let span = self.here();
                self.report(
                    Severity::Error,
                    AsmErrorKind::Syntax,
                    "Unknown directive",
                    Some(other),
                    span,
                );
            }
        }
    }

    fn dir_org(&mut self) {
        let run = self.collect_until_newline();
        match self.eval(&run) {
            Ok(value) => {
                let address = (value & 0xFFFF) as u16;
                if !self.origin_seen && !self.emitted_any {
                    self.start_address = address;
                }
                self.origin_seen = true;
                self.current_address = address;
                if self.pass == 2 {
                    self.items.push(IrItem::Org { address });
                }
            }
            Err(err) => self.report_eval(err),
        }
    }

    fn dir_db(&mut self, label: Option<String>) {
        let stmt_addr = self.current_address;
        let line = self.here().line;
        let runs = self.collect_operand_runs();

        if self.pass == 1 {
            // Operands are counted, not evaluated: a string contributes
            // its length, any expression one byte.
            let mut total: u16 = 0;
            for run in &runs {
                match run.as_slice() {
                    [tok] => {
                        if let TokenKind::String(bytes) = &tok.kind {
                            total = total.wrapping_add(bytes.len() as u16);
                        } else {
                            total = total.wrapping_add(1);
                        }
                    }
                    _ => total = total.wrapping_add(1),
                }
            }
            self.advance_address(total);
            return;
        }

        let mut bytes = Vec::new();
        for run in &runs {
            if let [tok] = run.as_slice() {
                if let TokenKind::String(s) = &tok.kind {
                    bytes.extend_from_slice(s);
                    continue;
                }
            }
            match self.eval_at(run, stmt_addr) {
                Ok(value) => bytes.push((value & 0xFF) as u8),
                Err(err) => {
                    self.report_eval(err);
                    bytes.push(0);
                }
            }
        }
        self.emit_data(stmt_addr, bytes, label, line);
    }

    fn dir_dw(&mut self, label: Option<String>) {
        let stmt_addr = self.current_address;
        let line = self.here().line;
        let runs = self.collect_operand_runs();

        if self.pass == 1 {
            self.advance_address((runs.len() as u16).wrapping_mul(2));
            return;
        }

        let mut bytes = Vec::new();
        for run in &runs {
            match self.eval_at(run, stmt_addr) {
                Ok(value) => {
                    bytes.push((value & 0xFF) as u8);
                    bytes.push(((value >> 8) & 0xFF) as u8);
                }
                Err(err) => {
                    self.report_eval(err);
                    bytes.push(0);
                    bytes.push(0);
                }
            }
        }
        self.emit_data(stmt_addr, bytes, label, line);
    }

    fn dir_ds(&mut self, label: Option<String>) {
        let stmt_addr = self.current_address;
        let line = self.here().line;
        let run = self.collect_until_newline();

        let count = match self.eval_at(&run, stmt_addr) {
            Ok(value) if (0..=0xFFFF).contains(&value) => value as u16,
            Ok(value) => {
                if self.pass == 2 {
                    let span = run.first().map(|t| t.span).unwrap_or_default();
                    self.report(
                        Severity::Error,
                        AsmErrorKind::Syntax,
                        "Invalid space count",
                        Some(&value.to_string()),
                        span,
                    );
                }
                0
            }
            Err(err) => {
                self.report_eval(err);
                0
            }
        };

        if self.pass == 1 {
            self.advance_address(count);
            return;
        }
        self.emit_data(stmt_addr, vec![0; count as usize], label, line);
    }

    fn emit_data(&mut self, address: u16, bytes: Vec<u8>, label: Option<String>, line: u32) {
        self.advance_address(bytes.len() as u16);
        self.emitted_any = true;
        self.items.push(IrItem::Data {
            address,
            bytes,
            label,
            line,
        });
    }

    fn assignment(&mut self, label: &str, kind: SymbolKind) {
        let run = self.collect_until_newline();
        // Forward references are never allowed on the right-hand side.
        let result = evaluate(&run, &self.symbols, self.current_address, false);
        match result {
            Ok(value) => {
                let outcome = self.symbols.define(label, (value & 0xFFFF) as u16, kind);
                if outcome == SymbolTableResult::Redefined && self.pass == 2 {
                    let span = self.here();
                    self.report(
                        Severity::Warning,
                        AsmErrorKind::SymbolRedefined,
                        "Symbol redefined",
                        Some(label),
                        span,
                    );
                }
            }
            Err(err) => {
                if self.pass == 1 {
                    let diag = Diagnostic::new(err.span.line, Severity::Error, AsmError::from(&err))
                        .with_column(Some(err.span.col_start));
                    self.diagnostics.push(diag);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------

    fn instruction(&mut self, mnemonic: &str, label: Option<String>) {
        let stmt_addr = self.current_address;
        let line = self.here().line;
        let runs = self.collect_operand_runs();

        let mut operands = Vec::with_capacity(runs.len());
        for run in &runs {
            match self.parse_operand(run, stmt_addr) {
                Ok(op) => operands.push(op),
                Err(err) => {
                    self.report_eval(err);
                    return;
                }
            }
        }
        rewrite_condition(mnemonic, &mut operands);

        if let Ok(size) = encoded_size(mnemonic, &operands, stmt_addr) {
            self.advance_address(size as u16);
        }
        self.emitted_any = true;

        if self.pass == 2 {
            self.items.push(IrItem::Instruction {
                address: stmt_addr,
                mnemonic: mnemonic.to_string(),
                operands,
                bytes: Vec::new(),
                label,
                line,
            });
        }
    }

    /// Parse one comma-separated operand token run.
    fn parse_operand(&self, run: &[Token], stmt_addr: u16) -> Result<Operand, EvalError> {
        if let [tok] = run {
            match &tok.kind {
                TokenKind::Register(name) => return Ok(Operand::Register(name.clone())),
                TokenKind::Label(name) => {
                    return Ok(Operand::LabelRef {
                        name: name.clone(),
                        indirect: false,
                    })
                }
                _ => {}
            }
        }

        if wrapped_in_parens(run) {
            let inner = &run[1..run.len() - 1];
            if let [tok] = inner {
                match &tok.kind {
                    TokenKind::Register(name) => return Ok(Operand::Indirect(name.clone())),
                    TokenKind::Label(name) => {
                        return Ok(Operand::LabelRef {
                            name: name.clone(),
                            indirect: true,
                        })
                    }
                    _ => {}
                }
            }
            let value = evaluate(inner, &self.symbols, stmt_addr, self.pass == 1)?;
            return Ok(Operand::IndirectAddr(value));
        }

        let value = evaluate(run, &self.symbols, stmt_addr, self.pass == 1)?;
        Ok(Operand::Immediate(value))
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn collect_until_newline(&mut self) -> Vec<Token> {
        let mut out = Vec::new();
        while let Some(token) = self.tokens.get(self.index) {
            if matches!(token.kind, TokenKind::Newline | TokenKind::Eof) {
                break;
            }
            out.push(token.clone());
            self.index += 1;
        }
        out
    }

    fn collect_operand_runs(&mut self) -> Vec<Vec<Token>> {
        let flat = self.collect_until_newline();
        if flat.is_empty() {
            return Vec::new();
        }
        let mut runs = vec![Vec::new()];
        for token in flat {
            if token.kind == TokenKind::Comma {
                runs.push(Vec::new());
            } else {
                runs.last_mut().expect("runs is never empty").push(token);
            }
        }
        runs
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), Some(TokenKind::Newline)) {
            self.index += 1;
        }
    }

    fn sync_to_newline(&mut self) {
        while let Some(token) = self.tokens.get(self.index) {
            let kind = token.kind.clone();
            self.index += 1;
            if matches!(kind, TokenKind::Newline) {
                return;
            }
            if matches!(kind, TokenKind::Eof) {
                self.index = self.tokens.len();
                return;
            }
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Eof) | None)
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.index).map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.index + offset).map(|t| &t.kind)
    }

    fn peek_raw(&self) -> String {
        self.tokens
            .get(self.index)
            .map(|t| t.raw.clone())
            .unwrap_or_default()
    }

    fn here(&self) -> Span {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|t| t.span)
            .unwrap_or_default()
    }

    fn advance_address(&mut self, amount: u16) {
        self.current_address = self.current_address.wrapping_add(amount);
    }

    fn eval(&self, run: &[Token]) -> Result<i64, EvalError> {
        self.eval_at(run, self.current_address)
    }

    fn eval_at(&self, run: &[Token], pc: u16) -> Result<i64, EvalError> {
        evaluate(run, &self.symbols, pc, self.pass == 1)
    }

    fn report_eval(&mut self, err: EvalError) {
        if self.pass != 2 {
            return;
        }
        let diag = Diagnostic::new(err.span.line, Severity::Error, AsmError::from(&err))
            .with_column(Some(err.span.col_start));
        self.diagnostics.push(diag);
    }

    fn report(
        &mut self,
        severity: Severity,
        kind: AsmErrorKind,
        msg: &str,
        param: Option<&str>,
        span: Span,
    ) {
        if self.pass != 2 {
            return;
        }
        let diag = Diagnostic::new(span.line, severity, AsmError::new(kind, msg, param))
            .with_column(Some(span.col_start));
        self.diagnostics.push(diag);
    }
}

/// Rewrite a leading condition-code name on conditional-flow mnemonics.
/// `C` lexes as a register and the other condition names as labels, so
/// the conversion happens here where the mnemonic is known.
fn rewrite_condition(mnemonic: &str, operands: &mut [Operand]) {
    let upper = mnemonic.to_ascii_uppercase();
    let applies = match upper.as_str() {
        "JP" | "JR" | "CALL" => operands.len() == 2,
        "RET" => operands.len() == 1,
        _ => false,
    };
    if !applies {
        return;
    }
    let name = match &operands[0] {
        Operand::Register(name) => name.clone(),
        Operand::LabelRef {
            name,
            indirect: false,
        } => name.clone(),
        _ => return,
    };
    if is_condition(&name) {
        operands[0] = Operand::Condition(name);
    }
}

/// True when the run is a single parenthesized group: starts with `(`,
/// ends with `)`, and the opening paren does not close early.
fn wrapped_in_parens(run: &[Token]) -> bool {
    if run.len() < 2 {
        return false;
    }
    if run[0].kind != TokenKind::OpenParen || run[run.len() - 1].kind != TokenKind::CloseParen {
        return false;
    }
    let mut depth = 0i32;
    for (index, token) in run.iter().enumerate() {
        match token.kind {
            TokenKind::OpenParen => depth += 1,
            TokenKind::CloseParen => {
                depth -= 1;
                if depth == 0 && index + 1 < run.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}
