// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and reporting for the assembler.

use std::fmt;

use crate::core::expr::{EvalError, EvalErrorKind};
use crate::z80::encoder::{EncodeError, EncodeErrorKind};

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Assembler,
    Cli,
    UnexpectedCharacter,
    EmptySource,
    InvalidSourceType,
    Syntax,
    UnmatchedParenthesis,
    DivByZero,
    UndefinedSymbol,
    UnsupportedInstructionPattern,
    InvalidRstAddress,
    RelativeJumpOutOfRange,
    SymbolRedefined,
    Io,
    Internal,
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        Self {
            kind,
            message: format_error(msg, param),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

impl From<&EvalError> for AsmError {
    fn from(err: &EvalError) -> Self {
        let kind = match &err.kind {
            EvalErrorKind::UndefinedSymbol(_) => AsmErrorKind::UndefinedSymbol,
            EvalErrorKind::DivByZero => AsmErrorKind::DivByZero,
            EvalErrorKind::UnmatchedParen => AsmErrorKind::UnmatchedParenthesis,
            EvalErrorKind::SyntaxError | EvalErrorKind::EmptyExpr => AsmErrorKind::Syntax,
        };
        AsmError::new(kind, &err.message(), None)
    }
}

impl From<&EncodeError> for AsmError {
    fn from(err: &EncodeError) -> Self {
        let kind = match err.kind {
            EncodeErrorKind::UnsupportedPattern => AsmErrorKind::UnsupportedInstructionPattern,
            EncodeErrorKind::InvalidRstAddress => AsmErrorKind::InvalidRstAddress,
            EncodeErrorKind::RelativeJumpOutOfRange => AsmErrorKind::RelativeJumpOutOfRange,
        };
        AsmError::new(kind, &err.message, None)
    }
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A diagnostic message with location and context.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub line: u32,
    pub column: Option<usize>,
    pub severity: Severity,
    pub error: AsmError,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            column: None,
            severity,
            error,
        }
    }

    pub fn with_column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    pub fn message(&self) -> &str {
        self.error.message()
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.error.kind()
    }

    pub fn format(&self) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        format!("{}: {} - {}", self.line, sev, self.error.message())
    }

    pub fn format_with_context(&self, lines: Option<&[String]>, use_color: bool) -> String {
        let sev = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        let mut out = String::new();
        out.push_str(&format!("{}: {sev}\n", self.line));
        for line in build_context_lines(self.line, self.column, lines, use_color) {
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str(&format!("{sev}: {}", self.error.message()));
        out
    }
}

/// Report from a successful assembler run.
pub struct AsmRunReport {
    diagnostics: Vec<Diagnostic>,
    source_lines: Vec<String>,
}

impl AsmRunReport {
    pub fn new(diagnostics: Vec<Diagnostic>, source_lines: Vec<String>) -> Self {
        Self {
            diagnostics,
            source_lines,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }
}

/// Error from a failed assembler run.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
    source_lines: Vec<String>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>, source_lines: Vec<String>) -> Self {
        Self {
            error,
            diagnostics,
            source_lines,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

/// Build context lines for error display.
pub fn build_context_lines(
    line_num: u32,
    column: Option<usize>,
    lines: Option<&[String]>,
    use_color: bool,
) -> Vec<String> {
    let line_idx = line_num.saturating_sub(1) as usize;
    let lines = match lines {
        Some(lines) if line_idx < lines.len() => lines,
        _ => return vec![format!("{:>5} | <source unavailable>", line_num)],
    };
    let display = highlight_line(&lines[line_idx], column, use_color);
    vec![format!("{:>5} | {}", line_num, display)]
}

/// Highlight the character at `column` (1-based) in red when color is
/// enabled; returns the line unchanged otherwise.
pub fn highlight_line(line: &str, column: Option<usize>, use_color: bool) -> String {
    let Some(col) = column.filter(|_| use_color) else {
        return line.to_string();
    };
    let idx = col.saturating_sub(1);
    let chars: Vec<char> = line.chars().collect();
    if idx >= chars.len() {
        return line.to_string();
    }
    let before: String = chars[..idx].iter().collect();
    let at: String = chars[idx..=idx].iter().collect();
    let after: String = chars[idx + 1..].iter().collect();
    format!("{before}\x1b[31;1m{at}\x1b[0m{after}")
}

/// Format an error message with an optional parameter.
pub fn format_error(msg: &str, param: Option<&str>) -> String {
    match param {
        Some(p) => format!("{msg}: {p}"),
        None => msg.to_string(),
    }
}
