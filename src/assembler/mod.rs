// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Main assembler entry point.
//!
//! [`assemble`] is the library facade: source text in, an [`Assembly`]
//! aggregate out. [`run`] is the CLI driver built on top of it, handling
//! file I/O and the listing/hex/bin outputs.

pub mod cli;
#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use clap::Parser as ClapParser;

use crate::core::codegen::{collect_bytes, generate};
use crate::core::error::{
    AsmError, AsmErrorKind, AsmRunError, AsmRunReport, Diagnostic, Severity,
};
use crate::core::listing::write_listing;
use crate::core::output::{write_bin_file, write_hex_file};
use crate::core::parser::{parse, IrItem};
use crate::core::symbol_table::SymbolTable;
use crate::core::tokenizer::{TokenKind, Tokenizer};
use crate::trs80::DEFAULT_ORG;
use crate::z80::registry::lexicon;

use cli::{resolve_output_path, validate_cli, Cli, CliConfig};

pub const VERSION: &str = "1.0";

/// Result aggregate from one assembly run.
#[derive(Debug)]
pub struct Assembly {
    /// True iff `errors` is empty.
    pub success: bool,
    /// Emitted machine code, in source order.
    pub bytes: Vec<u8>,
    /// Initial origin: the first `.ORG` target, or the Model III default.
    pub start_address: u16,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    /// Final symbol addresses after code generation.
    pub symbols: SymbolTable,
    /// The intermediate list, with final addresses and bytes.
    pub instructions: Vec<IrItem>,
}

impl Assembly {
    fn failure(kind: AsmErrorKind, msg: &str) -> Self {
        let error = Diagnostic::new(1, Severity::Error, AsmError::new(kind, msg, None))
            .with_column(Some(1));
        Self {
            success: false,
            bytes: Vec::new(),
            start_address: DEFAULT_ORG,
            errors: vec![error],
            warnings: Vec::new(),
            symbols: SymbolTable::new(),
            instructions: Vec::new(),
        }
    }
}

/// Assemble Z80 source text.
///
/// Any panic escaping the pipeline is converted into a single internal
/// error so the caller always gets a well-formed result.
pub fn assemble(source: &str) -> Assembly {
    match catch_unwind(AssertUnwindSafe(|| assemble_inner(source))) {
        Ok(assembly) => assembly,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unexpected failure".to_string());
            Assembly::failure(AsmErrorKind::Internal, &format!("Internal error: {detail}"))
        }
    }
}

/// Assemble raw file contents, rejecting non-text input.
pub fn assemble_bytes(source: &[u8]) -> Assembly {
    match std::str::from_utf8(source) {
        Ok(text) => assemble(text),
        Err(_) => Assembly::failure(
            AsmErrorKind::InvalidSourceType,
            "Source is not valid UTF-8 text",
        ),
    }
}

fn assemble_inner(source: &str) -> Assembly {
    if source.trim().is_empty() {
        return Assembly::failure(AsmErrorKind::EmptySource, "Empty source");
    }

    let tokens = Tokenizer::tokenize(source, lexicon());

    // Lexer errors become diagnostics; scanning already continued past them.
    let mut diagnostics: Vec<Diagnostic> = tokens
        .iter()
        .filter_map(|token| match &token.kind {
            TokenKind::Error(message) => Some(
                Diagnostic::new(
                    token.span.line,
                    Severity::Error,
                    AsmError::new(AsmErrorKind::UnexpectedCharacter, message, None),
                )
                .with_column(Some(token.span.col_start)),
            ),
            _ => None,
        })
        .collect();

    let mut output = parse(tokens);
    diagnostics.extend(output.diagnostics.drain(..));
    diagnostics.extend(generate(
        &mut output.items,
        &mut output.symbols,
        output.start_address,
    ));

    let bytes = collect_bytes(&output.items);
    let (errors, warnings): (Vec<_>, Vec<_>) = diagnostics
        .into_iter()
        .partition(|d| d.severity == Severity::Error);

    Assembly {
        success: errors.is_empty(),
        bytes,
        start_address: output.start_address,
        errors,
        warnings,
        symbols: output.symbols,
        instructions: output.items,
    }
}

/// Run the assembler with command-line arguments.
pub fn run() -> Result<Vec<AsmRunReport>, AsmRunError> {
    let cli = Cli::parse();
    let config = validate_cli(&cli)?;

    let mut reports = Vec::new();
    for path in cli.infiles.clone() {
        reports.push(run_one(&cli, &config, &path)?);
    }
    Ok(reports)
}

fn run_one(cli: &Cli, config: &CliConfig, path: &Path) -> Result<AsmRunReport, AsmRunError> {
    let raw = fs::read(path).map_err(|_| {
        AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Io,
                "Error reading input file",
                Some(&path.display().to_string()),
            ),
            Vec::new(),
            Vec::new(),
        )
    })?;

    let source_lines: Vec<String> = String::from_utf8_lossy(&raw)
        .lines()
        .map(str::to_string)
        .collect();
    let assembly = assemble_bytes(&raw);

    if !assembly.success {
        let mut diagnostics: Vec<Diagnostic> = assembly
            .errors
            .iter()
            .chain(assembly.warnings.iter())
            .cloned()
            .collect();
        diagnostics.sort_by_key(|d| d.line);
        return Err(AsmRunError::new(
            AsmError::new(
                AsmErrorKind::Assembler,
                "Errors detected in source. No output files created.",
                None,
            ),
            diagnostics,
            source_lines,
        ));
    }

    let input_base = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("out")
        .to_string();
    let out_base = cli.outfile.clone().unwrap_or(input_base);

    if let Some(list_path) = resolve_output_path(&out_base, cli.list_name.clone(), "lst") {
        let file = create_output(&list_path)?;
        let title = format!("trsforge Z80 Assembler v{VERSION}");
        write_listing(
            file,
            &title,
            &source_lines,
            &assembly.instructions,
            &assembly.symbols,
            assembly.errors.len(),
            assembly.warnings.len(),
        )
        .map_err(|err| io_error(&err, &list_path))?;
    }

    if let Some(hex_path) = resolve_output_path(&out_base, cli.hex_name.clone(), "hex") {
        let file = create_output(&hex_path)?;
        write_hex_file(file, assembly.start_address, &assembly.bytes, config.go_addr)
            .map_err(|err| io_error(&err, &hex_path))?;
    }

    if let Some(bin_path) = resolve_output_path(&out_base, cli.bin_name.clone(), "bin") {
        let file = create_output(&bin_path)?;
        write_bin_file(file, &assembly.bytes).map_err(|err| io_error(&err, &bin_path))?;
    }

    if cli.dump_symbols {
        assembly
            .symbols
            .dump(io::stdout())
            .map_err(|err| io_error(&err, "stdout"))?;
    }

    Ok(AsmRunReport::new(assembly.warnings, source_lines))
}

fn create_output(path: &str) -> Result<File, AsmRunError> {
    File::create(path).map_err(|_| {
        AsmRunError::new(
            AsmError::new(AsmErrorKind::Io, "Error opening file for write", Some(path)),
            Vec::new(),
            Vec::new(),
        )
    })
}

fn io_error(err: &io::Error, path: &str) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(
            AsmErrorKind::Io,
            &format!("Error writing {path}: {err}"),
            None,
        ),
        Vec::new(),
        Vec::new(),
    )
}
