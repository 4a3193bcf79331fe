// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Listing file generation.

use std::io::Write;

use crate::core::parser::IrItem;
use crate::core::symbol_table::SymbolTable;

/// Data for a single listing line.
pub struct ListingLine<'a> {
    pub addr: Option<u16>,
    pub bytes: &'a [u8],
    pub line_num: u32,
    pub source: &'a str,
}

/// Writer for listing file output.
pub struct ListingWriter<W: Write> {
    out: W,
}

impl<W: Write> ListingWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn header(&mut self, title: &str) -> std::io::Result<()> {
        writeln!(self.out, "{title}")?;
        writeln!(self.out, "ADDR    BYTES                    LINE  SOURCE")?;
        writeln!(self.out, "------  -----------------------  ----  ------")?;
        Ok(())
    }

    pub fn write_line(&mut self, line: ListingLine<'_>) -> std::io::Result<()> {
        let loc = match line.addr {
            Some(addr) if !line.bytes.is_empty() => format!("{addr:04X}"),
            _ => "----".to_string(),
        };
        writeln!(
            self.out,
            "{:<6}  {:<23}  {:>4}  {}",
            loc,
            format_bytes(line.bytes),
            line.line_num,
            line.source
        )
    }

    pub fn footer(
        &mut self,
        errors: usize,
        warnings: usize,
        symbols: &SymbolTable,
        total_bytes: usize,
    ) -> std::io::Result<()> {
        writeln!(self.out, "\nErrors: {errors}  Warnings: {warnings}")?;
        writeln!(self.out, "\nSYMBOL TABLE\n")?;
        symbols.dump(&mut self.out)?;
        writeln!(self.out, "\nTotal memory is {total_bytes} bytes")?;
        Ok(())
    }
}

/// Write a full listing: each source line annotated with the address and
/// bytes its statement produced.
pub fn write_listing<W: Write>(
    out: W,
    title: &str,
    source_lines: &[String],
    items: &[IrItem],
    symbols: &SymbolTable,
    errors: usize,
    warnings: usize,
) -> std::io::Result<()> {
    let mut writer = ListingWriter::new(out);
    writer.header(title)?;

    let mut total = 0usize;
    for (idx, source) in source_lines.iter().enumerate() {
        let line_num = (idx + 1) as u32;
        let item = items.iter().find(|item| match item {
            IrItem::Data { line, .. } | IrItem::Instruction { line, .. } => *line == line_num,
            IrItem::Org { .. } => false,
        });
        let (addr, bytes): (Option<u16>, &[u8]) = match item {
            Some(item) => (Some(item.address()), item.bytes()),
            None => (None, &[]),
        };
        total += bytes.len();
        writer.write_line(ListingLine {
            addr,
            bytes,
            line_num,
            source,
        })?;
    }

    writer.footer(errors, warnings, symbols, total)
}

/// Format bytes as hex string for listing.
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
