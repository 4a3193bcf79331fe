// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Final code generation over the intermediate list.
//!
//! The generator walks the list twice. The first sweep assigns each item
//! its authoritative address, re-binds attached labels, and encodes every
//! instruction whose operands are fully resolved; instructions that still
//! carry label references get placeholder bytes of their final length.
//! The second sweep resolves those references against the completed
//! symbol table and patches the bytes in place. Because the parser sized
//! every instruction with the same encoder, re-encoding never changes an
//! instruction's length; a mismatch is reported as an internal error.

use crate::core::error::{AsmError, AsmErrorKind, Diagnostic, Severity};
use crate::core::parser::{IrItem, Operand};
use crate::core::symbol_table::SymbolTable;
use crate::z80::encoder::{encode, encoded_size, EncodeError};

/// Assign addresses, encode, and resolve deferred label references.
/// Returns the diagnostics produced while encoding.
pub fn generate(
    items: &mut [IrItem],
    symbols: &mut SymbolTable,
    start_address: u16,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let mut pc = start_address;
    for item in items.iter_mut() {
        match item {
            IrItem::Org { address } => {
                pc = *address;
            }
            IrItem::Data {
                address,
                bytes,
                label,
                ..
            } => {
                *address = pc;
                if let Some(label) = label {
                    let _ = symbols.update(label, pc);
                }
                pc = pc.wrapping_add(bytes.len() as u16);
            }
            IrItem::Instruction {
                address,
                mnemonic,
                operands,
                bytes,
                label,
                line,
            } => {
                *address = pc;
                if let Some(label) = label {
                    let _ = symbols.update(label, pc);
                }
                if operands.iter().any(Operand::is_label_ref) {
                    // Deferred: reserve the final length now, patch below.
                    let size = encoded_size(mnemonic, operands, pc).unwrap_or(0);
                    *bytes = vec![0; size];
                } else {
                    match encode(mnemonic, operands, pc) {
                        Ok(encoded) => *bytes = encoded,
                        Err(err) => diagnostics.push(encode_diagnostic(&err, *line, pc)),
                    }
                }
                pc = pc.wrapping_add(bytes.len() as u16);
            }
        }
    }

    for item in items.iter_mut() {
        let IrItem::Instruction {
            address,
            mnemonic,
            operands,
            bytes,
            line,
            ..
        } = item
        else {
            continue;
        };
        if !operands.iter().any(Operand::is_label_ref) {
            continue;
        }

        let mut resolved = Vec::with_capacity(operands.len());
        let mut missing = false;
        for operand in operands.iter() {
            match operand {
                Operand::LabelRef { name, indirect } => match symbols.lookup(name) {
                    Some(target) => {
                        resolved.push(if *indirect {
                            Operand::IndirectAddr(target as i64)
                        } else {
                            Operand::Immediate(target as i64)
                        });
                    }
                    None => {
                        diagnostics.push(
                            Diagnostic::new(
                                *line,
                                Severity::Error,
                                AsmError::new(
                                    AsmErrorKind::UndefinedSymbol,
                                    "Undefined symbol",
                                    Some(name),
                                ),
                            )
                            .with_column(None),
                        );
                        missing = true;
                    }
                },
                other => resolved.push(other.clone()),
            }
        }
        if missing {
            continue;
        }

        match encode(mnemonic, &resolved, *address) {
            Ok(encoded) => {
                if encoded.len() == bytes.len() {
                    *bytes = encoded;
                } else {
                    // The sizer and the encoder are the same code, so a
                    // length change here can only be a bug.
                    diagnostics.push(Diagnostic::new(
                        *line,
                        Severity::Error,
                        AsmError::new(
                            AsmErrorKind::Internal,
                            "Instruction length changed during label resolution",
                            Some(mnemonic),
                        ),
                    ));
                }
            }
            Err(err) => diagnostics.push(encode_diagnostic(&err, *line, *address)),
        }
    }

    diagnostics
}

/// Concatenate the emitted bytes of every item, in source order.
pub fn collect_bytes(items: &[IrItem]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        out.extend_from_slice(item.bytes());
    }
    out
}

fn encode_diagnostic(err: &EncodeError, line: u32, address: u16) -> Diagnostic {
    let base = AsmError::from(err);
    let decorated = AsmError::new(
        base.kind(),
        &format!("{} at address {:04X}H", base.message(), address),
        None,
    );
    Diagnostic::new(line, Severity::Error, decorated)
}
