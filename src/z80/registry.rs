// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Z80 identifier classification sets.
//!
//! The tokenizer classifies identifiers by asking these predicates in
//! order (mnemonic, register, directive). All comparisons are against the
//! uppercased lexeme. The index registers and their halves are recognized
//! as register names even though the encoder rejects patterns using them.

use crate::core::tokenizer::Lexicon;

/// Z80 mnemonics accepted by the tokenizer.
pub fn is_mnemonic(name: &str) -> bool {
    matches!(
        name,
        "LD" | "PUSH"
            | "POP"
            | "EX"
            | "EXX"
            | "LDI"
            | "LDD"
            | "LDIR"
            | "LDDR"
            | "CPI"
            | "CPD"
            | "CPIR"
            | "CPDR"
            | "ADD"
            | "ADC"
            | "SUB"
            | "SBC"
            | "AND"
            | "OR"
            | "XOR"
            | "CP"
            | "INC"
            | "DEC"
            | "DAA"
            | "CPL"
            | "NEG"
            | "CCF"
            | "SCF"
            | "NOP"
            | "HALT"
            | "DI"
            | "EI"
            | "IM"
            | "RLCA"
            | "RLA"
            | "RRCA"
            | "RRA"
            | "RLC"
            | "RL"
            | "RRC"
            | "RR"
            | "SLA"
            | "SRA"
            | "SLL"
            | "SRL"
            | "RLD"
            | "RRD"
            | "BIT"
            | "SET"
            | "RES"
            | "JP"
            | "JR"
            | "DJNZ"
            | "CALL"
            | "RET"
            | "RETI"
            | "RETN"
            | "RST"
            | "IN"
            | "OUT"
    )
}

/// Z80 register names, including the shadow pair and index halves.
pub fn is_register(name: &str) -> bool {
    matches!(
        name,
        "A" | "B"
            | "C"
            | "D"
            | "E"
            | "H"
            | "L"
            | "I"
            | "R"
            | "AF"
            | "BC"
            | "DE"
            | "HL"
            | "SP"
            | "AF'"
            | "IX"
            | "IY"
            | "IXH"
            | "IXL"
            | "IYH"
            | "IYL"
    )
}

/// Assembler directives, dotted and undotted, plus the DEF* aliases.
pub fn is_directive(name: &str) -> bool {
    matches!(
        name,
        ".ORG"
            | "ORG"
            | ".DB"
            | "DB"
            | "DEFB"
            | ".DEFB"
            | "DEFM"
            | ".DEFM"
            | ".DW"
            | "DW"
            | "DEFW"
            | ".DEFW"
            | ".DS"
            | "DS"
            | "DEFS"
            | ".DEFS"
            | ".EQU"
            | "EQU"
            | ".DEFL"
            | "DEFL"
            | ".END"
            | "END"
    )
}

/// Condition codes for conditional jumps, calls, and returns.
///
/// `C` doubles as a register name; the parser decides from context which
/// reading applies.
pub fn is_condition(name: &str) -> bool {
    matches!(
        name,
        "NZ" | "Z" | "NC" | "C" | "PO" | "PE" | "P" | "M"
    )
}

/// The tokenizer lexicon for Z80 source.
pub fn lexicon() -> Lexicon {
    Lexicon {
        is_mnemonic,
        is_register,
        is_directive,
    }
}
