// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::{assemble, assemble_bytes, Assembly};
use crate::core::error::AsmErrorKind;
use crate::core::symbol_table::SymbolKind;
use crate::core::tokenizer::{TokenKind, Tokenizer};
use crate::z80::registry::lexicon;

fn assemble_ok(source: &str) -> Assembly {
    let assembly = assemble(source);
    assert!(
        assembly.success,
        "assembly failed for {source:?}: {:?}",
        assembly.errors.iter().map(|d| d.format()).collect::<Vec<_>>()
    );
    assembly
}

fn assemble_err(source: &str) -> Assembly {
    let assembly = assemble(source);
    assert!(!assembly.success, "assembly unexpectedly succeeded for {source:?}");
    assembly
}

#[test]
fn minimal_program() {
    let assembly = assemble_ok(".ORG $4200\nSTART: NOP\nHALT\n.END\n");
    assert_eq!(assembly.bytes, vec![0x00, 0x76]);
    assert_eq!(assembly.start_address, 0x4200);
    let start = assembly.symbols.entry("START").unwrap();
    assert_eq!(start.address, 0x4200);
    assert_eq!(start.kind, SymbolKind::Label);
}

#[test]
fn add_two_plus_two_with_forward_data_label() {
    let source = "\
.ORG $4200
START: LD A,2
LD B,2
ADD A,B
LD (RESULT),A
HALT
RESULT: .DB 0
.END
";
    let assembly = assemble_ok(source);
    assert_eq!(
        assembly.bytes,
        vec![0x3E, 0x02, 0x06, 0x02, 0x80, 0x32, 0x09, 0x42, 0x76, 0x00]
    );
    assert_eq!(assembly.symbols.lookup("START"), Some(0x4200));
    assert_eq!(assembly.symbols.lookup("RESULT"), Some(0x4209));
}

#[test]
fn fillscreen_block_fill_with_backward_jr() {
    let source = "\
; Fill the Model III screen with a graphics block
.ORG $4200
LD HL,$3C00    ; video memory
LD BC,$0400    ; 1K of screen
FILL: LD (HL),$BF
INC HL
DEC BC
LD A,B
OR C
JR NZ,FILL
HALT
.END
";
    let assembly = assemble_ok(source);
    assert_eq!(
        &assembly.bytes[..15],
        &[
            0x21, 0x00, 0x3C, 0x01, 0x00, 0x04, 0x36, 0xBF, 0x23, 0x0B, 0x78, 0xB1, 0x20, 0xF8,
            0x76
        ]
    );
    // JR NZ,FILL sits at 0x420C: 0xF8 == (0x4206 - 0x420E) & 0xFF.
    assert_eq!(assembly.symbols.lookup("FILL"), Some(0x4206));
}

#[test]
fn equ_forward_reference_is_rejected() {
    let assembly = assemble_err("X .EQU Y+1\nY .EQU 5\n");
    assert_eq!(assembly.errors.len(), 1);
    assert_eq!(assembly.errors[0].kind(), AsmErrorKind::UndefinedSymbol);
    assert!(assembly.errors[0].message().contains('Y'));
}

#[test]
fn dollar_evaluates_to_statement_address() {
    let assembly = assemble_ok(".ORG $4200\nLD HL, $ + 3\nHALT\n");
    assert_eq!(assembly.bytes, vec![0x21, 0x03, 0x42, 0x76]);
}

#[test]
fn relative_jump_out_of_range_errors() {
    let assembly = assemble_err("JR FAR\n.DS 200\nFAR: NOP\n");
    assert_eq!(assembly.errors.len(), 1);
    assert_eq!(
        assembly.errors[0].kind(),
        AsmErrorKind::RelativeJumpOutOfRange
    );
}

#[test]
fn jr_forward_boundary_at_plus_127() {
    let assembly = assemble_ok("JR FWD\n.DS 127\nFWD: NOP\n");
    assert_eq!(assembly.bytes[0], 0x18);
    assert_eq!(assembly.bytes[1], 0x7F);

    let assembly = assemble_err("JR FWD\n.DS 128\nFWD: NOP\n");
    assert_eq!(
        assembly.errors[0].kind(),
        AsmErrorKind::RelativeJumpOutOfRange
    );
}

#[test]
fn jr_backward_boundary_at_minus_128() {
    // The JR lands at $427E; -128 reaches back to BACK at $4200.
    let assembly = assemble_ok("BACK: NOP\n.DS 125\nJR BACK\n");
    let len = assembly.bytes.len();
    assert_eq!(&assembly.bytes[len - 2..], &[0x18, 0x80]);

    let assembly = assemble_err("BACK: NOP\n.DS 126\nJR BACK\n");
    assert_eq!(
        assembly.errors[0].kind(),
        AsmErrorKind::RelativeJumpOutOfRange
    );
}

#[test]
fn empty_source_is_a_single_error() {
    for source in ["", "   \n\t\n"] {
        let assembly = assemble_err(source);
        assert_eq!(assembly.errors.len(), 1);
        assert_eq!(assembly.errors[0].kind(), AsmErrorKind::EmptySource);
        assert_eq!(assembly.errors[0].line, 1);
        assert!(assembly.bytes.is_empty());
    }
}

#[test]
fn non_text_source_is_rejected() {
    let assembly = assemble_bytes(&[0xFF, 0xFE, 0x00, 0x41]);
    assert!(!assembly.success);
    assert_eq!(assembly.errors[0].kind(), AsmErrorKind::InvalidSourceType);
}

#[test]
fn rst_accepts_only_the_eight_vectors() {
    for (vector, opcode) in [
        (0x00u16, 0xC7u8),
        (0x08, 0xCF),
        (0x10, 0xD7),
        (0x18, 0xDF),
        (0x20, 0xE7),
        (0x28, 0xEF),
        (0x30, 0xF7),
        (0x38, 0xFF),
    ] {
        let assembly = assemble_ok(&format!("RST ${vector:02X}\n"));
        assert_eq!(assembly.bytes, vec![opcode]);
    }
    for vector in [0x01, 0x07, 0x09, 0x3C, 0x40] {
        let assembly = assemble_err(&format!("RST ${vector:02X}\n"));
        assert_eq!(assembly.errors[0].kind(), AsmErrorKind::InvalidRstAddress);
    }
}

#[test]
fn assembly_is_deterministic() {
    let source = ".ORG $4200\nSTART: LD A,2\nJR START\nMSG: .DB \"HI\",0\n";
    let first = assemble(source);
    let second = assemble(source);
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.success, second.success);
    for entry in first.symbols.iter() {
        assert_eq!(second.symbols.lookup(&entry.name), Some(entry.address));
    }
    assert_eq!(
        first.symbols.iter().count(),
        second.symbols.iter().count()
    );
}

#[test]
fn image_is_concatenation_of_item_bytes() {
    let source = "LD A,1\n.DB 1,2,3\nWORDS: .DW $1234,$5678\n.DS 4\nHALT\n";
    let assembly = assemble_ok(source);
    let total: usize = assembly
        .instructions
        .iter()
        .map(|item| item.bytes().len())
        .sum();
    assert_eq!(assembly.bytes.len(), total);
    assert_eq!(total, 2 + 3 + 4 + 4 + 1);
}

#[test]
fn org_redirects_addresses_without_padding() {
    let assembly = assemble_ok("NOP\n.ORG $6000\nENTRY: HALT\nJP ENTRY\n");
    // No gap bytes between the NOP and the HALT.
    assert_eq!(assembly.bytes, vec![0x00, 0x76, 0xC3, 0x00, 0x60]);
    assert_eq!(assembly.symbols.lookup("ENTRY"), Some(0x6000));
    // Code preceded the .ORG, so the start address stays at the default.
    assert_eq!(assembly.start_address, crate::trs80::DEFAULT_ORG);
}

#[test]
fn default_origin_applies_without_org() {
    let assembly = assemble_ok("HERE: JP HERE\n");
    assert_eq!(assembly.start_address, 0x4200);
    assert_eq!(assembly.bytes, vec![0xC3, 0x00, 0x42]);
}

#[test]
fn directive_aliases_and_case_are_accepted() {
    let assembly = assemble_ok("org $4200\nDEFB 1,2\nDEFW $ABCD\ndefm \"OK\"\nDEFS 2\nend\n");
    assert_eq!(
        assembly.bytes,
        vec![0x01, 0x02, 0xCD, 0xAB, b'O', b'K', 0x00, 0x00]
    );
}

#[test]
fn mnemonics_and_registers_are_case_insensitive() {
    let upper = assemble_ok("LD A,$FF\nhalt\n");
    let lower = assemble_ok("ld a,$ff\nHALT\n");
    assert_eq!(upper.bytes, lower.bytes);
}

#[test]
fn hex_suffix_literals_need_no_leading_digit() {
    let assembly = assemble_ok("LD A,FFH\nLD B,0FFH\nCP EAh\n");
    assert_eq!(assembly.bytes, vec![0x3E, 0xFF, 0x06, 0xFF, 0xFE, 0xEA]);
}

#[test]
fn duplicate_label_is_a_warning_not_an_error() {
    let assembly = assemble_ok("X: NOP\nX: HALT\nJP X\n");
    assert_eq!(assembly.warnings.len(), 1);
    assert_eq!(assembly.warnings[0].kind(), AsmErrorKind::SymbolRedefined);
    // The later binding wins and the jump resolves to it.
    assert_eq!(assembly.symbols.lookup("X"), Some(0x4201));
    assert_eq!(assembly.bytes, vec![0x00, 0x76, 0xC3, 0x01, 0x42]);
}

#[test]
fn unexpected_character_is_reported_and_assembly_continues() {
    let assembly = assemble_err("NOP\n@\nHALT\n");
    assert_eq!(assembly.errors.len(), 1);
    assert_eq!(assembly.errors[0].kind(), AsmErrorKind::UnexpectedCharacter);
    assert_eq!(assembly.errors[0].line, 2);
    // Both real instructions still assembled.
    assert_eq!(assembly.bytes, vec![0x00, 0x76]);
}

#[test]
fn division_by_zero_is_reported() {
    let assembly = assemble_err("LD A,1/0\n");
    assert_eq!(assembly.errors[0].kind(), AsmErrorKind::DivByZero);
}

#[test]
fn unmatched_parenthesis_is_reported() {
    let assembly = assemble_err("LD HL,(1+2\n");
    assert_eq!(
        assembly.errors[0].kind(),
        AsmErrorKind::UnmatchedParenthesis
    );
}

#[test]
fn unsupported_pattern_is_reported() {
    let assembly = assemble_err("LD IX,$4000\n");
    assert_eq!(
        assembly.errors[0].kind(),
        AsmErrorKind::UnsupportedInstructionPattern
    );
}

#[test]
fn equ_constants_feed_instruction_operands() {
    let source = "\
VIDEO .EQU $3C00
CHAR .EQU $BF
LD HL,VIDEO
LD (HL),CHAR
HALT
";
    let assembly = assemble_ok(source);
    assert_eq!(assembly.bytes, vec![0x21, 0x00, 0x3C, 0x36, 0xBF, 0x76]);
    assert_eq!(
        assembly.symbols.entry("VIDEO").unwrap().kind,
        SymbolKind::Equ
    );
}

#[test]
fn defl_redefines_without_warning() {
    let source = "V .DEFL 1\nV .DEFL 2\nLD A,V+0\nLD B,V\n";
    let assembly = assemble_ok(source);
    assert!(assembly.warnings.is_empty());
    // The expression form evaluates during pass 2, the bare reference is
    // resolved by the code generator; both see the final binding.
    assert_eq!(assembly.bytes, vec![0x3E, 0x02, 0x06, 0x02]);
    assert_eq!(assembly.symbols.lookup("V"), Some(2));
}

#[test]
fn end_directive_stops_assembly() {
    let assembly = assemble_ok("NOP\n.END\nthis is not valid source @@\n");
    assert_eq!(assembly.bytes, vec![0x00]);
}

#[test]
fn strings_emit_one_byte_per_character() {
    let assembly = assemble_ok("MSG: .DB \"ABC\",'x',13\n");
    assert_eq!(assembly.bytes, vec![b'A', b'B', b'C', b'x', 13]);
}

#[test]
fn conditional_flow_with_all_condition_codes() {
    let source = "\
.ORG $4200
T: NOP
JP NZ,T
JP Z,T
JP NC,T
JP C,T
JP PO,T
JP PE,T
JP P,T
JP M,T
CALL NZ,T
RET Z
RET
";
    let assembly = assemble_ok(source);
    let expected: Vec<u8> = vec![
        0x00, // NOP
        0xC2, 0x00, 0x42, // JP NZ
        0xCA, 0x00, 0x42, // JP Z
        0xD2, 0x00, 0x42, // JP NC
        0xDA, 0x00, 0x42, // JP C
        0xE2, 0x00, 0x42, // JP PO
        0xEA, 0x00, 0x42, // JP PE
        0xF2, 0x00, 0x42, // JP P
        0xFA, 0x00, 0x42, // JP M
        0xC4, 0x00, 0x42, // CALL NZ
        0xC8, // RET Z
        0xC9, // RET
    ];
    assert_eq!(assembly.bytes, expected);
}

#[test]
fn block_and_bit_instructions_assemble() {
    let source = "\
LDIR
CPIR
IM 1
RLD
BIT 7,(HL)
SET 0,A
SRL B
SLL C
IN A,($FE)
OUT ($FE),A
EX (SP),HL
EXX
";
    let assembly = assemble_ok(source);
    let expected: Vec<u8> = vec![
        0xED, 0xB0, // LDIR
        0xED, 0xB1, // CPIR
        0xED, 0x56, // IM 1
        0xED, 0x6F, // RLD
        0xCB, 0x7E, // BIT 7,(HL)
        0xCB, 0xC7, // SET 0,A
        0xCB, 0x38, // SRL B
        0xCB, 0x31, // SLL C
        0xDB, 0xFE, // IN A,($FE)
        0xD3, 0xFE, // OUT ($FE),A
        0xE3, // EX (SP),HL
        0xD9, // EXX
    ];
    assert_eq!(assembly.bytes, expected);
}

#[test]
fn token_raw_fields_reconstruct_the_source() {
    let source = "START: LD A,$FF\nADD A,B\n";
    let tokens = Tokenizer::tokenize(source, lexicon());
    let mut rebuilt = String::new();
    for token in &tokens {
        match token.kind {
            TokenKind::Newline => rebuilt.push('\n'),
            TokenKind::Comment | TokenKind::Eof => {}
            _ => rebuilt.push_str(&token.raw),
        }
    }
    let collapse = |s: &str| s.chars().filter(|c| !c.is_whitespace() || *c == '\n').collect::<String>();
    assert_eq!(collapse(&rebuilt), collapse(source));
}

#[test]
fn symbol_addresses_survive_forward_sizing() {
    // A chain of forward references: every label lands where the sizer
    // said it would, and codegen re-binding does not move anything.
    let source = "\
.ORG $4200
JP L3
L1: LD HL,L3
L2: LD A,(L3)
L3: HALT
";
    let assembly = assemble_ok(source);
    assert_eq!(assembly.symbols.lookup("L1"), Some(0x4203));
    assert_eq!(assembly.symbols.lookup("L2"), Some(0x4206));
    assert_eq!(assembly.symbols.lookup("L3"), Some(0x4209));
    assert_eq!(
        assembly.bytes,
        vec![
            0xC3, 0x09, 0x42, // JP L3
            0x21, 0x09, 0x42, // LD HL,L3
            0x3A, 0x09, 0x42, // LD A,(L3)
            0x76, // HALT
        ]
    );
}

#[test]
fn warnings_do_not_fail_the_assembly() {
    let assembly = assemble_ok("X .EQU 1\nX .EQU 2\nLD A,X\n");
    assert!(assembly.success);
    assert_eq!(assembly.warnings.len(), 1);
    assert_eq!(assembly.bytes, vec![0x3E, 0x02]);
}
