// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Z80 instruction encoding.
//!
//! A pure mapping from mnemonic and operand pattern to opcode bytes.
//! Register fields are computed from the standard 3-bit register index
//! (`B C D E H L (HL) A` = 0..7), the 2-bit pair index (`BC DE HL SP`),
//! the stack pair index (`AF` in place of `SP`), and the 3-bit condition
//! index (`NZ Z NC C PO PE P M`). Fixed encodings come from
//! [`crate::z80::table`].
//!
//! All 16-bit fields are little-endian; immediates are masked to their
//! field width at emission. `pc` is the address of the instruction being
//! encoded and is only consulted for the relative-branch displacement.

use crate::core::parser::Operand;
use crate::z80::table::lookup_simple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    UnsupportedPattern,
    InvalidRstAddress,
    RelativeJumpOutOfRange,
}

#[derive(Debug, Clone)]
pub struct EncodeError {
    pub kind: EncodeErrorKind,
    pub message: String,
}

impl EncodeError {
    fn unsupported(mnemonic: &str) -> Self {
        Self {
            kind: EncodeErrorKind::UnsupportedPattern,
            message: format!("Unsupported operands for {mnemonic}"),
        }
    }

    fn new(kind: EncodeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EncodeError {}

/// Encode one instruction. Operands must not contain unresolved
/// [`Operand::LabelRef`]s; the code generator resolves them first.
pub fn encode(mnemonic: &str, operands: &[Operand], pc: u16) -> Result<Vec<u8>, EncodeError> {
    let upper = mnemonic.to_ascii_uppercase();
    match upper.as_str() {
        "LD" => encode_ld(&upper, operands),
        "ADD" | "ADC" | "SUB" | "SBC" | "AND" | "XOR" | "OR" | "CP" => {
            encode_alu(&upper, operands)
        }
        "INC" | "DEC" => encode_inc_dec(&upper, operands),
        "PUSH" | "POP" => encode_push_pop(&upper, operands),
        "RLC" | "RRC" | "RL" | "RR" | "SLA" | "SRA" | "SLL" | "SRL" => {
            encode_rotate(&upper, operands)
        }
        "BIT" | "SET" | "RES" => encode_bit_op(&upper, operands),
        "JP" => encode_jp(&upper, operands),
        "JR" => encode_jr(&upper, operands, pc),
        "DJNZ" => encode_djnz(&upper, operands, pc),
        "CALL" => encode_call(&upper, operands),
        "RET" => encode_ret(&upper, operands),
        "RST" => encode_rst(&upper, operands),
        "IN" => encode_in(&upper, operands),
        "OUT" => encode_out(&upper, operands),
        "EX" => encode_ex(&upper, operands),
        "IM" => encode_im(&upper, operands),
        _ => match lookup_simple(&upper) {
            Some(entry) if operands.is_empty() => Ok(entry.bytes()),
            _ => Err(EncodeError::unsupported(&upper)),
        },
    }
}

/// Compute the encoded size of an instruction before all labels are
/// bound. Unresolved label references are replaced with placeholder
/// values that cannot themselves fail to encode, so the returned length
/// is exactly what code generation will later produce.
pub fn encoded_size(
    mnemonic: &str,
    operands: &[Operand],
    pc: u16,
) -> Result<usize, EncodeError> {
    let resolved = resolve_for_sizing(mnemonic, operands, pc);
    encode(mnemonic, &resolved, pc).map(|bytes| bytes.len())
}

/// Replace `LabelRef` operands with sizing placeholders: the instruction's
/// own address for relative-branch targets (always in range), zero
/// elsewhere (always a valid immediate and a valid RST vector).
pub fn resolve_for_sizing(mnemonic: &str, operands: &[Operand], pc: u16) -> Vec<Operand> {
    let relative = mnemonic.eq_ignore_ascii_case("JR") || mnemonic.eq_ignore_ascii_case("DJNZ");
    operands
        .iter()
        .map(|op| match op {
            Operand::LabelRef { indirect: true, .. } => Operand::IndirectAddr(0),
            Operand::LabelRef { indirect: false, .. } => {
                Operand::Immediate(if relative { pc as i64 } else { 0 })
            }
            other => other.clone(),
        })
        .collect()
}

fn reg8_index(name: &str) -> Option<u8> {
    match name {
        "B" => Some(0),
        "C" => Some(1),
        "D" => Some(2),
        "E" => Some(3),
        "H" => Some(4),
        "L" => Some(5),
        "A" => Some(7),
        _ => None,
    }
}

fn pair_index(name: &str) -> Option<u8> {
    match name {
        "BC" => Some(0),
        "DE" => Some(1),
        "HL" => Some(2),
        "SP" => Some(3),
        _ => None,
    }
}

fn stack_pair_index(name: &str) -> Option<u8> {
    match name {
        "BC" => Some(0),
        "DE" => Some(1),
        "HL" => Some(2),
        "AF" => Some(3),
        _ => None,
    }
}

fn condition_index(name: &str) -> Option<u8> {
    match name {
        "NZ" => Some(0),
        "Z" => Some(1),
        "NC" => Some(2),
        "C" => Some(3),
        "PO" => Some(4),
        "PE" => Some(5),
        "P" => Some(6),
        "M" => Some(7),
        _ => None,
    }
}

/// 3-bit register field: an 8-bit register, or `(HL)` as 6.
fn r_field(op: &Operand) -> Option<u8> {
    match op {
        Operand::Register(name) => reg8_index(name),
        Operand::Indirect(name) if name == "HL" => Some(6),
        _ => None,
    }
}

fn as_pair(op: &Operand) -> Option<u8> {
    match op {
        Operand::Register(name) => pair_index(name),
        _ => None,
    }
}

fn as_immediate(op: &Operand) -> Option<i64> {
    match op {
        Operand::Immediate(value) => Some(*value),
        _ => None,
    }
}

fn as_indirect_addr(op: &Operand) -> Option<i64> {
    match op {
        Operand::IndirectAddr(value) => Some(*value),
        _ => None,
    }
}

fn is_register(op: &Operand, name: &str) -> bool {
    matches!(op, Operand::Register(n) if n == name)
}

fn is_indirect(op: &Operand, name: &str) -> bool {
    matches!(op, Operand::Indirect(n) if n == name)
}

fn push_word(bytes: &mut Vec<u8>, value: i64) {
    bytes.push((value & 0xFF) as u8);
    bytes.push(((value >> 8) & 0xFF) as u8);
}

fn rel8(pc: u16, target: i64) -> Result<u8, EncodeError> {
    let disp = target - (pc as i64 + 2);
    if !(-128..=127).contains(&disp) {
        return Err(EncodeError::new(
            EncodeErrorKind::RelativeJumpOutOfRange,
            format!("Relative jump out of range: offset {disp}"),
        ));
    }
    Ok((disp & 0xFF) as u8)
}

fn encode_ld(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    if operands.len() != 2 {
        return Err(EncodeError::unsupported(mnemonic));
    }
    let (dst, src) = (&operands[0], &operands[1]);

    // Interrupt/refresh register moves.
    if is_register(dst, "A") && is_register(src, "I") {
        return Ok(vec![0xED, 0x57]);
    }
    if is_register(dst, "A") && is_register(src, "R") {
        return Ok(vec![0xED, 0x5F]);
    }
    if is_register(dst, "I") && is_register(src, "A") {
        return Ok(vec![0xED, 0x47]);
    }
    if is_register(dst, "R") && is_register(src, "A") {
        return Ok(vec![0xED, 0x4F]);
    }

    // LD r,r' including the (HL) forms; (HL),(HL) would be HALT.
    if let (Some(d), Some(s)) = (r_field(dst), r_field(src)) {
        if d == 6 && s == 6 {
            return Err(EncodeError::unsupported(mnemonic));
        }
        return Ok(vec![0x40 | (d << 3) | s]);
    }

    // Accumulator via register-pair indirection.
    if is_register(dst, "A") && is_indirect(src, "BC") {
        return Ok(vec![0x0A]);
    }
    if is_register(dst, "A") && is_indirect(src, "DE") {
        return Ok(vec![0x1A]);
    }
    if is_indirect(dst, "BC") && is_register(src, "A") {
        return Ok(vec![0x02]);
    }
    if is_indirect(dst, "DE") && is_register(src, "A") {
        return Ok(vec![0x12]);
    }

    // Direct-address forms.
    if let Some(addr) = as_indirect_addr(src) {
        let mut bytes = match dst {
            Operand::Register(name) if name == "A" => vec![0x3A],
            Operand::Register(name) if name == "HL" => vec![0x2A],
            Operand::Register(name) if name == "BC" => vec![0xED, 0x4B],
            Operand::Register(name) if name == "DE" => vec![0xED, 0x5B],
            Operand::Register(name) if name == "SP" => vec![0xED, 0x7B],
            _ => return Err(EncodeError::unsupported(mnemonic)),
        };
        push_word(&mut bytes, addr);
        return Ok(bytes);
    }
    if let Some(addr) = as_indirect_addr(dst) {
        let mut bytes = match src {
            Operand::Register(name) if name == "A" => vec![0x32],
            Operand::Register(name) if name == "HL" => vec![0x22],
            Operand::Register(name) if name == "BC" => vec![0xED, 0x43],
            Operand::Register(name) if name == "DE" => vec![0xED, 0x53],
            Operand::Register(name) if name == "SP" => vec![0xED, 0x73],
            _ => return Err(EncodeError::unsupported(mnemonic)),
        };
        push_word(&mut bytes, addr);
        return Ok(bytes);
    }

    if is_register(dst, "SP") && is_register(src, "HL") {
        return Ok(vec![0xF9]);
    }

    if let Some(value) = as_immediate(src) {
        // 16-bit pair load.
        if let Some(p) = as_pair(dst) {
            let mut bytes = vec![0x01 | (p << 4)];
            push_word(&mut bytes, value);
            return Ok(bytes);
        }
        // 8-bit load, including LD (HL),n.
        if let Some(d) = r_field(dst) {
            return Ok(vec![0x06 | (d << 3), (value & 0xFF) as u8]);
        }
    }

    Err(EncodeError::unsupported(mnemonic))
}

fn encode_alu(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let (reg_base, imm_base): (u8, u8) = match mnemonic {
        "ADD" => (0x80, 0xC6),
        "ADC" => (0x88, 0xCE),
        "SUB" => (0x90, 0xD6),
        "SBC" => (0x98, 0xDE),
        "AND" => (0xA0, 0xE6),
        "XOR" => (0xA8, 0xEE),
        "OR" => (0xB0, 0xF6),
        "CP" => (0xB8, 0xFE),
        _ => return Err(EncodeError::unsupported(mnemonic)),
    };

    // Zilog syntax allows both `ADD A,B` and plain `SUB B`.
    let (target, operand) = match operands {
        [single] => (None, single),
        [first, second] => (Some(first), second),
        _ => return Err(EncodeError::unsupported(mnemonic)),
    };

    if let Some(target) = target {
        if is_register(target, "HL") {
            let p = as_pair(operand).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            return match mnemonic {
                "ADD" => Ok(vec![0x09 | (p << 4)]),
                "ADC" => Ok(vec![0xED, 0x4A | (p << 4)]),
                "SBC" => Ok(vec![0xED, 0x42 | (p << 4)]),
                _ => Err(EncodeError::unsupported(mnemonic)),
            };
        }
        if !is_register(target, "A") {
            return Err(EncodeError::unsupported(mnemonic));
        }
    }

    if let Some(r) = r_field(operand) {
        return Ok(vec![reg_base | r]);
    }
    if let Some(value) = as_immediate(operand) {
        return Ok(vec![imm_base, (value & 0xFF) as u8]);
    }
    Err(EncodeError::unsupported(mnemonic))
}

fn encode_inc_dec(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let [operand] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let inc = mnemonic == "INC";
    if let Some(r) = r_field(operand) {
        let base: u8 = if inc { 0x04 } else { 0x05 };
        return Ok(vec![base | (r << 3)]);
    }
    if let Some(p) = as_pair(operand) {
        let base: u8 = if inc { 0x03 } else { 0x0B };
        return Ok(vec![base | (p << 4)]);
    }
    Err(EncodeError::unsupported(mnemonic))
}

fn encode_push_pop(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let [Operand::Register(name)] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let q = stack_pair_index(name).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    let base: u8 = if mnemonic == "PUSH" { 0xC5 } else { 0xC1 };
    Ok(vec![base | (q << 4)])
}

fn encode_rotate(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let base: u8 = match mnemonic {
        "RLC" => 0x00,
        "RRC" => 0x08,
        "RL" => 0x10,
        "RR" => 0x18,
        "SLA" => 0x20,
        "SRA" => 0x28,
        "SLL" => 0x30,
        "SRL" => 0x38,
        _ => return Err(EncodeError::unsupported(mnemonic)),
    };
    let [operand] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let r = r_field(operand).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    Ok(vec![0xCB, base | r])
}

fn encode_bit_op(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let base: u8 = match mnemonic {
        "BIT" => 0x40,
        "RES" => 0x80,
        "SET" => 0xC0,
        _ => return Err(EncodeError::unsupported(mnemonic)),
    };
    let [bit_op, reg_op] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let bit = as_immediate(bit_op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    if !(0..=7).contains(&bit) {
        return Err(EncodeError::new(
            EncodeErrorKind::UnsupportedPattern,
            format!("Bit number {bit} out of range (0-7)"),
        ));
    }
    let r = r_field(reg_op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    Ok(vec![0xCB, base | ((bit as u8) << 3) | r])
}

fn encode_jp(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [op] if is_indirect(op, "HL") => Ok(vec![0xE9]),
        [op] => {
            let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let mut bytes = vec![0xC3];
            push_word(&mut bytes, target);
            Ok(bytes)
        }
        [Operand::Condition(cc), op] => {
            let cc = condition_index(cc).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let mut bytes = vec![0xC2 | (cc << 3)];
            push_word(&mut bytes, target);
            Ok(bytes)
        }
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_jr(mnemonic: &str, operands: &[Operand], pc: u16) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [op] => {
            let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            Ok(vec![0x18, rel8(pc, target)?])
        }
        [Operand::Condition(cc), op] => {
            // Only NZ/Z/NC/C exist for JR.
            let cc = condition_index(cc)
                .filter(|&cc| cc < 4)
                .ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            Ok(vec![0x20 | (cc << 3), rel8(pc, target)?])
        }
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_djnz(mnemonic: &str, operands: &[Operand], pc: u16) -> Result<Vec<u8>, EncodeError> {
    let [op] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    Ok(vec![0x10, rel8(pc, target)?])
}

fn encode_call(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [op] => {
            let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let mut bytes = vec![0xCD];
            push_word(&mut bytes, target);
            Ok(bytes)
        }
        [Operand::Condition(cc), op] => {
            let cc = condition_index(cc).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let target = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            let mut bytes = vec![0xC4 | (cc << 3)];
            push_word(&mut bytes, target);
            Ok(bytes)
        }
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_ret(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [] => Ok(vec![0xC9]),
        [Operand::Condition(cc)] => {
            let cc = condition_index(cc).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            Ok(vec![0xC0 | (cc << 3)])
        }
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_rst(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let [op] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let vector = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    match vector {
        0x00 | 0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 | 0x38 => {
            Ok(vec![0xC7 | (vector as u8)])
        }
        _ => Err(EncodeError::new(
            EncodeErrorKind::InvalidRstAddress,
            format!("Invalid RST address: {vector:#04X}"),
        )),
    }
}

fn encode_in(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [dst, port] if is_register(dst, "A") && as_indirect_addr(port).is_some() => {
            let port = as_indirect_addr(port).unwrap_or(0);
            Ok(vec![0xDB, (port & 0xFF) as u8])
        }
        [dst, port] if is_indirect(port, "C") => {
            let r = r_field(dst)
                .filter(|&r| r != 6)
                .ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            Ok(vec![0xED, 0x40 | (r << 3)])
        }
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_out(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [port, src] if is_register(src, "A") && as_indirect_addr(port).is_some() => {
            let port = as_indirect_addr(port).unwrap_or(0);
            Ok(vec![0xD3, (port & 0xFF) as u8])
        }
        [port, src] if is_indirect(port, "C") => {
            let r = r_field(src)
                .filter(|&r| r != 6)
                .ok_or_else(|| EncodeError::unsupported(mnemonic))?;
            Ok(vec![0xED, 0x41 | (r << 3)])
        }
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_ex(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    match operands {
        [a, b] if is_register(a, "DE") && is_register(b, "HL") => Ok(vec![0xEB]),
        [a, b] if is_register(a, "AF") && is_register(b, "AF'") => Ok(vec![0x08]),
        [a, b] if is_indirect(a, "SP") && is_register(b, "HL") => Ok(vec![0xE3]),
        _ => Err(EncodeError::unsupported(mnemonic)),
    }
}

fn encode_im(mnemonic: &str, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let [op] = operands else {
        return Err(EncodeError::unsupported(mnemonic));
    };
    let mode = as_immediate(op).ok_or_else(|| EncodeError::unsupported(mnemonic))?;
    let opcode = match mode {
        0 => 0x46,
        1 => 0x56,
        2 => 0x5E,
        _ => {
            return Err(EncodeError::new(
                EncodeErrorKind::UnsupportedPattern,
                format!("Invalid interrupt mode {mode}, expected 0, 1, or 2"),
            ))
        }
    };
    Ok(vec![0xED, opcode])
}
