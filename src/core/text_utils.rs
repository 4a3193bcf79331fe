// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Shared text utilities for tokenization.

/// Check if a byte can start an identifier. Dotted directives like
/// `.ORG` lex as a single identifier, so `.` counts as a start byte.
#[inline]
pub fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'.'
}

/// Check if a byte is a valid identifier continuation character.
#[inline]
pub fn is_ident_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'.'
}

/// Check if a byte is intra-line whitespace (space, tab, or CR).
#[inline]
pub fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\r'
}

#[inline]
pub fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[inline]
pub fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

#[inline]
pub fn is_bin_digit(c: u8) -> bool {
    c == b'0' || c == b'1'
}
