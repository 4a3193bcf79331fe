// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::core::error::{AsmError, AsmErrorKind, AsmRunError};

use super::VERSION;

const LONG_ABOUT: &str = "Z80 Assembler targeting the TRS-80 Model III memory layout.

Outputs are opt-in: specify at least one of -l/--list, -x/--hex, or
-b/--bin to produce files. Use -o/--outfile to set the output base name
when filenames are omitted. Programs assemble at the Model III default
origin $4200 unless the source sets one with .ORG.";

#[derive(Parser, Debug)]
#[command(
    name = "trsforge",
    version = VERSION,
    about = "Z80 Assembler for the TRS-80 Model III",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'i',
        long = "infile",
        value_name = "FILE",
        action = ArgAction::Append,
        long_help = "Input assembly file (repeatable)."
    )]
    pub infiles: Vec<PathBuf>,
    #[arg(
        short = 'l',
        long = "list",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit a listing file. FILE is optional; when omitted, the output base is used and a .lst extension is added."
    )]
    pub list_name: Option<String>,
    #[arg(
        short = 'x',
        long = "hex",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit an Intel Hex file. FILE is optional; when omitted, the output base is used and a .hex extension is added."
    )]
    pub hex_name: Option<String>,
    #[arg(
        short = 'b',
        long = "bin",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit a raw binary image file. FILE is optional; when omitted, the output base is used and a .bin extension is added."
    )]
    pub bin_name: Option<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "BASE",
        long_help = "Output filename base when -l/-x/-b omit filenames. Defaults to the input base."
    )]
    pub outfile: Option<String>,
    #[arg(
        short = 'g',
        long = "go",
        value_name = "aaaa",
        long_help = "Set execution start address (4 hex digits). Adds a Start Segment Address record to hex output. Requires -x/--hex."
    )]
    pub go_addr: Option<String>,
    #[arg(
        short = 's',
        long = "symbols",
        action = ArgAction::SetTrue,
        long_help = "Print the symbol table to stdout after assembly."
    )]
    pub dump_symbols: bool,
}

/// Validated CLI settings.
pub struct CliConfig {
    pub go_addr: Option<u16>,
}

pub fn is_valid_hex_4(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_hexdigit())
}

pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmRunError> {
    if cli.infiles.is_empty() {
        return Err(cli_error("No input file; use -i/--infile"));
    }

    let go_addr = match &cli.go_addr {
        Some(text) => {
            if cli.hex_name.is_none() {
                return Err(cli_error("-g/--go requires -x/--hex"));
            }
            if !is_valid_hex_4(text) {
                return Err(cli_error("Invalid -g/--go address; use 4 hex digits"));
            }
            Some(u16::from_str_radix(text, 16).unwrap_or(0))
        }
        None => None,
    };

    Ok(CliConfig { go_addr })
}

/// Resolve an optional output filename. `None` means the output was not
/// requested; an empty name means "derive from the output base".
pub fn resolve_output_path(out_base: &str, name: Option<String>, ext: &str) -> Option<String> {
    match name {
        None => None,
        Some(name) if name.is_empty() => Some(format!("{out_base}.{ext}")),
        Some(name) => {
            if std::path::Path::new(&name).extension().is_some() {
                Some(name)
            } else {
                Some(format!("{name}.{ext}"))
            }
        }
    }
}

fn cli_error(msg: &str) -> AsmRunError {
    AsmRunError::new(
        AsmError::new(AsmErrorKind::Cli, msg, None),
        Vec::new(),
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_4_validation() {
        assert!(is_valid_hex_4("4200"));
        assert!(is_valid_hex_4("FFFF"));
        assert!(!is_valid_hex_4("420"));
        assert!(!is_valid_hex_4("42000"));
        assert!(!is_valid_hex_4("42G0"));
    }

    #[test]
    fn output_path_resolution() {
        assert_eq!(resolve_output_path("prog", None, "lst"), None);
        assert_eq!(
            resolve_output_path("prog", Some(String::new()), "lst"),
            Some("prog.lst".to_string())
        );
        assert_eq!(
            resolve_output_path("prog", Some("custom".to_string()), "hex"),
            Some("custom.hex".to_string())
        );
        assert_eq!(
            resolve_output_path("prog", Some("custom.out".to_string()), "hex"),
            Some("custom.out".to_string())
        );
    }

    #[test]
    fn go_requires_hex_output() {
        let cli = Cli {
            infiles: vec![PathBuf::from("prog.asm")],
            list_name: None,
            hex_name: None,
            bin_name: None,
            outfile: None,
            go_addr: Some("4200".to_string()),
            dump_symbols: false,
        };
        assert!(validate_cli(&cli).is_err());
    }

    #[test]
    fn valid_config_parses_go_address() {
        let cli = Cli {
            infiles: vec![PathBuf::from("prog.asm")],
            list_name: None,
            hex_name: Some(String::new()),
            bin_name: None,
            outfile: None,
            go_addr: Some("4200".to_string()),
            dump_symbols: false,
        };
        let config = validate_cli(&cli).unwrap();
        assert_eq!(config.go_addr, Some(0x4200));
    }
}
