//! Invokes an external `objdump` and parses its Intel-syntax
//! disassembly into `(mnemonic, bytes, decoded_text)` triples.

use crate::error::ScanError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;

pub struct DisassembledInstruction {
    pub mnemonic: String,
    pub bytes: Vec<u8>,
    pub decoded_text: String,
}

pub struct Disassembler {
    objdump_path: PathBuf,
}

static HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[0-9a-f]+:\s").expect("valid regex"));
static FILE_FORMAT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"file format ([\S]*)").expect("valid regex"));

impl Disassembler {
    /// Resolves the `objdump` binary to invoke: an explicit override, or
    /// the first `objdump` found on `PATH`.
    pub fn resolve(override_path: Option<&str>) -> Result<Self, ScanError> {
        let objdump_path = match override_path {
            Some(p) => PathBuf::from(p),
            None => which_objdump()?,
        };
        Ok(Disassembler { objdump_path })
    }

    pub fn disassemble(&self, binary_path: &Path) -> Result<Vec<DisassembledInstruction>, ScanError> {
        let output = Command::new(&self.objdump_path)
            .arg("--disassemble")
            .arg("-M")
            .arg("intel")
            .arg(binary_path)
            .output()
            .map_err(|e| ScanError::Disassembler(format!("failed to spawn `{}`: {}", self.objdump_path.display(), e)))?;

        if !output.status.success() {
            return Err(ScanError::Disassembler(format!(
                "`{}` exited with {}: {}",
                self.objdump_path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        parse_objdump_output(&text)
    }
}

fn which_objdump() -> Result<PathBuf, ScanError> {
    let path_var = std::env::var_os("PATH").ok_or_else(|| {
        ScanError::Disassembler("PATH is not set; pass --objdump-location explicitly".to_string())
    })?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join("objdump");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(ScanError::Disassembler(
        "could not find `objdump` on PATH; pass --objdump-location explicitly".to_string(),
    ))
}

fn parse_objdump_output(text: &str) -> Result<Vec<DisassembledInstruction>, ScanError> {
    let file_format = FILE_FORMAT_LINE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    match file_format.as_deref() {
        Some("elf64-x86-64") => {}
        Some(other) => {
            return Err(ScanError::Mode {
                file_format: other.to_string(),
            })
        }
        None => {
            return Err(ScanError::Disassembler(
                "could not find a `file format` line in objdump output".to_string(),
            ))
        }
    }

    let mut instructions = Vec::new();
    for line in text.lines() {
        if !HEADING_LINE.is_match(line) {
            continue;
        }
        let rest = match line.split_once(':') {
            Some((_addr, rest)) => rest,
            None => continue,
        };
        let mut fields = rest.split('\t').filter(|f| !f.is_empty());
        let raw_bytes = match fields.next() {
            Some(f) => f,
            None => continue,
        };
        let decoded_text = match fields.next() {
            Some(f) => f.trim(),
            None => continue,
        };

        let bytes: Vec<u8> = raw_bytes
            .split_whitespace()
            .filter_map(|b| u8::from_str_radix(b, 16).ok())
            .collect();
        if bytes.is_empty() || decoded_text.is_empty() {
            continue;
        }

        let mnemonic = decoded_text
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        instructions.push(DisassembledInstruction {
            mnemonic,
            bytes,
            decoded_text: decoded_text.to_string(),
        });
    }

    Ok(instructions)
}
