//! A small assembler for the interpreter's instruction set.
//!
//! Source is whitespace-separated tokens, with `;` starting a comment:
//!
//! - a mnemonic (`ADD`, `SSTORE`, `DUP2`, ...), case-insensitive;
//! - `PUSHn imm` with an explicit immediate;
//! - a bare number (decimal or `0x` hex), pushed with the narrowest `PUSHn`;
//! - `name:` defines a jump target and assembles to `JUMPDEST`;
//! - `@name` pushes the offset of a jump target (always `PUSH2`);
//! - a line holding only `.runtime` ends the constructor section.
//!
//! [Assembler::compile] yields init code: the constructor section, followed
//! by a stub that returns the runtime section as the code of the new account.

use std::collections::HashMap;

use log::debug;
use once_cell::sync::Lazy;

use qledger::common::U256;
use qledger::error::CompileError;
use qledger::ledger::Compiler;

use crate::mnemonic;

static OPCODES: Lazy<HashMap<&'static str, u8>> = Lazy::new(|| {
    (0..=255u8)
        .filter_map(|raw| mnemonic(raw).map(|m| (m, raw)))
        .collect()
});

const RUNTIME_DIRECTIVE: &str = ".runtime";
const JUMPDEST: u8 = 0x5b;
const PUSH1: u8 = 0x60;
const PUSH2: u8 = 0x61;

fn parse_number(token: &str) -> Option<U256> {
    match token.strip_prefix("0x") {
        Some(h) if !h.is_empty() && h.len() <= 64 => {
            U256::from_str_radix(h, 16).ok()
        }
        Some(_) => None,
        None if token.is_empty() => None,
        None => U256::from_dec_str(token).ok(),
    }
}

/// Big-endian bytes of `v`, at least one byte long.
fn minimal_bytes(v: &U256) -> Vec<u8> {
    let width = ((v.bits() + 7) / 8).max(1);
    let mut word = [0u8; 32];
    v.to_big_endian(&mut word);
    word[32 - width..].to_vec()
}

#[derive(Default)]
struct Section {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    /// positions of `@label` operands still to be patched
    fixups: Vec<(usize, String)>,
}

impl Section {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.code.push(PUSH1 + bytes.len() as u8 - 1);
        self.code.extend_from_slice(bytes);
    }

    fn token(
        &mut self, line: usize, token: &str,
        tokens: &mut dyn Iterator<Item = &str>,
    ) -> Result<(), CompileError> {
        if let Some(label) = token.strip_suffix(':') {
            if self
                .labels
                .insert(label.to_string(), self.code.len())
                .is_some()
            {
                return Err(CompileError::DuplicateLabel {
                    line,
                    label: label.to_string(),
                })
            }
            self.code.push(JUMPDEST);
            return Ok(())
        }
        if let Some(label) = token.strip_prefix('@') {
            self.code.push(PUSH2);
            self.fixups.push((self.code.len(), label.to_string()));
            self.code.extend_from_slice(&[0, 0]);
            return Ok(())
        }
        if token.starts_with(|c: char| c.is_ascii_digit()) {
            let v = parse_number(token).ok_or_else(|| {
                CompileError::BadImmediate {
                    line,
                    token: token.to_string(),
                }
            })?;
            self.push_bytes(&minimal_bytes(&v));
            return Ok(())
        }
        let upper = token.to_ascii_uppercase();
        let raw = *OPCODES.get(upper.as_str()).ok_or_else(|| {
            CompileError::UnknownInstruction {
                line,
                token: token.to_string(),
            }
        })?;
        if let 0x60..=0x7f = raw {
            let width = (raw - PUSH1 + 1) as usize;
            let imm = tokens.next().unwrap_or_default();
            let bad = || CompileError::BadImmediate {
                line,
                token: imm.to_string(),
            };
            let v = parse_number(imm).ok_or_else(bad)?;
            if v.bits() > width * 8 {
                return Err(bad())
            }
            let mut word = [0u8; 32];
            v.to_big_endian(&mut word);
            self.code.push(raw);
            self.code.extend_from_slice(&word[32 - width..]);
            return Ok(())
        }
        self.code.push(raw);
        Ok(())
    }

    fn assemble<'a>(
        lines: impl Iterator<Item = (usize, &'a str)>,
    ) -> Result<Vec<u8>, CompileError> {
        let mut s = Section::default();
        for (line, text) in lines {
            let text = text.split(';').next().unwrap_or_default();
            let mut tokens = text.split_whitespace();
            while let Some(token) = tokens.next() {
                s.token(line, token, &mut tokens)?;
            }
        }
        if s.code.len() > u16::MAX as usize {
            return Err(CompileError::TooLarge(s.code.len()))
        }
        for (pos, label) in s.fixups.iter() {
            let dest = *s
                .labels
                .get(label)
                .ok_or_else(|| CompileError::UndefinedLabel(label.clone()))?;
            let dest = (dest as u16).to_be_bytes();
            s.code[*pos..*pos + 2].copy_from_slice(&dest);
        }
        Ok(s.code)
    }
}

/// The tail of init code that copies `len` bytes at `off` out of the running
/// code and returns them.
fn deploy_stub(len: u16, off: u16) -> Vec<u8> {
    let [l0, l1] = len.to_be_bytes();
    let [o0, o1] = off.to_be_bytes();
    // PUSH2 len DUP1 PUSH2 off PUSH1 0 CODECOPY PUSH1 0 RETURN
    vec![
        PUSH2, l0, l1, 0x80, PUSH2, o0, o1, PUSH1, 0, 0x39, PUSH1, 0, 0xf3,
    ]
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Assembler;

impl Assembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble a program as-is, without any deployment wrapper.
    pub fn assemble(&self, src: &str) -> Result<Vec<u8>, CompileError> {
        Section::assemble(src.lines().enumerate().map(|(i, l)| (i + 1, l)))
    }
}

impl Compiler for Assembler {
    fn compile(&self, src: &str) -> Result<Vec<u8>, CompileError> {
        let lines: Vec<(usize, &str)> =
            src.lines().enumerate().map(|(i, l)| (i + 1, l)).collect();
        let split = lines.iter().position(|(_, l)| {
            l.split(';').next().unwrap_or_default().trim() == RUNTIME_DIRECTIVE
        });
        let (ctor, runtime) = match split {
            Some(i) => (&lines[..i], &lines[i + 1..]),
            None => (&lines[..0], &lines[..]),
        };
        let mut init = Section::assemble(ctor.iter().copied())?;
        let runtime = Section::assemble(runtime.iter().copied())?;
        let stub_len = deploy_stub(0, 0).len();
        let off = init.len() + stub_len;
        let total = off + runtime.len();
        if total > u16::MAX as usize {
            return Err(CompileError::TooLarge(total))
        }
        init.extend(deploy_stub(runtime.len() as u16, off as u16));
        init.extend(runtime);
        debug!("assembled {} bytes of init code", init.len());
        Ok(init)
    }
}

#[test]
fn test_minimal_push() {
    let code = Assembler.assemble("0 255 256 0x010203").unwrap();
    assert_eq!(
        code,
        vec![0x60, 0x00, 0x60, 0xff, 0x61, 0x01, 0x00, 0x62, 1, 2, 3]
    );
}

#[test]
fn test_stub_layout() {
    let init = Assembler.compile("STOP").unwrap();
    assert_eq!(init.len(), 14);
    assert_eq!(&init[..3], &[PUSH2, 0, 1]);
    assert_eq!(&init[4..7], &[PUSH2, 0, 13]);
    assert_eq!(init[13], 0x00);
}
