use std::fmt::Write as _;

use anyhow::{Result, bail};

use crate::val::{CompareOp, Value};

use super::opcode::{COMPARE_ABSENT, MAKE_ARRAY, MAKE_MAP, Opcode};

/// Compiled program: a flat instruction buffer plus its constant pool.
///
/// Immutable once built; VMs share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub code: Vec<u8>,
    pub constants: Vec<Value>,
    /// Entry address of each function literal, indexed by its parse-time id.
    pub entries: Vec<usize>,
}

/// A decoded instruction, as seen by the disassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub addr: usize,
    pub op: Opcode,
    pub operand: Option<u16>,
}

impl Instruction {
    pub fn next(&self) -> usize {
        self.addr + 1 + self.op.operand_width()
    }
}

impl Bytecode {
    pub fn new(code: Vec<u8>, constants: Vec<Value>) -> Self {
        Self {
            code,
            constants,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    #[inline]
    pub fn opcode_at(&self, pc: usize) -> Result<Opcode> {
        let Some(&b) = self.code.get(pc) else {
            bail!("instruction pointer {pc} past end of code ({} bytes)", self.code.len());
        };
        match Opcode::from_byte(b) {
            Some(op) => Ok(op),
            None => bail!("unknown opcode 0x{b:02x} at {pc}"),
        }
    }

    #[inline]
    pub fn read_u8(&self, pc: usize) -> Result<u8> {
        match self.code.get(pc) {
            Some(&b) => Ok(b),
            None => bail!("truncated operand at {pc}: expected u8"),
        }
    }

    #[inline]
    pub fn read_u16(&self, pc: usize) -> Result<u16> {
        match self.code.get(pc..pc + 2) {
            Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
            _ => bail!("truncated operand at {pc}: expected u16"),
        }
    }

    #[inline]
    pub fn constant(&self, idx: u16) -> Result<&Value> {
        match self.constants.get(idx as usize) {
            Some(v) => Ok(v),
            None => bail!("constant index {idx} out of range ({} constants)", self.constants.len()),
        }
    }

    /// Decodes the instruction starting at `addr`.
    pub fn decode(&self, addr: usize) -> Result<Instruction> {
        let op = self.opcode_at(addr)?;
        let operand = match op.operand_width() {
            0 => None,
            1 => Some(self.read_u8(addr + 1)? as u16),
            _ => Some(self.read_u16(addr + 1)?),
        };
        Ok(Instruction { addr, op, operand })
    }

    /// Walks the buffer front to back. Stops after the first undecodable
    /// instruction, which is yielded as an error.
    pub fn instructions(&self) -> impl Iterator<Item = Result<Instruction>> + '_ {
        let mut pc = 0usize;
        let mut failed = false;
        std::iter::from_fn(move || {
            if failed || pc >= self.code.len() {
                return None;
            }
            match self.decode(pc) {
                Ok(ins) => {
                    pc = ins.next();
                    Some(Ok(ins))
                }
                Err(e) => {
                    failed = true;
                    Some(Err(e))
                }
            }
        })
    }

    /// One `addr OPCODE operand ; comment` line per instruction.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for ins in self.instructions() {
            let ins = match ins {
                Ok(ins) => ins,
                Err(e) => {
                    let _ = writeln!(out, "; {e}");
                    break;
                }
            };
            let mut line = format!("{:04} {:<8}", ins.addr, ins.op.name());
            if let Some(operand) = ins.operand {
                let _ = write!(line, " {operand}");
            }
            if let Some(comment) = self.comment(&ins) {
                let _ = write!(line, " ; {comment}");
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    fn comment(&self, ins: &Instruction) -> Option<String> {
        let operand = ins.operand?;
        match ins.op {
            Opcode::Push | Opcode::Load | Opcode::Store => match self.constants.get(operand as usize) {
                Some(v) if ins.op == Opcode::Push => Some(format!("{v:?}")),
                Some(v) => Some(v.text()),
                None => Some("<bad constant>".to_string()),
            },
            Opcode::Compare if operand as u8 == COMPARE_ABSENT => Some("absent".to_string()),
            Opcode::Compare => CompareOp::from_mode(operand as u8).map(|c| c.symbol().to_string()),
            Opcode::Make => match operand as u8 {
                MAKE_MAP => Some("map".to_string()),
                MAKE_ARRAY => Some("array".to_string()),
                _ => None,
            },
            op if op.is_jump() => Some(format!("-> {operand:04}")),
            _ => None,
        }
    }
}
