//! Instruction set of the room scripts and its byte encoding.
//!
//! Every instruction is one opcode byte followed by little-endian operands.
//! Jump targets are instruction indices until `encode` turns them into
//! byte offsets relative to the next instruction.

use crate::error::CompileError;

use super::ast::BinOp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    PushWord(i16),
    PushString(String),
    LoadLocal(u8),
    StoreLocal(u8),
    LoadGlobal(u16),
    StoreGlobal(u16),
    Binary(BinOp),
    Neg,
    Not,
    Jump(usize),
    JumpIfFalse(usize),
    StartScript(u16),
    CallBuiltin { id: u8, argc: u8 },
    Pop,
    Return,
}

impl Op {
    pub fn opcode(&self) -> u8 {
        match self {
            Op::PushWord(_) => 0x01,
            Op::PushString(_) => 0x02,
            Op::LoadLocal(_) => 0x03,
            Op::StoreLocal(_) => 0x04,
            Op::LoadGlobal(_) => 0x05,
            Op::StoreGlobal(_) => 0x06,
            Op::Binary(op) => match op {
                BinOp::Add => 0x10,
                BinOp::Sub => 0x11,
                BinOp::Mul => 0x12,
                BinOp::Div => 0x13,
                BinOp::Mod => 0x14,
                BinOp::Eq => 0x15,
                BinOp::Ne => 0x16,
                BinOp::Lt => 0x17,
                BinOp::Le => 0x18,
                BinOp::Gt => 0x19,
                BinOp::Ge => 0x1A,
                BinOp::And => 0x1B,
                BinOp::Or => 0x1C,
            },
            Op::Neg => 0x1D,
            Op::Not => 0x1E,
            Op::Jump(_) => 0x20,
            Op::JumpIfFalse(_) => 0x21,
            Op::StartScript(_) => 0x30,
            Op::CallBuiltin { .. } => 0x31,
            Op::Pop => 0x32,
            Op::Return => 0x40,
        }
    }

    /// Encoded size in bytes, opcode included.
    pub fn size(&self) -> usize {
        1 + match self {
            Op::PushWord(_) | Op::Jump(_) | Op::JumpIfFalse(_) => 2,
            Op::LoadGlobal(_) | Op::StoreGlobal(_) | Op::StartScript(_) => 2,
            Op::CallBuiltin { .. } => 2,
            Op::LoadLocal(_) | Op::StoreLocal(_) => 1,
            Op::PushString(s) => s.len() + 1,
            _ => 0,
        }
    }
}

/// Lowers `ops` to bytes. `function` names the owner in errors.
pub fn encode(function: &str, ops: &[Op]) -> Result<Vec<u8>, CompileError> {
    let mut starts = Vec::with_capacity(ops.len() + 1);
    let mut pos = 0usize;
    for op in ops {
        starts.push(pos);
        pos += op.size();
    }
    starts.push(pos);

    let relative = |from: usize, target: usize| -> Result<i16, CompileError> {
        let delta = starts[target] as i64 - starts[from + 1] as i64;
        i16::try_from(delta).map_err(|_| CompileError::FunctionTooLarge(function.to_string()))
    };

    let mut out = Vec::with_capacity(pos);
    for (i, op) in ops.iter().enumerate() {
        out.push(op.opcode());
        match op {
            Op::PushWord(v) => out.extend_from_slice(&v.to_le_bytes()),
            Op::PushString(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            Op::LoadLocal(slot) | Op::StoreLocal(slot) => out.push(*slot),
            Op::LoadGlobal(id) | Op::StoreGlobal(id) | Op::StartScript(id) => {
                out.extend_from_slice(&id.to_le_bytes())
            }
            Op::Jump(target) | Op::JumpIfFalse(target) => {
                out.extend_from_slice(&relative(i, *target)?.to_le_bytes())
            }
            Op::CallBuiltin { id, argc } => {
                out.push(*id);
                out.push(*argc);
            }
            Op::Binary(_) | Op::Neg | Op::Not | Op::Pop | Op::Return => {}
        }
    }
    Ok(out)
}
