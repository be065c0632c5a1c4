//! JVM invocation opcodes and their operand decoding.
use byteorder::{BigEndian, ByteOrder};

use crate::error::{Result, RuntimeError};

/// Length in bytes of an `invokevirtual`, `invokespecial` or
/// `invokestatic` instruction: the opcode and a two byte pool index.
pub const INVOKE_LENGTH: usize = 3;

/// Invocation opcodes handled by the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum OPCode {
    InvokeVirtual = 0xb6,
    InvokeSpecial = 0xb7,
    InvokeStatic = 0xb8,
}

impl TryFrom<u8> for OPCode {
    type Error = RuntimeError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            0xb6 => Ok(Self::InvokeVirtual),
            0xb7 => Ok(Self::InvokeSpecial),
            0xb8 => Ok(Self::InvokeStatic),
            other => Err(RuntimeError::UnsupportedOpcode(other)),
        }
    }
}

/// Decode the invocation instruction at `pc`, returns the opcode and its
/// constant pool index.
pub fn decode_invoke(code: &[u8], pc: usize) -> Result<(OPCode, u16)> {
    let opcode = code
        .get(pc)
        .copied()
        .ok_or(RuntimeError::TruncatedInstruction(pc))?;
    let opcode = OPCode::try_from(opcode)?;
    let operands = code
        .get(pc + 1..pc + INVOKE_LENGTH)
        .ok_or(RuntimeError::TruncatedInstruction(pc))?;
    Ok((opcode, BigEndian::read_u16(operands)))
}
