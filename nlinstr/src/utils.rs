//! Decode errors.

use strum::EnumIs;
use thiserror::Error;

use crate::instr::RowRef;
use crate::opcode::Opcode;

/// Everything that can go wrong while normalizing or building one row.
///
/// All of these abort the row they occur in and carry the row identity plus
/// the instruction-buffer offset, so the surrounding system can report a
/// precise diagnostic without giving up on the rest of the model. A failed
/// row leaves no state behind; other rows decode independently.
#[derive(Error, Debug, EnumIs)]
pub enum DecodeError {
    /// Stack bookkeeping went negative, a rotation left the buffer, or the
    /// stream violates the postfix contract in some other structural way.
    #[error("malformed bytecode in {row} at offset {offset}: {detail}")]
    MalformedBytecode {
        /// Row being decoded.
        row: RowRef,
        /// Offset of the offending instruction in the row's buffer.
        offset: usize,
        /// What the decoder expected at that point.
        detail: String,
    },

    /// The builder tried to pop more operands than the stream produced.
    #[error("operand stack underflow in {row} at offset {offset} while applying {opcode}")]
    StackUnderflow {
        /// Row being decoded.
        row: RowRef,
        /// Offset of the instruction that underflowed.
        offset: usize,
        /// The instruction that needed more operands.
        opcode: Opcode,
    },

    /// A raw value outside the active enumeration, or a decodable opcode
    /// (legacy local/gradient/objective families) this pipeline cannot
    /// express as a tree.
    #[error("opcode {opcode} in {row} at offset {offset} is not supported by this decoder")]
    UnsupportedOpcode {
        /// Row being decoded.
        row: RowRef,
        /// Offset of the offending instruction.
        offset: usize,
        /// Mnemonic, or the raw bits in hex when outside the enumeration.
        opcode: String,
    },

    /// A function code with no dispatch rule. Distinct from the opcode case
    /// so callers can tell the user which nonlinear function is the blocker.
    #[error("{row} at offset {offset}: nonlinear function code {code} ({}) is not supported", .name.unwrap_or("beyond the known table"))]
    UnsupportedFunction {
        /// Row being decoded.
        row: RowRef,
        /// Offset of the calling instruction.
        offset: usize,
        /// The re-incremented function code as matched against the table.
        code: u32,
        /// Table name for the code, when it has one.
        name: Option<&'static str>,
    },
}

impl DecodeError {
    /// The row the error occurred in.
    pub fn row(&self) -> RowRef {
        match self {
            DecodeError::MalformedBytecode { row, .. }
            | DecodeError::StackUnderflow { row, .. }
            | DecodeError::UnsupportedOpcode { row, .. }
            | DecodeError::UnsupportedFunction { row, .. } => *row,
        }
    }

    /// The instruction-buffer offset the error points at.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::MalformedBytecode { offset, .. }
            | DecodeError::StackUnderflow { offset, .. }
            | DecodeError::UnsupportedOpcode { offset, .. }
            | DecodeError::UnsupportedFunction { offset, .. } => *offset,
        }
    }
}

/// Crate-wide result alias.
pub type DecodeResult<T> = Result<T, DecodeError>;
