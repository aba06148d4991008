//! Decoded instruction form and row identity.

use std::fmt;

use crate::opcode::{AddressKind, Opcode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One decoded NL instruction.
///
/// The address is stored 0-based (the wire keeps it 1-based; decoding
/// subtracts one, and `-1` means the wire field was empty). Its meaning
/// depends entirely on the opcode, see [`Opcode::meta`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    /// Semantic opcode.
    pub opcode: Opcode,
    /// Decoded (already decremented) address, `-1` when absent.
    pub address: i64,
}

impl Instruction {
    /// The placeholder the normalizer writes over eliminated instructions.
    pub const SKIP: Instruction = Instruction {
        opcode: Opcode::Skip,
        address: -1,
    };

    /// An instruction with an address operand.
    pub fn new(opcode: Opcode, address: i64) -> Self {
        Instruction { opcode, address }
    }

    /// An instruction without an address operand.
    pub fn plain(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            address: -1,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address < 0 {
            return write!(f, "{}", self.opcode);
        }
        match self.opcode.meta().address {
            AddressKind::Variable => write!(f, "{} v{}", self.opcode, self.address),
            AddressKind::Constant => write!(f, "{} c{}", self.opcode, self.address),
            AddressKind::FunctionCode => write!(f, "{} f{}", self.opcode, self.address),
            AddressKind::ArgCount => write!(f, "{} #{}", self.opcode, self.address),
            AddressKind::StackDisplacement => write!(f, "{} +{}", self.opcode, self.address),
            AddressKind::None => write!(f, "{} {}", self.opcode, self.address),
        }
    }
}

/// Which row a slice of instructions belongs to.
///
/// Carried into every error and log line so a failing model reports the
/// precise equation instead of aborting the whole decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RowRef {
    /// The objective row.
    #[default]
    Objective,
    /// A constraint row, 0-based.
    Equation(usize),
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Objective => write!(f, "objective"),
            RowRef::Equation(i) => write!(f, "equation {i}"),
        }
    }
}
