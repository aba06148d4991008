//! 32-bit wire word format.
//!
//! Each instruction is one unsigned word: the high 6 bits carry the raw
//! opcode, the low 26 bits a 1-based address where 0 means "no address".
//! Decoding therefore subtracts one from the field, and the address travels
//! 0-based (or `-1`) from here on. The single place that undoes the shift is
//! the function-code lookup, which matches `address + 1` against the table.

use crate::instr::{Instruction, RowRef};
use crate::opcode::{Opcode, OpcodeSet};
use crate::utils::{DecodeError, DecodeResult};

/// Bit position of the raw opcode inside a word.
pub const OPCODE_SHIFT: u32 = 26;

/// Mask selecting the 1-based address field.
pub const ADDRESS_MASK: u32 = 0x03FF_FFFF;

/// Largest decoded (0-based) address representable on the wire.
pub const MAX_ADDRESS: i64 = ADDRESS_MASK as i64 - 1;

/// Split one wire word against the active enumeration.
///
/// `row` and `offset` only feed the error path; a raw opcode outside the set
/// is an [`DecodeError::UnsupportedOpcode`] naming the raw bits in hex.
pub fn decode_word(
    word: u32,
    set: OpcodeSet,
    row: RowRef,
    offset: usize,
) -> DecodeResult<Instruction> {
    let raw = (word >> OPCODE_SHIFT) as u8;
    let opcode = Opcode::from_raw(raw, set).ok_or_else(|| DecodeError::UnsupportedOpcode {
        row,
        offset,
        opcode: format!("{raw:#04x}"),
    })?;
    let address = (word & ADDRESS_MASK) as i64 - 1;
    Ok(Instruction { opcode, address })
}

/// Join an instruction back into a wire word.
///
/// Returns `None` when the opcode has no raw value in `set` (so in
/// particular for [`Opcode::Skip`]) or when the address does not fit the
/// 26-bit field. This direction exists for tests, demos and benches; models
/// arrive already encoded.
pub fn encode_word(instr: Instruction, set: OpcodeSet) -> Option<u32> {
    let raw = instr.opcode.raw(set)?;
    let field = instr.address + 1;
    if !(0..=ADDRESS_MASK as i64).contains(&field) {
        return None;
    }
    Some(((raw as u32) << OPCODE_SHIFT) | field as u32)
}

/// Decode a whole row of words, reporting the word index on failure.
pub fn decode_stream(words: &[u32], set: OpcodeSet, row: RowRef) -> DecodeResult<Vec<Instruction>> {
    words
        .iter()
        .enumerate()
        .map(|(offset, &word)| decode_word(word, set, row, offset))
        .collect()
}

/// Encode a whole row of instructions; `None` if any word is unrepresentable.
pub fn encode_stream(instrs: &[Instruction], set: OpcodeSet) -> Option<Vec<u32>> {
    instrs.iter().map(|&i| encode_word(i, set)).collect()
}
