//! Instruction-level model for GAMS nonlinear ("NL") bytecode.
//!
//! This crate covers everything below the expression layer: the 32-bit wire
//! word format ([`word`]), the two historical opcode enumerations and their
//! classification table ([`opcode`]), the decoded [`instr::Instruction`]
//! form, and the stack normalizer ([`normalize`]) that rewrites
//! stack-reordering opcodes out of a buffer so the remaining stream is pure
//! left-to-right postfix.

pub mod instr;
pub mod normalize;
pub mod opcode;
pub mod utils;
pub mod word;
