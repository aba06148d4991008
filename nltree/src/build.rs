//! The postfix interpreter.
//!
//! [`RowDecoder`] bundles everything one row's decode needs: the shared
//! constant pool, the caller's variable translator, the emitter and the row
//! identity. The original decoder kept most of this in process globals;
//! making it an explicit value is what lets independent rows decode on
//! independent threads.
//!
//! The interpreter itself ([`RowDecoder::build`]) expects a normalized
//! stream: any surviving `Swap`/`PushS`/`Popup` is reported as malformed.
//! [`RowDecoder::decode`] runs the normalizer first, under a
//! [`CopyPolicy`] chosen by the caller.

use either::Either;
use log::debug;
use nlinstr::instr::{Instruction, RowRef};
use nlinstr::normalize::normalize;
use nlinstr::opcode::{Opcode, OpcodeSet};
use nlinstr::utils::{DecodeError, DecodeResult};
use nlinstr::word::decode_stream;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use strum::{Display, EnumIs};

use crate::emit::{BinaryOp, TreeEmitter, UnaryOp, VarTranslate};
use crate::func;

/// Checked view over the row's shared constant pool.
#[derive(Clone, Copy, Debug)]
pub struct ConstantPool<'a> {
    values: &'a [f64],
}

impl<'a> ConstantPool<'a> {
    pub fn new(values: &'a [f64]) -> Self {
        ConstantPool { values }
    }

    /// Look up a pool constant by decoded address.
    pub fn get(&self, address: i64, row: RowRef, offset: usize) -> DecodeResult<f64> {
        if address < 0 {
            return Err(DecodeError::MalformedBytecode {
                row,
                offset,
                detail: "constant reference without an address".to_string(),
            });
        }
        let index = address as usize;
        self.values
            .get(index)
            .copied()
            .ok_or_else(|| DecodeError::MalformedBytecode {
                row,
                offset,
                detail: format!(
                    "constant index {index} outside a pool of {}",
                    self.values.len()
                ),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One operand-stack entry: the emitted handle, plus the constant value
/// when the node is a literal.
///
/// Literal tracking is what lets the power dispatch choose between the
/// integer and real paths. A slot is literal iff it was pushed straight
/// from the pool or synthesized as a constant; composite results never are.
#[derive(Clone, Debug)]
pub struct Slot<R> {
    /// Backend handle for the operand.
    pub node: R,
    /// Known constant value, if any.
    pub literal: Option<f64>,
}

impl<R> Slot<R> {
    /// A composite operand.
    pub fn new(node: R) -> Self {
        Slot {
            node,
            literal: None,
        }
    }

    /// A constant operand with a known value.
    pub fn constant(node: R, value: f64) -> Self {
        Slot {
            node,
            literal: Some(value),
        }
    }
}

/// Whether [`RowDecoder::decode`] may rewrite the caller's buffer.
///
/// Some callers keep the original buffer for a second, independent pass
/// after decoding; they ask for a private copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CopyPolicy {
    /// Normalize the caller's buffer directly.
    #[default]
    InPlace,
    /// Normalize an internal copy and leave the input untouched.
    PrivateCopy,
}

type OperandStack<R> = SmallVec<Slot<R>, 16>;

fn pop<R>(
    stack: &mut OperandStack<R>,
    row: RowRef,
    offset: usize,
    opcode: Opcode,
) -> DecodeResult<Slot<R>> {
    stack
        .pop()
        .ok_or(DecodeError::StackUnderflow { row, offset, opcode })
}

/// The binary node kind behind a plain or fused arithmetic opcode.
fn arith_op(op: Opcode) -> BinaryOp {
    match op {
        Opcode::Add | Opcode::AddV | Opcode::AddI => BinaryOp::Add,
        Opcode::Sub | Opcode::SubV | Opcode::SubI => BinaryOp::Sub,
        Opcode::Mul | Opcode::MulV | Opcode::MulI => BinaryOp::Mul,
        Opcode::Div | Opcode::DivV | Opcode::DivI => BinaryOp::Div,
        other => unreachable!("{other} has no fused arithmetic form"),
    }
}

/// Per-row decode context.
pub struct RowDecoder<'a, V, E> {
    pool: ConstantPool<'a>,
    vars: V,
    emitter: E,
    row: RowRef,
}

impl<'a, V: VarTranslate, E: TreeEmitter> RowDecoder<'a, V, E> {
    pub fn new(pool: &'a [f64], vars: V, emitter: E, row: RowRef) -> Self {
        RowDecoder {
            pool: ConstantPool::new(pool),
            vars,
            emitter,
            row,
        }
    }

    pub fn row(&self) -> RowRef {
        self.row
    }

    /// The backend, for callers that need to inspect emitted nodes.
    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Hand the backend back once decoding is done.
    pub fn into_emitter(self) -> E {
        self.emitter
    }

    /// Interpret an already-normalized stream and return the root handle.
    ///
    /// Streams that never contained reordering opcodes can come straight
    /// here; everything else goes through [`RowDecoder::decode`] first.
    pub fn build(&mut self, instrs: &[Instruction]) -> DecodeResult<E::NodeRef> {
        let mut stack: OperandStack<E::NodeRef> = SmallVec::new();
        let mut pending_args: Option<usize> = None;

        for (offset, instr) in instrs.iter().enumerate() {
            let op = instr.opcode;
            match op {
                // Row bookkeeping: no tree effect.
                Opcode::NoOp
                | Opcode::Skip
                | Opcode::Header
                | Opcode::Chk
                | Opcode::EquScale
                | Opcode::Store
                | Opcode::StoreS => {}
                Opcode::End => break,

                Opcode::Swap | Opcode::PushS | Opcode::Popup => {
                    return Err(DecodeError::MalformedBytecode {
                        row: self.row,
                        offset,
                        detail: format!("{op} reached the builder, stream not normalized"),
                    });
                }

                Opcode::PushV => {
                    let index = self.var_index(instr.address, offset)?;
                    let node = self.emitter.create_variable(index);
                    stack.push(Slot::new(node));
                }
                Opcode::PushI => {
                    let value = self.pool.get(instr.address, self.row, offset)?;
                    let node = self.emitter.create_constant(value);
                    stack.push(Slot::constant(node, value));
                }
                Opcode::PushZero => {
                    let node = self.emitter.create_constant(0.0);
                    stack.push(Slot::constant(node, 0.0));
                }

                Opcode::UMin => {
                    let x = pop(&mut stack, self.row, offset, op)?;
                    let node = self.emitter.create_unary(UnaryOp::Neg, x.node);
                    stack.push(Slot::new(node));
                }
                Opcode::UMinV => {
                    let index = self.var_index(instr.address, offset)?;
                    let variable = self.emitter.create_variable(index);
                    let node = self.emitter.create_unary(UnaryOp::Neg, variable);
                    stack.push(Slot::new(node));
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    let right = pop(&mut stack, self.row, offset, op)?;
                    let left = pop(&mut stack, self.row, offset, op)?;
                    let node = self
                        .emitter
                        .create_binary(arith_op(op), left.node, right.node);
                    stack.push(Slot::new(node));
                }
                Opcode::AddV | Opcode::SubV | Opcode::MulV | Opcode::DivV => {
                    let index = self.var_index(instr.address, offset)?;
                    self.fused(&mut stack, offset, op, Either::Right(index))?;
                }
                Opcode::AddI | Opcode::SubI | Opcode::MulI | Opcode::DivI => {
                    let value = self.pool.get(instr.address, self.row, offset)?;
                    self.fused(&mut stack, offset, op, Either::Left(value))?;
                }

                Opcode::MulIAdd => {
                    let value = self.pool.get(instr.address, self.row, offset)?;
                    let x = pop(&mut stack, self.row, offset, op)?;
                    let scale = self.emitter.create_constant(value);
                    let scaled = self.emitter.create_binary(BinaryOp::Mul, scale, x.node);
                    let y = pop(&mut stack, self.row, offset, op)?;
                    let node = self.emitter.create_binary(BinaryOp::Add, y.node, scaled);
                    stack.push(Slot::new(node));
                }

                Opcode::FuncArgN => {
                    if instr.address < 0 {
                        return Err(DecodeError::MalformedBytecode {
                            row: self.row,
                            offset,
                            detail: "argument count without an address".to_string(),
                        });
                    }
                    pending_args = Some(instr.address as usize);
                }
                Opcode::CallArg1 => {
                    let x = pop(&mut stack, self.row, offset, op)?;
                    self.call(&mut stack, offset, instr.address, vec![x])?;
                }
                Opcode::CallArg2 => {
                    let second = pop(&mut stack, self.row, offset, op)?;
                    let first = pop(&mut stack, self.row, offset, op)?;
                    self.call(&mut stack, offset, instr.address, vec![first, second])?;
                }
                Opcode::CallArgN => {
                    let Some(count) = pending_args.take() else {
                        return Err(DecodeError::MalformedBytecode {
                            row: self.row,
                            offset,
                            detail: "n-ary call without a declared argument count".to_string(),
                        });
                    };
                    let mut args = Vec::with_capacity(count);
                    for _ in 0..count {
                        args.push(pop(&mut stack, self.row, offset, op)?);
                    }
                    args.reverse();
                    self.call(&mut stack, offset, instr.address, args)?;
                }

                other => {
                    debug_assert!(!other.is_decodable(), "{other} has no builder rule");
                    return Err(DecodeError::UnsupportedOpcode {
                        row: self.row,
                        offset,
                        opcode: other.to_string(),
                    });
                }
            }
        }

        let root = match stack.pop() {
            Some(slot) if stack.is_empty() => slot.node,
            Some(_) => {
                return Err(DecodeError::MalformedBytecode {
                    row: self.row,
                    offset: instrs.len(),
                    detail: format!(
                        "stream left {} operands instead of a single root",
                        stack.len() + 1
                    ),
                });
            }
            None => {
                return Err(DecodeError::MalformedBytecode {
                    row: self.row,
                    offset: instrs.len(),
                    detail: "stream produced no root operand".to_string(),
                });
            }
        };
        debug!("built a tree for {} from {} instructions", self.row, instrs.len());
        Ok(root)
    }

    /// Normalize, then interpret.
    pub fn decode(
        &mut self,
        instrs: &mut [Instruction],
        policy: CopyPolicy,
    ) -> DecodeResult<E::NodeRef> {
        match policy {
            CopyPolicy::InPlace => {
                normalize(instrs, self.row)?;
                self.build(instrs)
            }
            CopyPolicy::PrivateCopy => {
                let mut copy = instrs.to_vec();
                normalize(&mut copy, self.row)?;
                self.build(&copy)
            }
        }
    }

    /// Wire-to-tree convenience: split the words against `set`, normalize
    /// and interpret. Always works on a fresh buffer.
    pub fn decode_words(&mut self, words: &[u32], set: OpcodeSet) -> DecodeResult<E::NodeRef> {
        let mut instrs = decode_stream(words, set, self.row)?;
        normalize(&mut instrs, self.row)?;
        self.build(&instrs)
    }

    fn var_index(&self, address: i64, offset: usize) -> DecodeResult<usize> {
        if address < 0 {
            return Err(DecodeError::MalformedBytecode {
                row: self.row,
                offset,
                detail: "variable reference without an address".to_string(),
            });
        }
        Ok(self.vars.translate(address as usize))
    }

    /// Fused arithmetic: pop the left operand, synthesize the right one
    /// from an immediate constant or a variable index.
    fn fused(
        &mut self,
        stack: &mut OperandStack<E::NodeRef>,
        offset: usize,
        op: Opcode,
        rhs: Either<f64, usize>,
    ) -> DecodeResult<()> {
        let left = pop(stack, self.row, offset, op)?;
        let right = match rhs {
            Either::Left(value) => self.emitter.create_constant(value),
            Either::Right(index) => self.emitter.create_variable(index),
        };
        let node = self.emitter.create_binary(arith_op(op), left.node, right);
        stack.push(Slot::new(node));
        Ok(())
    }

    /// Re-increment the wire function code and dispatch.
    fn call(
        &mut self,
        stack: &mut OperandStack<E::NodeRef>,
        offset: usize,
        address: i64,
        args: Vec<Slot<E::NodeRef>>,
    ) -> DecodeResult<()> {
        let code = (address + 1) as u32;
        let slot = func::dispatch(code, args, self.row, offset, &mut self.emitter)?;
        stack.push(slot);
        Ok(())
    }
}
