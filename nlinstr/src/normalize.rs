//! Stack normalization: rewriting the three stack-reordering opcodes out of
//! an instruction buffer.
//!
//! GAMS emits `Swap`, `PushS` (duplicate the value produced `k` groups down)
//! and `Popup` (pop down, discarding slots below the top) to shuffle operands
//! that were pushed in the wrong order for postfix consumption. This pass
//! removes all three by physically rotating the underlying instruction
//! blocks, so the surviving stream is evaluable by a single left-to-right
//! walk with a conventional operand stack.
//!
//! The bookkeeping device is a position table mapping logical stack depth to
//! the buffer offset where that slot's producing group begins; a group's
//! extent runs to the next entry's start (or the scan offset, for the top
//! slot). Duplicating a group rotates it to the top and leaves a zero-extent
//! "ghost" entry at the source depth; `Popup` may only discard such ghosts,
//! since a live group's instructions would otherwise dangle in the buffer.
//! Eliminated instructions are overwritten with [`Instruction::SKIP`], which
//! has no wire value and therefore cannot collide with legitimate opcode 0.

use log::{debug, trace};
use smallvec::SmallVec;

use crate::instr::{Instruction, RowRef};
use crate::opcode::Opcode;
use crate::utils::{DecodeError, DecodeResult};

/// Logical stack depth to group start offset. Discarded after the pass.
#[derive(Debug, Default)]
struct PosTable {
    starts: SmallVec<usize, 32>,
}

impl PosTable {
    fn new() -> Self {
        PosTable::default()
    }

    fn depth(&self) -> usize {
        self.starts.len()
    }

    fn start(&self, slot: usize) -> usize {
        self.starts[slot]
    }

    fn set_start(&mut self, slot: usize, start: usize) {
        self.starts[slot] = start;
    }

    /// A new group begins at `start`.
    fn push(&mut self, start: usize) {
        self.starts.push(start);
    }

    /// `pops` slots are consumed and replaced by one result group, which
    /// begins where the deepest consumed group began.
    fn merge(&mut self, pops: usize) {
        debug_assert!(pops >= 1 && pops <= self.depth(), "merge out of range");
        let start = self.starts[self.depth() - pops];
        self.starts.truncate(self.depth() - pops);
        self.starts.push(start);
    }

    /// `pops` slots are consumed with no result (store and friends).
    fn discard(&mut self, pops: usize) {
        debug_assert!(pops <= self.depth(), "discard out of range");
        self.starts.truncate(self.depth() - pops);
    }

    /// Drop `n` slots directly below the top, keeping the top slot.
    fn collapse(&mut self, n: usize) {
        debug_assert!(n + 1 <= self.depth(), "collapse out of range");
        let top = self.starts[self.depth() - 1];
        self.starts.truncate(self.depth() - 1 - n);
        self.starts.push(top);
    }

    /// Shift every start above `slot` left by `len` buffer words.
    fn shift_above(&mut self, slot: usize, len: usize) {
        for j in slot + 1..self.depth() {
            self.starts[j] -= len;
        }
    }
}

fn malformed(row: RowRef, offset: usize, detail: String) -> DecodeError {
    DecodeError::MalformedBytecode {
        row,
        offset,
        detail,
    }
}

fn displacement(instr: Instruction, row: RowRef, offset: usize) -> DecodeResult<usize> {
    if instr.address < 0 {
        return Err(malformed(
            row,
            offset,
            format!("{} without a stack displacement", instr.opcode),
        ));
    }
    Ok(instr.address as usize)
}

/// Rewrite `instrs` in place until no stack-reordering opcode remains.
///
/// Idempotent: a second run over the output finds nothing to do and leaves
/// the buffer byte-identical. Any bookkeeping violation (negative depth, a
/// rotation that would leave the buffer, a displacement over live groups)
/// aborts with [`DecodeError::MalformedBytecode`] before the builder ever
/// sees the stream.
pub fn normalize(instrs: &mut [Instruction], row: RowRef) -> DecodeResult<()> {
    let mut table = PosTable::new();
    // Offset and count of the pending FuncArgN. The count is copied out
    // because a rotation between the declaration and its CallArgN can move
    // the word itself.
    let mut last_funcarg: Option<(usize, usize)> = None;
    let mut eliminated = 0usize;

    for i in 0..instrs.len() {
        let instr = instrs[i];
        let op = instr.opcode;

        if !op.is_decodable() {
            return Err(DecodeError::UnsupportedOpcode {
                row,
                offset: i,
                opcode: op.to_string(),
            });
        }

        match op {
            Opcode::Swap => {
                if table.depth() < 2 {
                    return Err(malformed(
                        row,
                        i,
                        format!("swap with {} operand groups on the stack", table.depth()),
                    ));
                }
                let top = table.depth() - 1;
                let a = table.start(top - 1);
                let b = table.start(top);
                if a == b {
                    return Err(malformed(
                        row,
                        i,
                        "swap across an eliminated duplicate group".to_string(),
                    ));
                }
                debug_assert!(a < b && b < i, "position table out of order: {a} {b} {i}");
                trace!("{row}: swap at {i} rotates groups [{a}, {b}) and [{b}, {i})");
                instrs[a..i].rotate_left(b - a);
                table.set_start(top, a + (i - b));
                instrs[i] = Instruction::SKIP;
                eliminated += 1;
            }

            Opcode::PushS => {
                let k = displacement(instr, row, i)?;
                if table.depth() < k + 1 {
                    return Err(malformed(
                        row,
                        i,
                        format!(
                            "duplicate from depth {k} with only {} operand groups",
                            table.depth()
                        ),
                    ));
                }
                let src = table.depth() - 1 - k;
                let start = table.start(src);
                let end = if src + 1 < table.depth() {
                    table.start(src + 1)
                } else {
                    i
                };
                let len = end - start;
                if len == 0 {
                    return Err(malformed(
                        row,
                        i,
                        format!("duplicate of the already-eliminated group at depth {k}"),
                    ));
                }
                debug_assert!(end <= i, "group extends past the scan offset");
                trace!("{row}: duplicate at {i} moves group [{start}, {end}) to the top");
                instrs[start..i].rotate_left(len);
                table.shift_above(src, len);
                table.push(i - len);
                instrs[i] = Instruction::SKIP;
                eliminated += 1;
            }

            Opcode::Popup => {
                let k = displacement(instr, row, i)?;
                let n = k + 1;
                if table.depth() < n + 1 {
                    return Err(malformed(
                        row,
                        i,
                        format!(
                            "pop-to-depth over {n} slots with only {} operand groups",
                            table.depth()
                        ),
                    ));
                }
                let top = table.depth() - 1;
                for j in top - n..top {
                    if table.start(j) != table.start(j + 1) {
                        return Err(malformed(
                            row,
                            i,
                            format!("pop-to-depth would discard the live group at depth {}", top - j),
                        ));
                    }
                }
                trace!("{row}: pop-to-depth at {i} discards {n} ghost slots");
                table.collapse(n);
                instrs[i] = Instruction::SKIP;
                eliminated += 1;
            }

            Opcode::FuncArgN => {
                if instr.address < 0 {
                    return Err(malformed(row, i, "argument count missing".to_string()));
                }
                last_funcarg = Some((i, instr.address as usize));
            }

            Opcode::CallArgN => {
                let (funcarg, n) = last_funcarg.take().ok_or_else(|| {
                    malformed(row, i, "n-ary call without a preceding argument count".to_string())
                })?;
                if table.depth() < n {
                    return Err(malformed(
                        row,
                        i,
                        format!(
                            "n-ary call over {n} operands with only {} groups",
                            table.depth()
                        ),
                    ));
                }
                check_live(&table, n, row, i)?;
                // With operands on the stack the FuncArgN word already sits
                // inside the top group's extent; a zero-argument call has no
                // group, so the call group must reach back over it itself.
                let start = if n == 0 {
                    if instrs[funcarg].opcode != Opcode::FuncArgN {
                        return Err(malformed(
                            row,
                            i,
                            "argument count displaced by stack reordering".to_string(),
                        ));
                    }
                    funcarg
                } else {
                    table.start(table.depth() - n)
                };
                table.discard(n);
                table.push(start);
            }

            _ => {
                let meta = op.meta();
                let Some(pops) = meta.arity.fixed_pops() else {
                    return Err(malformed(
                        row,
                        i,
                        format!("{op} has no fixed stack effect"),
                    ));
                };
                if table.depth() < pops {
                    return Err(malformed(
                        row,
                        i,
                        format!(
                            "{op} needs {pops} operand groups but only {} are on the stack",
                            table.depth()
                        ),
                    ));
                }
                check_live(&table, pops, row, i)?;
                match (pops, meta.pushes) {
                    (0, true) => table.push(i),
                    (0, false) => {}
                    (_, true) => table.merge(pops),
                    (_, false) => table.discard(pops),
                }
            }
        }
    }

    if eliminated > 0 {
        debug!(
            "{row}: rewrote {eliminated} stack-reordering instructions across {} words",
            instrs.len()
        );
    }
    Ok(())
}

/// Consuming a ghost slot as an operand means a duplicated group was never
/// discarded; the stream cannot mean anything sensible past that point.
fn check_live(table: &PosTable, pops: usize, row: RowRef, offset: usize) -> DecodeResult<()> {
    if pops == 0 {
        return Ok(());
    }
    let top = table.depth() - 1;
    for j in table.depth() - pops..top {
        if table.start(j) == table.start(j + 1) {
            return Err(malformed(
                row,
                offset,
                format!("operand at depth {} is an undischarged duplicate", top - j),
            ));
        }
    }
    Ok(())
}
