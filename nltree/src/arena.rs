//! A borrow-based backend over `typed_arena`.
//!
//! [`ArenaExpr`] exercises the emitter seam with reference handles instead
//! of indices: nodes live in a caller-owned arena and `NodeRef` is a plain
//! shared reference, so subtrees can be walked without going back through
//! the backend.

use typed_arena::Arena;

use crate::emit::{BinaryOp, NaryOp, TreeEmitter, UnaryOp};

/// Arena-allocated expression node.
#[derive(Debug)]
pub enum ExprNode<'a> {
    /// Translated variable index.
    Variable(usize),
    Constant(f64),
    Unary(UnaryOp, &'a ExprNode<'a>),
    Binary(BinaryOp, &'a ExprNode<'a>, &'a ExprNode<'a>),
    /// Children in push order.
    Nary(NaryOp, Vec<&'a ExprNode<'a>>),
}

impl ExprNode<'_> {
    /// Evaluate at `point`, indexed by translated variable index.
    ///
    /// Same conventions as [`crate::eval::EvalTree::value`]: out-of-range
    /// variables are NaN, integer powers go through `powi`.
    pub fn value(&self, point: &[f64]) -> f64 {
        match self {
            ExprNode::Variable(index) => point.get(*index).copied().unwrap_or(f64::NAN),
            ExprNode::Constant(value) => *value,
            ExprNode::Unary(op, child) => {
                let x = child.value(point);
                match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Abs => x.abs(),
                    UnaryOp::Sqrt => x.sqrt(),
                    UnaryOp::Square => x * x,
                    UnaryOp::Exp => x.exp(),
                    UnaryOp::Ln => x.ln(),
                    UnaryOp::Sin => x.sin(),
                    UnaryOp::Cos => x.cos(),
                    UnaryOp::Tan => x.tan(),
                }
            }
            ExprNode::Binary(op, left, right) => {
                let a = left.value(point);
                let b = right.value(point);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::RealPower => a.powf(b),
                    BinaryOp::IntPower => a.powi(b as i32),
                }
            }
            ExprNode::Nary(op, children) => {
                let values = children.iter().map(|child| child.value(point));
                match op {
                    NaryOp::Sum => values.sum(),
                    NaryOp::Min => values.fold(f64::INFINITY, f64::min),
                    NaryOp::Max => values.fold(f64::NEG_INFINITY, f64::max),
                }
            }
        }
    }
}

/// Emitter allocating into a caller-owned arena.
///
/// The backend borrows the arena rather than owning it, so the handles it
/// returns outlive the backend value itself:
///
/// ```
/// use typed_arena::Arena;
/// use nltree::arena::ArenaExpr;
/// use nltree::emit::TreeEmitter;
///
/// let arena = Arena::new();
/// let mut backend = ArenaExpr::new(&arena);
/// let x = backend.create_variable(0);
/// drop(backend);
/// assert_eq!(x.value(&[4.0]), 4.0);
/// ```
#[derive(Clone, Copy)]
pub struct ArenaExpr<'a> {
    arena: &'a Arena<ExprNode<'a>>,
}

impl<'a> ArenaExpr<'a> {
    pub fn new(arena: &'a Arena<ExprNode<'a>>) -> Self {
        ArenaExpr { arena }
    }
}

impl<'a> TreeEmitter for ArenaExpr<'a> {
    type NodeRef = &'a ExprNode<'a>;

    fn create_variable(&mut self, index: usize) -> Self::NodeRef {
        self.arena.alloc(ExprNode::Variable(index))
    }

    fn create_constant(&mut self, value: f64) -> Self::NodeRef {
        self.arena.alloc(ExprNode::Constant(value))
    }

    fn create_unary(&mut self, op: UnaryOp, child: Self::NodeRef) -> Self::NodeRef {
        self.arena.alloc(ExprNode::Unary(op, child))
    }

    fn create_binary(
        &mut self,
        op: BinaryOp,
        left: Self::NodeRef,
        right: Self::NodeRef,
    ) -> Self::NodeRef {
        self.arena.alloc(ExprNode::Binary(op, left, right))
    }

    fn create_nary(&mut self, op: NaryOp, children: Vec<Self::NodeRef>) -> Self::NodeRef {
        self.arena.alloc(ExprNode::Nary(op, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_nodes_evaluate() {
        let arena = Arena::new();
        let mut backend = ArenaExpr::new(&arena);

        // x0 * (x0 + 1), reusing the x0 handle.
        let x0 = backend.create_variable(0);
        let one = backend.create_constant(1.0);
        let sum = backend.create_binary(BinaryOp::Add, x0, one);
        let root = backend.create_binary(BinaryOp::Mul, x0, sum);

        assert_eq!(root.value(&[3.0]), 12.0);
    }

    #[test]
    fn nary_over_borrowed_children() {
        let arena = Arena::new();
        let mut backend = ArenaExpr::new(&arena);
        let children = vec![
            backend.create_constant(2.0),
            backend.create_variable(0),
        ];
        let max = backend.create_nary(NaryOp::Max, children);
        assert_eq!(max.value(&[5.0]), 5.0);
        assert_eq!(max.value(&[-5.0]), 2.0);
    }
}
