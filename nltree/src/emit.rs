//! Backend-neutral emission seam.
//!
//! The builder never constructs tree nodes itself; it calls a
//! [`TreeEmitter`] and threads the returned handles through its operand
//! stack. A backend decides what a handle is: an index into a flat arena
//! ([`crate::eval::EvalTree`]), a borrowed allocation
//! ([`crate::arena::ArenaExpr`]), or anything else that is cheap to clone.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// One-operand node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UnaryOp {
    /// Sign flip.
    Neg,
    /// Absolute value.
    Abs,
    /// Square root.
    Sqrt,
    /// `x * x`, kept distinct from the power nodes.
    #[strum(serialize = "sqr")]
    Square,
    /// Natural exponential.
    Exp,
    /// Natural logarithm.
    Ln,
    /// Sine.
    Sin,
    /// Cosine.
    Cos,
    /// Tangent.
    Tan,
}

/// Two-operand node kinds.
///
/// The two power forms are deliberately separate: backends evaluate
/// [`BinaryOp::IntPower`] along the integer path (`powi`) and
/// [`BinaryOp::RealPower`] along the general path (`powf`), which are not
/// numerically interchangeable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BinaryOp {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    /// General power, right operand an arbitrary real.
    #[strum(serialize = "**")]
    RealPower,
    /// Power with an integral right operand.
    #[strum(serialize = "^")]
    IntPower,
}

/// Variadic node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NaryOp {
    Sum,
    Min,
    Max,
}

/// Receives the nodes the builder produces.
///
/// `NodeRef: Clone` is load-bearing: some dispatch expansions reference an
/// operand twice (signed power emits both `x` and `|x|` from the same
/// handle), and the builder clones rather than re-emitting.
pub trait TreeEmitter {
    /// Handle to an emitted node.
    type NodeRef: Clone;

    /// A variable leaf. `index` has already been through the caller's
    /// [`VarTranslate`]; backends never see raw bytecode addresses.
    fn create_variable(&mut self, index: usize) -> Self::NodeRef;

    /// A numeric constant leaf.
    fn create_constant(&mut self, value: f64) -> Self::NodeRef;

    fn create_unary(&mut self, op: UnaryOp, child: Self::NodeRef) -> Self::NodeRef;

    fn create_binary(
        &mut self,
        op: BinaryOp,
        left: Self::NodeRef,
        right: Self::NodeRef,
    ) -> Self::NodeRef;

    /// A variadic node over `children` in push order.
    fn create_nary(&mut self, op: NaryOp, children: Vec<Self::NodeRef>) -> Self::NodeRef;
}

/// Maps bytecode variable addresses (declaration order) into the index
/// space the backend's variable nodes use (solver order).
///
/// Must be pure and total over the variable range the row can mention; the
/// builder calls it exactly once per variable reference and never passes a
/// raw address to [`TreeEmitter::create_variable`] directly.
pub trait VarTranslate {
    fn translate(&self, raw: usize) -> usize;
}

/// Raw indices pass through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMap;

impl VarTranslate for IdentityMap {
    fn translate(&self, raw: usize) -> usize {
        raw
    }
}

/// Permutation table. The slice must cover every raw index the decoded
/// rows can mention.
#[derive(Clone, Copy, Debug)]
pub struct TableMap<'a>(pub &'a [usize]);

impl VarTranslate for TableMap<'_> {
    fn translate(&self, raw: usize) -> usize {
        self.0[raw]
    }
}

/// Wraps an arbitrary `Fn(usize) -> usize`.
#[derive(Clone, Copy, Debug)]
pub struct FnMap<F>(pub F);

impl<F: Fn(usize) -> usize> VarTranslate for FnMap<F> {
    fn translate(&self, raw: usize) -> usize {
        (self.0)(raw)
    }
}
