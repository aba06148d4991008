//! A flat `Vec`-arena backend with numeric evaluation.
//!
//! This is the reference [`TreeEmitter`]: cheap `u32` handles, a
//! recursive evaluator and an infix renderer for diagnostics. Node order
//! follows emission order, so children always precede their parents and
//! the root of a decoded row is the last node.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::emit::{BinaryOp, NaryOp, TreeEmitter, UnaryOp};

/// Handle into an [`EvalTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of an [`EvalTree`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EvalNode {
    /// Translated variable index.
    Variable(usize),
    Constant(f64),
    Unary(UnaryOp, NodeId),
    Binary(BinaryOp, NodeId, NodeId),
    /// Children in push order.
    Nary(NaryOp, Vec<NodeId>),
}

/// Flat expression arena addressed by [`NodeId`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EvalTree {
    nodes: Vec<EvalNode>,
}

impl EvalTree {
    pub fn new() -> Self {
        EvalTree { nodes: Vec::new() }
    }

    pub fn node(&self, id: NodeId) -> &EvalNode {
        &self.nodes[id.index()]
    }

    /// All nodes in emission order.
    pub fn nodes(&self) -> &[EvalNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: EvalNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Evaluate `node` at `point`, indexed by translated variable index.
    ///
    /// Out-of-range variable indices evaluate to NaN rather than panicking;
    /// a short point vector is a caller bug, not a decode error.
    pub fn value(&self, node: NodeId, point: &[f64]) -> f64 {
        match self.node(node) {
            EvalNode::Variable(index) => point.get(*index).copied().unwrap_or(f64::NAN),
            EvalNode::Constant(value) => *value,
            EvalNode::Unary(op, child) => {
                let x = self.value(*child, point);
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
            EvalNode::Binary(op, left, right) => {
                let a = self.value(*left, point);
                let b = self.value(*right, point);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::RealPower => a.powf(b),
                    // Dispatch only emits this when the exponent fits an i32.
                    BinaryOp::IntPower => a.powi(b as i32),
                }
            }
            EvalNode::Nary(op, children) => {
                let values = children.iter().map(|&child| self.value(child, point));
                match op {
                    NaryOp::Sum => values.sum(),
                    NaryOp::Min => values.fold(f64::INFINITY, f64::min),
                    NaryOp::Max => values.fold(f64::NEG_INFINITY, f64::max),
                }
            }
        }
    }

    /// Infix rendering for diagnostics and demos.
    pub fn render(&self, node: NodeId) -> impl fmt::Display + '_ {
        struct Render<'a> {
            tree: &'a EvalTree,
            node: NodeId,
        }

        impl fmt::Display for Render<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.tree.fmt_node(self.node, f)
            }
        }

        Render { tree: self, node }
    }

    fn fmt_node(&self, node: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node(node) {
            EvalNode::Variable(index) => write!(f, "x{index}"),
            EvalNode::Constant(value) => write!(f, "{value}"),
            EvalNode::Unary(UnaryOp::Neg, child) => {
                write!(f, "-")?;
                self.fmt_node(*child, f)
            }
            EvalNode::Unary(op, child) => {
                write!(f, "{op}(")?;
                self.fmt_node(*child, f)?;
                write!(f, ")")
            }
            EvalNode::Binary(op, left, right) => {
                write!(f, "(")?;
                self.fmt_node(*left, f)?;
                write!(f, " {op} ")?;
                self.fmt_node(*right, f)?;
                write!(f, ")")
            }
            EvalNode::Nary(op, children) => {
                write!(f, "{op}(")?;
                for (i, &child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    self.fmt_node(child, f)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl TreeEmitter for EvalTree {
    type NodeRef = NodeId;

    fn create_variable(&mut self, index: usize) -> NodeId {
        self.push(EvalNode::Variable(index))
    }

    fn create_constant(&mut self, value: f64) -> NodeId {
        self.push(EvalNode::Constant(value))
    }

    fn create_unary(&mut self, op: UnaryOp, child: NodeId) -> NodeId {
        self.push(EvalNode::Unary(op, child))
    }

    fn create_binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.push(EvalNode::Binary(op, left, right))
    }

    fn create_nary(&mut self, op: NaryOp, children: Vec<NodeId>) -> NodeId {
        self.push(EvalNode::Nary(op, children))
    }
}
