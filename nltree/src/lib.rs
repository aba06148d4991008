//! Expression-tree layer for GAMS nonlinear ("NL") bytecode.
//!
//! [`nlinstr`] delivers a normalized postfix instruction stream; this crate
//! interprets it. The interpreter ([`build`]) runs the stream against an
//! operand stack and emits nodes through the backend-neutral
//! [`emit::TreeEmitter`] seam, expanding nonlinear function calls via the
//! dispatch table in [`func`]. Two reference backends are included: a
//! `Vec`-arena tree with numeric evaluation ([`eval`]) and a borrow-based
//! typed-arena tree ([`arena`]).

pub mod arena;
pub mod build;
pub mod emit;
pub mod eval;
pub mod func;
