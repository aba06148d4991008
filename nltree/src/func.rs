//! Nonlinear function dispatch.
//!
//! Function codes are a single flat enumeration shared by both opcode sets.
//! The call instructions carry `code - 1` in their address field; the
//! builder re-increments before calling [`dispatch`], so the `u32` arriving
//! here is the table value itself. Most codes have no tree expansion and
//! fail with [`DecodeError::UnsupportedFunction`], which names the code so
//! callers can report exactly which nonlinear function is the blocker.

use log::trace;
use nlinstr::instr::RowRef;
use nlinstr::utils::{DecodeError, DecodeResult};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, FromRepr, IntoStaticStr};

use crate::build::Slot;
use crate::emit::{BinaryOp, NaryOp, TreeEmitter, UnaryOp};

/// The GAMS nonlinear function codes, 1-based.
///
/// Code 0 (the map-value placeholder) is unreachable through the wire
/// shift and is not listed. Display and the static-str conversion use the
/// lowercase table names, which is what [`DecodeError::UnsupportedFunction`]
/// reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, FromRepr, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
#[repr(u32)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FuncCode {
    // Rounding, selection and plain arithmetic.
    Ceil = 1,
    Floor,
    Round,
    Mod,
    Trunc,
    Sign,
    Min,
    Max,
    Sqr,
    // Exponentials, logarithms and trigonometry.
    Exp = 10,
    Log,
    Log10,
    Sqrt,
    Abs,
    Cos,
    Sin,
    Tan,
    Arctan,
    Errf,
    // Random numbers and powers.
    Dunfm = 20,
    Dnorm,
    Power,
    Jdate,
    Jtime,
    Jstart,
    Jnow,
    Error,
    Gyear,
    Gmonth,
    // Calendar pieces.
    Gday = 30,
    Gdow,
    Gleap,
    Ghour,
    Gminute,
    Gsecond,
    CurSeed,
    TimeSt,
    TimeCo,
    TimeEx,
    // Timers and numeric oddments.
    TimeEl = 40,
    Gmillisec,
    Frac,
    Errorl,
    Heaps,
    Fact,
    Unfmi,
    Pi,
    Ncpf,
    Ncpcm,
    // Smoothing, entropy and the boolean family.
    Entropy = 50,
    Sigmoid,
    Log2,
    Boolnot,
    Booland,
    Boolor,
    Boolxor,
    Boolimp,
    Booleqv,
    Relopeq,
    // Relational operators and real power.
    Relopgt = 60,
    Relopge,
    Reloplt,
    Relople,
    Relopne,
    Ifthen,
    Rpower,
    Edist,
    Div,
    Div0,
    // Scaled/smoothed variants and the fixed-side powers.
    Sllog10 = 70,
    Sqlog10,
    Slexp,
    Sqexp,
    Slrec,
    Sqrec,
    Cvpower,
    Vcpower,
    Centropy,
    Gmonth2,
    // Second-epoch calendar pieces and signed power.
    Gdow2 = 80,
    Gday2,
    Gyear2,
    Gleap2,
    Ghour2,
    Gminute2,
    Gsecond2,
    Signpower,
    Handle,
    Ncpvusin,
    // Tail of the table.
    Ncpvupow = 90,
    Binomial,
    Rehandle,
    Gamma,
    Loggamma,
    Poly = 95,
}

/// Expand one function call into emitter nodes.
///
/// `args` are the popped operands in push order. The returned slot is
/// composite except for the zero-argument constants (pi), which stay
/// literal so an enclosing power can still specialize on them.
pub fn dispatch<E: TreeEmitter>(
    code: u32,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let Some(func) = FuncCode::from_repr(code) else {
        return Err(DecodeError::UnsupportedFunction {
            row,
            offset,
            code,
            name: None,
        });
    };
    trace!("{row}: dispatching {func} over {} operands", args.len());

    match func {
        FuncCode::Min => nary(func, NaryOp::Min, args, row, offset, emitter),
        FuncCode::Max => nary(func, NaryOp::Max, args, row, offset, emitter),

        FuncCode::Sqr => unary(func, UnaryOp::Square, args, row, offset, emitter),
        FuncCode::Sqrt => unary(func, UnaryOp::Sqrt, args, row, offset, emitter),
        FuncCode::Abs => unary(func, UnaryOp::Abs, args, row, offset, emitter),
        FuncCode::Exp => unary(func, UnaryOp::Exp, args, row, offset, emitter),
        FuncCode::Log => unary(func, UnaryOp::Ln, args, row, offset, emitter),
        FuncCode::Cos => unary(func, UnaryOp::Cos, args, row, offset, emitter),
        FuncCode::Sin => unary(func, UnaryOp::Sin, args, row, offset, emitter),
        FuncCode::Tan => unary(func, UnaryOp::Tan, args, row, offset, emitter),

        FuncCode::Log10 | FuncCode::Sllog10 | FuncCode::Sqlog10 => {
            scaled_log(func, std::f64::consts::LN_10, args, row, offset, emitter)
        }
        FuncCode::Log2 => scaled_log(func, std::f64::consts::LN_2, args, row, offset, emitter),

        FuncCode::Slrec | FuncCode::Sqrec => reciprocal(func, args, row, offset, emitter),

        FuncCode::Power | FuncCode::Rpower | FuncCode::Cvpower | FuncCode::Vcpower => {
            power(func, args, row, offset, emitter)
        }
        FuncCode::Signpower => signpower(func, code, args, row, offset, emitter),

        FuncCode::Pi => {
            let [] = exactly::<_, 0>(func, args, row, offset)?;
            let node = emitter.create_constant(std::f64::consts::PI);
            Ok(Slot::constant(node, std::f64::consts::PI))
        }

        FuncCode::Poly => poly(func, args, row, offset, emitter),

        other => Err(DecodeError::UnsupportedFunction {
            row,
            offset,
            code,
            name: Some(other.into()),
        }),
    }
}

/// Whether a literal exponent can take the integer-power path.
///
/// The backend raises through `powi`, so the value must survive an `i32`
/// round-trip; anything larger stays on the general path.
fn is_integral(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() <= i32::MAX as f64
}

fn wrong_operands(func: FuncCode, got: usize, row: RowRef, offset: usize) -> DecodeError {
    DecodeError::MalformedBytecode {
        row,
        offset,
        detail: format!("{func} called with {got} operands"),
    }
}

fn exactly<R, const N: usize>(
    func: FuncCode,
    args: Vec<Slot<R>>,
    row: RowRef,
    offset: usize,
) -> DecodeResult<[Slot<R>; N]> {
    let got = args.len();
    <[Slot<R>; N]>::try_from(args).map_err(|_| wrong_operands(func, got, row, offset))
}

fn unary<E: TreeEmitter>(
    func: FuncCode,
    op: UnaryOp,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let [x] = exactly(func, args, row, offset)?;
    Ok(Slot::new(emitter.create_unary(op, x.node)))
}

fn nary<E: TreeEmitter>(
    func: FuncCode,
    op: NaryOp,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    if args.len() < 2 {
        return Err(wrong_operands(func, args.len(), row, offset));
    }
    let children = args.into_iter().map(|slot| slot.node).collect();
    Ok(Slot::new(emitter.create_nary(op, children)))
}

/// `ln(x) * (1/ln base)`, the shared lowering for the base-10 and base-2
/// logarithms. Backends rarely carry dedicated log10/log2 primitives.
fn scaled_log<E: TreeEmitter>(
    func: FuncCode,
    base_ln: f64,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let [x] = exactly(func, args, row, offset)?;
    let ln = emitter.create_unary(UnaryOp::Ln, x.node);
    let scale = emitter.create_constant(1.0 / base_ln);
    Ok(Slot::new(emitter.create_binary(BinaryOp::Mul, ln, scale)))
}

/// `1/x` as an explicit division, not a power with exponent -1; the two
/// evaluate differently at the edges and backends expect the division path.
fn reciprocal<E: TreeEmitter>(
    func: FuncCode,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let [x] = exactly(func, args, row, offset)?;
    let one = emitter.create_constant(1.0);
    Ok(Slot::new(emitter.create_binary(BinaryOp::Div, one, x.node)))
}

/// Integer power when `value` is integral, real power otherwise. `exponent`
/// is the already-emitted node holding `value`.
fn fixed_power<E: TreeEmitter>(
    emitter: &mut E,
    base: E::NodeRef,
    exponent: E::NodeRef,
    value: f64,
) -> E::NodeRef {
    let op = if is_integral(value) {
        BinaryOp::IntPower
    } else {
        BinaryOp::RealPower
    };
    emitter.create_binary(op, base, exponent)
}

/// The four power call sites share one rule: specialize on a literal
/// exponent, then on a positive literal base (ln folded at decode time),
/// and fall back to `exp(ln(base) * exponent)`.
fn power<E: TreeEmitter>(
    func: FuncCode,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let [base, exponent] = exactly(func, args, row, offset)?;
    if let Some(c) = exponent.literal {
        return Ok(Slot::new(fixed_power(emitter, base.node, exponent.node, c)));
    }
    if let Some(b) = base.literal {
        if b > 0.0 {
            let ln_b = emitter.create_constant(b.ln());
            let scaled = emitter.create_binary(BinaryOp::Mul, exponent.node, ln_b);
            return Ok(Slot::new(emitter.create_unary(UnaryOp::Exp, scaled)));
        }
    }
    let ln = emitter.create_unary(UnaryOp::Ln, base.node);
    let scaled = emitter.create_binary(BinaryOp::Mul, ln, exponent.node);
    Ok(Slot::new(emitter.create_unary(UnaryOp::Exp, scaled)))
}

/// `sign(x) * |x|^c` for literal `c`, lowered to `x * |x|^(c-1)`. A
/// non-literal exponent has no closed tree form and stays unsupported.
fn signpower<E: TreeEmitter>(
    func: FuncCode,
    code: u32,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let [x, exponent] = exactly(func, args, row, offset)?;
    let Some(c) = exponent.literal else {
        return Err(DecodeError::UnsupportedFunction {
            row,
            offset,
            code,
            name: Some(func.into()),
        });
    };
    let abs = emitter.create_unary(UnaryOp::Abs, x.node.clone());
    let shifted = emitter.create_constant(c - 1.0);
    let raised = fixed_power(emitter, abs, shifted, c - 1.0);
    Ok(Slot::new(emitter.create_binary(BinaryOp::Mul, x.node, raised)))
}

/// Univariate polynomial: operand 0 is the variable, the rest are
/// coefficients from the constant term upward.
fn poly<E: TreeEmitter>(
    func: FuncCode,
    args: Vec<Slot<E::NodeRef>>,
    row: RowRef,
    offset: usize,
    emitter: &mut E,
) -> DecodeResult<Slot<E::NodeRef>> {
    let mut operands = args.into_iter();
    let Some(x) = operands.next() else {
        return Err(wrong_operands(func, 0, row, offset));
    };
    let mut coeffs: Vec<_> = operands.collect();

    match coeffs.len() {
        0 => {
            let node = emitter.create_constant(0.0);
            Ok(Slot::constant(node, 0.0))
        }
        1 => Ok(coeffs.remove(0)),
        _ => {
            let mut terms = Vec::with_capacity(coeffs.len());
            for (power, coeff) in coeffs.into_iter().enumerate() {
                let term = match power {
                    0 => coeff.node,
                    1 => emitter.create_binary(BinaryOp::Mul, coeff.node, x.node.clone()),
                    2 => {
                        let square = emitter.create_unary(UnaryOp::Square, x.node.clone());
                        emitter.create_binary(BinaryOp::Mul, coeff.node, square)
                    }
                    _ => {
                        let exponent = emitter.create_constant(power as f64);
                        let raised =
                            emitter.create_binary(BinaryOp::IntPower, x.node.clone(), exponent);
                        emitter.create_binary(BinaryOp::Mul, coeff.node, raised)
                    }
                };
                terms.push(term);
            }
            Ok(Slot::new(emitter.create_nary(NaryOp::Sum, terms)))
        }
    }
}
