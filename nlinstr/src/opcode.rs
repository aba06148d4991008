//! Opcode enumerations and the classification table.
//!
//! Two raw numberings exist in the wild: an older, larger one that still
//! carries the local-variable cache and gradient opcodes, and the modern,
//! smaller one. [`Opcode`] is the semantic union of both; [`OpcodeSet`]
//! selects which numbering is active for a decode call. Raw values map to
//! semantic opcodes through per-set tables, so the same mnemonic can sit at
//! different raw positions in the two sets.

use strum::{Display, EnumIs, EnumIter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which raw opcode numbering is active for a decode call.
///
/// This is a per-call configuration value. Upstream model containers declare
/// their format generation; nothing here is process-wide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OpcodeSet {
    /// The older numbering (60 opcodes, includes the local-cache family).
    Legacy,
    /// The current numbering (37 opcodes).
    Modern,
}

impl OpcodeSet {
    /// Parse a set name as written in model headers ("legacy" / "modern").
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "legacy" => Some(OpcodeSet::Legacy),
            "modern" => Some(OpcodeSet::Modern),
            _ => None,
        }
    }

    /// Inverse of [`OpcodeSet::from_str`].
    pub fn to_str(&self) -> &'static str {
        match self {
            OpcodeSet::Legacy => "legacy",
            OpcodeSet::Modern => "modern",
        }
    }
}

/// Semantic opcode: the union of both historical enumerations, plus the
/// [`Opcode::Skip`] placeholder the normalizer writes over eliminated
/// stack-reordering instructions.
///
/// `Skip` deliberately has no raw value in either set, so it can never be
/// confused with legitimate opcode 0 (`NoOp`) on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    /// Does nothing.
    NoOp,
    /// Push the variable named by the address.
    PushV,
    /// Push a constant from the pool.
    PushI,
    /// Pop the finished row value.
    Store,
    /// Pop two, push their sum.
    Add,
    /// Add a variable to the top of the stack.
    AddV,
    /// Add a pool constant to the top of the stack.
    AddI,
    /// Add a cached local to the top of the stack (legacy).
    AddL,
    /// Pop two, push first minus second (in push order).
    Sub,
    /// Subtract a variable from the top of the stack.
    SubV,
    /// Subtract a pool constant from the top of the stack.
    SubI,
    /// Subtract a cached local from the top of the stack (legacy).
    SubL,
    /// Pop two, push their product.
    Mul,
    /// Multiply the top of the stack by a variable.
    MulV,
    /// Multiply the top of the stack by a pool constant.
    MulI,
    /// Multiply the top of the stack by a cached local (legacy).
    MulL,
    /// Pop two, push first divided by second (in push order).
    Div,
    /// Divide the top of the stack by a variable.
    DivV,
    /// Divide the top of the stack by a pool constant.
    DivI,
    /// Divide the top of the stack by a cached local (legacy).
    DivL,
    /// Negate the top of the stack.
    UMin,
    /// Push the negated value of a variable.
    UMinV,
    /// Push the negated value of a cached local (legacy).
    UMinL,
    /// Exchange the top two operand groups.
    Swap,
    /// Duplicate the value produced `address` groups below the top.
    PushS,
    /// Pop down, discarding `address + 1` slots below the top.
    Popup,
    /// Push a cached local (legacy).
    PushL,
    /// Pop the top into a local cache slot (legacy).
    PopL,
    /// Pop a derivative value (gradient era).
    PopDeriv,
    /// Pop a scaled derivative value (gradient era).
    PopDerivS,
    /// Row header word; carries no stack effect here.
    Header,
    /// Pop the finished row value, applying the row scale.
    StoreS,
    /// Equation scale factor marker.
    EquScale,
    /// End of the instruction stream.
    End,
    /// Consistency check marker.
    Chk,
    /// Fold the top into the objective accumulator (objective rows).
    AddO,
    /// Push the objective variable (objective rows).
    PushO,
    /// Multiply-accumulate and pop, single slot (gradient era).
    MulPop1,
    /// Multiply-accumulate and pop, two slots (gradient era).
    MulPop2,
    /// Multiply-accumulate and pop, displacement form (gradient era).
    MulPop,
    /// Add-accumulate and pop (gradient era).
    AddPop,
    /// Subtract-accumulate and pop (gradient era).
    SubPop,
    /// Divide-accumulate and pop (gradient era).
    DivPop,
    /// Pop `x`, then pop `y`, push `y + c * x` with `c` from the pool.
    MulIAdd,
    /// Push the constant `0.0` without consulting the pool.
    PushZero,
    /// Push a cached constant (legacy).
    GetConst,
    /// Multiply a cached constant, single form (legacy).
    MulConst1,
    /// Multiply a cached constant, double form (legacy).
    MulConst2,
    /// Multiply a cached constant, displacement form (legacy).
    MulConst,
    /// Negate a local cache slot in place (legacy).
    NegLocal,
    /// Push a local cache slot (legacy).
    GetLocal,
    /// Pop the top into a local cache slot (legacy).
    SetLocal,
    /// Push a gradient entry (gradient era).
    GetGrad,
    /// Push a gradient constant (gradient era).
    PushIGrad,
    /// Call a one-argument function; the address carries the function code.
    CallArg1,
    /// Call a two-argument function; the address carries the function code.
    CallArg2,
    /// Call an n-ary function; the count comes from the preceding `FuncArgN`.
    CallArgN,
    /// Declare the argument count for the next `CallArgN`.
    FuncArgN,
    /// External function invocation.
    Invoc,
    /// External stack input marker.
    StackIn,
    /// Placeholder written by the normalizer. Never appears on the wire.
    Skip,
}

/// How many operand slots an opcode consumes from the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Arity {
    /// Consumes nothing.
    Nullary,
    /// Consumes the top slot.
    Unary,
    /// Consumes the top two slots.
    Binary,
    /// Consumes a count determined elsewhere (argument count, displacement).
    Nary,
}

impl Arity {
    /// The fixed pop count, or `None` for [`Arity::Nary`].
    pub fn fixed_pops(self) -> Option<usize> {
        match self {
            Arity::Nullary => Some(0),
            Arity::Unary => Some(1),
            Arity::Binary => Some(2),
            Arity::Nary => None,
        }
    }
}

/// How an instruction's decoded address field is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AddressKind {
    /// Address carries no meaning for this opcode.
    None,
    /// 0-based variable index, to be passed through the translator.
    Variable,
    /// 0-based index into the constant pool.
    Constant,
    /// Function code minus one (re-increment before matching the table).
    FunctionCode,
    /// Argument count for the next n-ary call.
    ArgCount,
    /// Stack-depth displacement for the reordering opcodes.
    StackDisplacement,
}

/// Structural classification of one opcode: what it pops, how its address is
/// read, and whether it leaves a result slot on the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OpMeta {
    /// Operand slots consumed.
    pub arity: Arity,
    /// Interpretation of the address field.
    pub address: AddressKind,
    /// Whether a result slot is pushed.
    pub pushes: bool,
}

impl OpMeta {
    const fn new(arity: Arity, address: AddressKind, pushes: bool) -> Self {
        OpMeta {
            arity,
            address,
            pushes,
        }
    }
}

/// Expands one raw-numbering table into the two lookup directions. Keeping a
/// single mirrored list per set is what guarantees the directions agree.
macro_rules! opcode_numbering {
    ($from_raw:ident, $to_raw:ident; $($raw:literal <=> $variant:ident),+ $(,)?) => {
        fn $from_raw(raw: u8) -> Option<Opcode> {
            match raw {
                $($raw => Some(Opcode::$variant),)+
                _ => None,
            }
        }

        fn $to_raw(op: Opcode) -> Option<u8> {
            match op {
                $(Opcode::$variant => Some($raw),)+
                _ => None,
            }
        }
    };
}

opcode_numbering!(legacy_from_raw, legacy_to_raw;
    0 <=> NoOp,
    1 <=> PushV,
    2 <=> PushI,
    3 <=> Store,
    4 <=> Add,
    5 <=> AddV,
    6 <=> AddI,
    7 <=> AddL,
    8 <=> Sub,
    9 <=> SubV,
    10 <=> SubI,
    11 <=> SubL,
    12 <=> Mul,
    13 <=> MulV,
    14 <=> MulI,
    15 <=> MulL,
    16 <=> Div,
    17 <=> DivV,
    18 <=> DivI,
    19 <=> DivL,
    20 <=> UMin,
    21 <=> UMinV,
    22 <=> UMinL,
    23 <=> Swap,
    24 <=> PushL,
    25 <=> PopL,
    26 <=> PopDeriv,
    27 <=> Header,
    28 <=> Popup,
    29 <=> EquScale,
    30 <=> End,
    31 <=> StoreS,
    32 <=> PopDerivS,
    33 <=> PushS,
    34 <=> Chk,
    35 <=> AddO,
    36 <=> PushO,
    37 <=> MulPop1,
    38 <=> MulPop2,
    39 <=> MulPop,
    40 <=> AddPop,
    41 <=> SubPop,
    42 <=> DivPop,
    43 <=> MulIAdd,
    44 <=> PushZero,
    45 <=> GetConst,
    46 <=> MulConst1,
    47 <=> MulConst2,
    48 <=> MulConst,
    49 <=> NegLocal,
    50 <=> GetLocal,
    51 <=> SetLocal,
    52 <=> GetGrad,
    53 <=> PushIGrad,
    54 <=> CallArg1,
    55 <=> CallArg2,
    56 <=> CallArgN,
    57 <=> FuncArgN,
    58 <=> Invoc,
    59 <=> StackIn,
);

opcode_numbering!(modern_from_raw, modern_to_raw;
    0 <=> NoOp,
    1 <=> PushV,
    2 <=> PushI,
    3 <=> Store,
    4 <=> Add,
    5 <=> AddV,
    6 <=> AddI,
    7 <=> Sub,
    8 <=> SubV,
    9 <=> SubI,
    10 <=> Mul,
    11 <=> MulV,
    12 <=> MulI,
    13 <=> Div,
    14 <=> DivV,
    15 <=> DivI,
    16 <=> UMin,
    17 <=> UMinV,
    18 <=> Swap,
    19 <=> AddO,
    20 <=> PushO,
    21 <=> Invoc,
    22 <=> StackIn,
    23 <=> CallArg1,
    24 <=> CallArg2,
    25 <=> CallArgN,
    26 <=> FuncArgN,
    27 <=> MulIAdd,
    28 <=> PushZero,
    29 <=> Chk,
    30 <=> EquScale,
    31 <=> End,
    32 <=> Header,
    33 <=> PushS,
    34 <=> Popup,
    35 <=> StoreS,
    36 <=> PopDeriv,
);

impl Opcode {
    /// Look up the semantic opcode for a raw 6-bit value in the given set.
    ///
    /// Returns `None` for values outside the set; callers turn that into an
    /// unsupported-opcode error with the buffer offset attached. [`Opcode::Skip`]
    /// is never produced here.
    pub fn from_raw(raw: u8, set: OpcodeSet) -> Option<Opcode> {
        match set {
            OpcodeSet::Legacy => legacy_from_raw(raw),
            OpcodeSet::Modern => modern_from_raw(raw),
        }
    }

    /// The raw value of this opcode in the given set, if it has one there.
    pub fn raw(self, set: OpcodeSet) -> Option<u8> {
        match set {
            OpcodeSet::Legacy => legacy_to_raw(self),
            OpcodeSet::Modern => modern_to_raw(self),
        }
    }

    /// Structural classification. Exhaustive over every variant, so adding an
    /// opcode without classifying it fails to compile.
    pub fn meta(self) -> OpMeta {
        use AddressKind as K;
        use Arity::*;
        use Opcode::*;
        match self {
            NoOp | Header | End | Chk | Skip => OpMeta::new(Nullary, K::None, false),
            EquScale => OpMeta::new(Nullary, K::Constant, false),
            PushV => OpMeta::new(Nullary, K::Variable, true),
            PushI => OpMeta::new(Nullary, K::Constant, true),
            PushZero => OpMeta::new(Nullary, K::None, true),
            UMinV => OpMeta::new(Nullary, K::Variable, true),
            UMin => OpMeta::new(Unary, K::None, true),
            Store | StoreS => OpMeta::new(Unary, K::Variable, false),
            Add | Sub | Mul | Div => OpMeta::new(Binary, K::None, true),
            AddV | SubV | MulV | DivV => OpMeta::new(Unary, K::Variable, true),
            AddI | SubI | MulI | DivI => OpMeta::new(Unary, K::Constant, true),
            MulIAdd => OpMeta::new(Binary, K::Constant, true),
            Swap => OpMeta::new(Nullary, K::None, false),
            PushS => OpMeta::new(Nullary, K::StackDisplacement, true),
            Popup => OpMeta::new(Nary, K::StackDisplacement, false),
            CallArg1 => OpMeta::new(Unary, K::FunctionCode, true),
            CallArg2 => OpMeta::new(Binary, K::FunctionCode, true),
            CallArgN => OpMeta::new(Nary, K::FunctionCode, true),
            FuncArgN => OpMeta::new(Nullary, K::ArgCount, false),

            // Legacy local-cache family.
            AddL | SubL | MulL | DivL => OpMeta::new(Unary, K::Variable, true),
            UMinL | PushL | GetLocal => OpMeta::new(Nullary, K::Variable, true),
            PopL | SetLocal | NegLocal => OpMeta::new(Unary, K::Variable, false),
            GetConst | PushIGrad => OpMeta::new(Nullary, K::Constant, true),
            MulConst1 | MulConst2 => OpMeta::new(Unary, K::Constant, false),
            MulConst => OpMeta::new(Nary, K::Constant, false),

            // Gradient and objective eras.
            PopDeriv | PopDerivS => OpMeta::new(Unary, K::Variable, false),
            GetGrad => OpMeta::new(Nullary, K::Variable, true),
            MulPop1 | MulPop2 | AddPop | SubPop | DivPop => OpMeta::new(Unary, K::None, false),
            MulPop => OpMeta::new(Nary, K::StackDisplacement, false),
            AddO => OpMeta::new(Unary, K::Variable, true),
            PushO => OpMeta::new(Nullary, K::Variable, true),
            Invoc => OpMeta::new(Nary, K::FunctionCode, true),
            StackIn => OpMeta::new(Nullary, K::None, true),
        }
    }

    /// The three stack-reordering opcodes the normalizer eliminates.
    pub fn is_gymnastic(self) -> bool {
        matches!(self, Opcode::Swap | Opcode::PushS | Opcode::Popup)
    }

    /// Whether the decode pipeline can express this opcode at all.
    ///
    /// The legacy local-cache, gradient and objective families decode from
    /// the wire but have no expression-tree meaning here; both passes reject
    /// them with an unsupported-opcode error on first sight.
    pub fn is_decodable(self) -> bool {
        use Opcode::*;
        !matches!(
            self,
            AddL | SubL
                | MulL
                | DivL
                | UMinL
                | PushL
                | PopL
                | PopDeriv
                | PopDerivS
                | MulPop1
                | MulPop2
                | MulPop
                | AddPop
                | SubPop
                | DivPop
                | GetConst
                | MulConst1
                | MulConst2
                | MulConst
                | NegLocal
                | GetLocal
                | SetLocal
                | GetGrad
                | PushIGrad
                | AddO
                | PushO
                | Invoc
                | StackIn
        )
    }
}
