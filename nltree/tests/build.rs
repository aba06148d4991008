//! Builder scenarios over gymnastics-free streams.

use nlinstr::instr::{Instruction, RowRef};
use nlinstr::opcode::Opcode;
use nltree::build::RowDecoder;
use nltree::emit::{BinaryOp, FnMap, IdentityMap, TableMap};
use nltree::eval::{EvalNode, EvalTree};

fn instr(opcode: Opcode, address: i64) -> Instruction {
    Instruction::new(opcode, address)
}

fn plain(opcode: Opcode) -> Instruction {
    Instruction::plain(opcode)
}

fn objective(pool: &[f64]) -> RowDecoder<'_, IdentityMap, EvalTree> {
    RowDecoder::new(pool, IdentityMap, EvalTree::new(), RowRef::Objective)
}

#[test]
fn affine_row() {
    // (x0 * 3) + x1
    let instrs = [
        instr(Opcode::PushV, 0),
        instr(Opcode::MulI, 0),
        instr(Opcode::AddV, 1),
        instr(Opcode::Store, 0),
    ];
    let mut dec = objective(&[3.0]);
    let root = dec.build(&instrs).unwrap();

    assert_eq!(dec.emitter().render(root).to_string(), "((x0 * 3) + x1)");
    assert_eq!(dec.emitter().value(root, &[2.0, 5.0]), 11.0);
}

#[test]
fn operand_order_is_push_order() {
    let sub = [
        instr(Opcode::PushV, 0),
        instr(Opcode::PushV, 1),
        plain(Opcode::Sub),
    ];
    let mut dec = objective(&[]);
    let root = dec.build(&sub).unwrap();
    assert_eq!(dec.emitter().value(root, &[10.0, 4.0]), 6.0);

    let div = [
        instr(Opcode::PushV, 0),
        instr(Opcode::PushV, 1),
        plain(Opcode::Div),
    ];
    let mut dec = objective(&[]);
    let root = dec.build(&div).unwrap();
    assert_eq!(dec.emitter().value(root, &[1.0, 4.0]), 0.25);
}

#[test]
fn fused_arithmetic() {
    // (((x0 + 10) - x1) * x0) / 4
    let instrs = [
        instr(Opcode::PushV, 0),
        instr(Opcode::AddI, 0),
        instr(Opcode::SubV, 1),
        instr(Opcode::MulV, 0),
        instr(Opcode::DivI, 1),
    ];
    let mut dec = objective(&[10.0, 4.0]);
    let root = dec.build(&instrs).unwrap();

    assert_eq!(
        dec.emitter().render(root).to_string(),
        "((((x0 + 10) - x1) * x0) / 4)"
    );
    assert_eq!(dec.emitter().value(root, &[3.0, 5.0]), 6.0);
}

#[test]
fn muliadd_expands_to_scaled_accumulate() {
    // x0 + 2 * x1
    let instrs = [
        instr(Opcode::PushV, 0),
        instr(Opcode::PushV, 1),
        instr(Opcode::MulIAdd, 0),
    ];
    let mut dec = objective(&[2.0]);
    let root = dec.build(&instrs).unwrap();
    let tree = dec.into_emitter();

    assert_eq!(tree.value(root, &[1.0, 3.0]), 7.0);
    match tree.node(root) {
        EvalNode::Binary(BinaryOp::Add, left, right) => {
            assert_eq!(tree.node(*left), &EvalNode::Variable(0));
            match tree.node(*right) {
                EvalNode::Binary(BinaryOp::Mul, scale, x) => {
                    assert_eq!(tree.node(*scale), &EvalNode::Constant(2.0));
                    assert_eq!(tree.node(*x), &EvalNode::Variable(1));
                }
                other => panic!("unexpected scaled term {other:?}"),
            }
        }
        other => panic!("unexpected root {other:?}"),
    }
}

#[test]
fn negation_forms() {
    let umin = [instr(Opcode::PushV, 0), plain(Opcode::UMin)];
    let mut dec = objective(&[]);
    let root = dec.build(&umin).unwrap();
    assert_eq!(dec.emitter().value(root, &[4.0]), -4.0);

    let uminv = [instr(Opcode::UMinV, 1)];
    let mut dec = objective(&[]);
    let root = dec.build(&uminv).unwrap();
    assert_eq!(dec.emitter().value(root, &[0.0, 3.0]), -3.0);
    assert_eq!(dec.emitter().render(root).to_string(), "-x1");
}

#[test]
fn pushzero_is_a_pool_free_constant() {
    let instrs = [
        instr(Opcode::PushV, 0),
        plain(Opcode::PushZero),
        plain(Opcode::Add),
    ];
    // Empty pool on purpose: PushZero must not consult it.
    let mut dec = objective(&[]);
    let root = dec.build(&instrs).unwrap();
    assert_eq!(dec.emitter().value(root, &[2.5]), 2.5);
}

#[test]
fn bookkeeping_opcodes_have_no_tree_effect() {
    let instrs = [
        plain(Opcode::Header),
        plain(Opcode::NoOp),
        instr(Opcode::PushV, 0),
        plain(Opcode::Chk),
        instr(Opcode::PushI, 0),
        plain(Opcode::Add),
        instr(Opcode::EquScale, 0),
        instr(Opcode::StoreS, 0),
        plain(Opcode::End),
    ];
    let mut dec = objective(&[1.5]);
    let root = dec.build(&instrs).unwrap();
    assert_eq!(dec.emitter().value(root, &[2.0]), 3.5);
}

#[test]
fn nothing_after_end_is_interpreted() {
    let instrs = [
        instr(Opcode::PushV, 0),
        plain(Opcode::End),
        plain(Opcode::Swap),
    ];
    let mut dec = objective(&[]);
    let root = dec.build(&instrs).unwrap();
    assert_eq!(dec.emitter().value(root, &[9.0]), 9.0);
}

#[test]
fn empty_and_overfull_streams_are_malformed() {
    let mut dec = objective(&[]);
    let err = dec.build(&[]).unwrap_err();
    assert!(err.is_malformed_bytecode());
    assert!(err.to_string().contains("no root"));

    let instrs = [instr(Opcode::PushV, 0), instr(Opcode::PushV, 1)];
    let mut dec = objective(&[]);
    let err = dec.build(&instrs).unwrap_err();
    assert!(err.is_malformed_bytecode());
    assert_eq!(err.offset(), 2);
    assert!(err.to_string().contains("2 operands"));
}

#[test]
fn underflow_reports_offset_and_opcode() {
    let instrs = [instr(Opcode::PushV, 0), plain(Opcode::Add)];
    let mut dec = objective(&[]);
    match dec.build(&instrs).unwrap_err() {
        nlinstr::utils::DecodeError::StackUnderflow { offset, opcode, .. } => {
            assert_eq!(offset, 1);
            assert_eq!(opcode, Opcode::Add);
        }
        other => panic!("unexpected error {other}"),
    }

    let mut dec = objective(&[]);
    let err = dec.build(&[plain(Opcode::UMin)]).unwrap_err();
    assert!(err.is_stack_underflow());
    assert_eq!(err.offset(), 0);
}

#[test]
fn constant_references_are_checked() {
    let mut dec = objective(&[1.0]);
    let err = dec.build(&[instr(Opcode::PushI, 5)]).unwrap_err();
    assert!(err.to_string().contains("outside a pool of 1"));

    let mut dec = objective(&[1.0]);
    let err = dec.build(&[plain(Opcode::PushI)]).unwrap_err();
    assert!(err.to_string().contains("without an address"));

    let mut dec = objective(&[]);
    let err = dec.build(&[plain(Opcode::PushV)]).unwrap_err();
    assert!(err.to_string().contains("variable reference without an address"));
}

#[test]
fn legacy_families_are_unsupported() {
    for op in [Opcode::PushL, Opcode::GetGrad, Opcode::AddO, Opcode::MulPop] {
        let mut dec = objective(&[]);
        let err = dec.build(&[instr(op, 0)]).unwrap_err();
        assert!(err.is_unsupported_opcode(), "{op}");
        assert!(err.to_string().contains(&op.to_string()), "{op}");
    }
}

#[test]
fn gymnastics_must_not_reach_the_builder() {
    let instrs = [
        instr(Opcode::PushV, 0),
        instr(Opcode::PushV, 1),
        plain(Opcode::Swap),
        plain(Opcode::Mul),
    ];
    let mut dec = objective(&[]);
    let err = dec.build(&instrs).unwrap_err();
    assert!(err.is_malformed_bytecode());
    assert_eq!(err.offset(), 2);
    assert!(err.to_string().contains("not normalized"));
}

#[test]
fn nary_call_bookkeeping_errors() {
    // CallArgN with no preceding FuncArgN.
    let instrs = [instr(Opcode::PushV, 0), instr(Opcode::CallArgN, 6)];
    let mut dec = objective(&[]);
    let err = dec.build(&instrs).unwrap_err();
    assert!(err.to_string().contains("without a declared argument count"));

    // FuncArgN with an empty address field.
    let mut dec = objective(&[]);
    let err = dec.build(&[plain(Opcode::FuncArgN)]).unwrap_err();
    assert!(err.to_string().contains("argument count without an address"));
}

#[test]
fn table_translation_remaps_variables() {
    let instrs = [
        instr(Opcode::PushV, 1),
        instr(Opcode::AddV, 2),
    ];
    let mut dec = RowDecoder::new(&[], TableMap(&[4, 2, 0]), EvalTree::new(), RowRef::Objective);
    let root = dec.build(&instrs).unwrap();
    let tree = dec.into_emitter();

    match tree.node(root) {
        EvalNode::Binary(BinaryOp::Add, left, right) => {
            assert_eq!(tree.node(*left), &EvalNode::Variable(2));
            assert_eq!(tree.node(*right), &EvalNode::Variable(0));
        }
        other => panic!("unexpected root {other:?}"),
    }
    let point = [10.0, 20.0, 30.0, 40.0, 50.0];
    assert_eq!(tree.value(root, &point), 40.0);
}

#[test]
fn closure_translation_remaps_variables() {
    let instrs = [instr(Opcode::PushV, 3)];
    let mut dec = RowDecoder::new(&[], FnMap(|i| i + 10), EvalTree::new(), RowRef::Objective);
    let root = dec.build(&instrs).unwrap();
    assert_eq!(dec.emitter().node(root), &EvalNode::Variable(13));
}

#[test]
fn errors_carry_the_row() {
    let mut dec = RowDecoder::new(&[], IdentityMap, EvalTree::new(), RowRef::Equation(7));
    let err = dec.build(&[plain(Opcode::Add)]).unwrap_err();
    assert_eq!(err.row(), RowRef::Equation(7));
    assert!(err.to_string().contains("equation 7"));
    assert_eq!(dec.row(), RowRef::Equation(7));
}
