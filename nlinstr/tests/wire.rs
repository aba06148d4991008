use nlinstr::instr::{Instruction, RowRef};
use nlinstr::opcode::{Opcode, OpcodeSet};
use nlinstr::word::{OPCODE_SHIFT, decode_stream, decode_word, encode_stream, encode_word};

#[test]
fn modern_stream_roundtrip() {
    let instrs = vec![
        Instruction::new(Opcode::Header, 5),
        Instruction::new(Opcode::PushV, 0),
        Instruction::new(Opcode::PushI, 2),
        Instruction::plain(Opcode::Mul),
        Instruction::new(Opcode::Store, 0),
    ];
    let words = encode_stream(&instrs, OpcodeSet::Modern).expect("stream should encode");
    let back = decode_stream(&words, OpcodeSet::Modern, RowRef::Objective).unwrap();
    assert_eq!(back, instrs);
}

#[test]
fn legacy_stream_roundtrip_includes_legacy_only_opcodes() {
    let instrs = vec![
        Instruction::new(Opcode::PushL, 3),
        Instruction::new(Opcode::AddL, 1),
        Instruction::new(Opcode::PopL, 3),
    ];
    let words = encode_stream(&instrs, OpcodeSet::Legacy).expect("stream should encode");
    let back = decode_stream(&words, OpcodeSet::Legacy, RowRef::Objective).unwrap();
    assert_eq!(back, instrs);

    // The same opcodes have no representation in the modern numbering.
    assert!(encode_stream(&instrs, OpcodeSet::Modern).is_none());
    assert_eq!(Opcode::PushL.raw(OpcodeSet::Modern), None);
}

#[test]
fn same_raw_value_means_different_opcodes_per_set() {
    for (raw, legacy, modern) in [
        (19u8, Opcode::DivL, Opcode::AddO),
        (23, Opcode::Swap, Opcode::CallArg1),
        (26, Opcode::PopDeriv, Opcode::FuncArgN),
    ] {
        let word = (raw as u32) << OPCODE_SHIFT;
        let l = decode_word(word, OpcodeSet::Legacy, RowRef::Objective, 0).unwrap();
        let m = decode_word(word, OpcodeSet::Modern, RowRef::Objective, 0).unwrap();
        assert_eq!(l.opcode, legacy, "legacy raw {raw}");
        assert_eq!(m.opcode, modern, "modern raw {raw}");
    }

    // The tail of the legacy numbering is out of range for the modern set.
    let word = 44u32 << OPCODE_SHIFT;
    let l = decode_word(word, OpcodeSet::Legacy, RowRef::Objective, 0).unwrap();
    assert_eq!(l.opcode, Opcode::PushZero);
    let err = decode_word(word, OpcodeSet::Modern, RowRef::Objective, 0).unwrap_err();
    assert!(err.is_unsupported_opcode());
}

#[test]
fn stream_errors_carry_the_word_index() {
    let good = encode_word(Instruction::new(Opcode::PushV, 0), OpcodeSet::Modern).unwrap();
    let bad = 62u32 << OPCODE_SHIFT;
    let err = decode_stream(&[good, good, bad], OpcodeSet::Modern, RowRef::Equation(9)).unwrap_err();
    assert!(err.is_unsupported_opcode());
    assert_eq!(err.offset(), 2);
    assert_eq!(err.row(), RowRef::Equation(9));
}

#[test]
fn one_based_wire_addresses() {
    // Wire field 1 is decoded address 0; field 0 is "no address".
    let word = encode_word(Instruction::new(Opcode::PushV, 0), OpcodeSet::Modern).unwrap();
    assert_eq!(word & 0x03FF_FFFF, 1);
    let none = encode_word(Instruction::plain(Opcode::Add), OpcodeSet::Modern).unwrap();
    assert_eq!(none & 0x03FF_FFFF, 0);
}
