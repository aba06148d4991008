use criterion::{Criterion, black_box, criterion_group, criterion_main};

use nlinstr::instr::{Instruction, RowRef};
use nlinstr::normalize::normalize;
use nlinstr::opcode::{Opcode, OpcodeSet};
use nlinstr::word::encode_stream;
use nltree::arena::ArenaExpr;
use nltree::build::RowDecoder;
use nltree::emit::IdentityMap;
use nltree::eval::EvalTree;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use typed_arena::Arena;

const VARIABLES: i64 = 8;
const POOL_SIZE: i64 = 16;

fn pool_values() -> Vec<f64> {
    (0..POOL_SIZE).map(|i| 0.5 + i as f64 * 0.5).collect()
}

/// Emit one random subexpression in postfix order. With `reorder` set, some
/// binary operations push their operands the wrong way round and fix it up
/// with a swap or a duplicate-and-discard pair, the way GAMS streams do.
fn next_expr(budget: usize, reorder: bool, rng: &mut impl Rng, out: &mut Vec<Instruction>) {
    if budget == 0 || rng.random_bool(0.25) {
        if rng.random_bool(0.5) {
            out.push(Instruction::new(Opcode::PushV, rng.random_range(0..VARIABLES)));
        } else {
            out.push(Instruction::new(Opcode::PushI, rng.random_range(0..POOL_SIZE)));
        }
        return;
    }

    match rng.random_range(0..=6) {
        0 | 1 => {
            next_expr(budget - 1, reorder, rng, out);
            next_expr(budget - 1, reorder, rng, out);
            let op = if rng.random_bool(0.5) {
                Opcode::Add
            } else {
                Opcode::Mul
            };
            if reorder && rng.random_bool(0.5) {
                if rng.random_bool(0.5) {
                    out.push(Instruction::plain(Opcode::Swap));
                    out.push(Instruction::plain(op));
                } else {
                    out.push(Instruction::new(Opcode::PushS, 1));
                    out.push(Instruction::plain(op));
                    out.push(Instruction::new(Opcode::Popup, 0));
                }
            } else {
                out.push(Instruction::plain(op));
            }
        }
        2 => {
            next_expr(budget - 1, reorder, rng, out);
            out.push(Instruction::new(Opcode::AddI, rng.random_range(0..POOL_SIZE)));
        }
        3 => {
            next_expr(budget - 1, reorder, rng, out);
            out.push(Instruction::new(Opcode::MulV, rng.random_range(0..VARIABLES)));
        }
        4 => {
            next_expr(budget - 1, reorder, rng, out);
            out.push(Instruction::plain(Opcode::UMin));
        }
        5 => {
            // sqr
            next_expr(budget - 1, reorder, rng, out);
            out.push(Instruction::new(Opcode::CallArg1, 8));
        }
        6 => {
            // power with a literal exponent from the pool
            next_expr(budget - 1, reorder, rng, out);
            out.push(Instruction::new(Opcode::PushI, rng.random_range(0..POOL_SIZE)));
            out.push(Instruction::new(Opcode::CallArg2, 21));
        }
        _ => unreachable!(),
    }
}

fn random_row(seed: u64, budget: usize, reorder: bool) -> Vec<Instruction> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut out = vec![Instruction::plain(Opcode::Header)];
    next_expr(budget, reorder, &mut rng, &mut out);
    out.push(Instruction::new(Opcode::Store, 0));
    out.push(Instruction::plain(Opcode::End));
    out
}

fn bench_normalize(c: &mut Criterion) {
    let clean = random_row(0x42, 10, false);
    let reordered = random_row(0x42, 10, true);

    c.bench_function("normalize_clean", |b| {
        b.iter(|| {
            let mut buf = clean.clone();
            normalize(&mut buf, RowRef::Objective).unwrap();
            black_box(buf);
        })
    });

    c.bench_function("normalize_reordered", |b| {
        b.iter(|| {
            let mut buf = reordered.clone();
            normalize(&mut buf, RowRef::Objective).unwrap();
            black_box(buf);
        })
    });
}

fn bench_build_backends(c: &mut Criterion) {
    let clean = random_row(0x42, 10, false);
    let pool = pool_values();

    c.bench_function("build_eval_tree", |b| {
        b.iter(|| {
            let mut dec = RowDecoder::new(&pool, IdentityMap, EvalTree::new(), RowRef::Objective);
            black_box(dec.build(&clean).unwrap());
        })
    });

    c.bench_function("build_arena", |b| {
        b.iter(|| {
            let arena = Arena::new();
            let mut dec =
                RowDecoder::new(&pool, IdentityMap, ArenaExpr::new(&arena), RowRef::Objective);
            black_box(dec.build(&clean).unwrap());
        })
    });
}

fn bench_wire_pipeline(c: &mut Criterion) {
    let reordered = random_row(0x42, 10, true);
    let words = encode_stream(&reordered, OpcodeSet::Modern).expect("row should encode");
    let pool = pool_values();

    c.bench_function("decode_words_reordered", |b| {
        b.iter(|| {
            let mut dec = RowDecoder::new(&pool, IdentityMap, EvalTree::new(), RowRef::Objective);
            black_box(dec.decode_words(&words, OpcodeSet::Modern).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_normalize,
    bench_build_backends,
    bench_wire_pipeline,
);
criterion_main!(benches);
