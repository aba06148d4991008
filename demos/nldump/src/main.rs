use clap::Parser;
use nlinstr::instr::{Instruction, RowRef};
use nlinstr::normalize::normalize;
use nlinstr::opcode::{Opcode, OpcodeSet};
use nlinstr::word::{decode_stream, encode_stream};
use nltree::build::RowDecoder;
use nltree::emit::IdentityMap;
use nltree::eval::EvalTree;

/// Encode a canned NL instruction row, then print every decode stage: the
/// wire words, the decoded listing, the normalized listing and the final
/// expression tree.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Sample row to decode (pass an unknown name to list them)
    #[arg(short, long, default_value = "affine")]
    sample: String,

    /// Opcode numbering for the wire encoding ("legacy" or "modern")
    #[arg(long, default_value = "modern")]
    set: String,

    /// Point to evaluate the decoded row at, comma separated
    #[arg(short = 'a', long, value_delimiter = ',', default_value = "2,5,1")]
    at: Vec<f64>,
}

struct Sample {
    name: &'static str,
    describe: &'static str,
    pool: Vec<f64>,
    instrs: Vec<Instruction>,
}

fn instr(opcode: Opcode, address: i64) -> Instruction {
    Instruction::new(opcode, address)
}

fn plain(opcode: Opcode) -> Instruction {
    Instruction::plain(opcode)
}

fn samples() -> Vec<Sample> {
    vec![
        Sample {
            name: "affine",
            describe: "x0 * 3 + x1, using the fused arithmetic opcodes",
            pool: vec![3.0],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::MulI, 0),
                instr(Opcode::AddV, 1),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "swap",
            describe: "x1 - x0, pushed the wrong way round and fixed with a swap",
            pool: vec![],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::PushV, 1),
                plain(Opcode::Swap),
                plain(Opcode::Sub),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "dup",
            describe: "(x1 + 2) * x0, re-surfacing x0 with a duplicate",
            pool: vec![2.0],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::PushV, 1),
                instr(Opcode::PushI, 0),
                plain(Opcode::Add),
                instr(Opcode::PushS, 1),
                plain(Opcode::Mul),
                instr(Opcode::Popup, 0),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "log10",
            describe: "log10(x0), lowered to a scaled natural logarithm",
            pool: vec![],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::CallArg1, 11),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "power",
            describe: "x0 ^ 2 with a literal exponent, taking the integer path",
            pool: vec![2.0],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::PushI, 0),
                instr(Opcode::CallArg2, 21),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "poly",
            describe: "1 + 2*x0 + 3*x0^2 through the polynomial call",
            pool: vec![1.0, 2.0, 3.0],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::PushI, 0),
                instr(Opcode::PushI, 1),
                instr(Opcode::PushI, 2),
                instr(Opcode::FuncArgN, 4),
                instr(Opcode::CallArgN, 94),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "pi",
            describe: "the zero-argument pi call",
            pool: vec![],
            instrs: vec![
                instr(Opcode::FuncArgN, 0),
                instr(Opcode::CallArgN, 46),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "signpower",
            describe: "signpower(x0, 3), lowered to x0 * |x0|^2",
            pool: vec![3.0],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::PushI, 0),
                instr(Opcode::CallArg2, 86),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
        Sample {
            name: "minmax",
            describe: "max(x0, x1, x2) through the n-ary call",
            pool: vec![],
            instrs: vec![
                instr(Opcode::PushV, 0),
                instr(Opcode::PushV, 1),
                instr(Opcode::PushV, 2),
                instr(Opcode::FuncArgN, 3),
                instr(Opcode::CallArgN, 7),
                instr(Opcode::Store, 0),
                plain(Opcode::End),
            ],
        },
    ]
}

fn print_listing(title: &str, words: Option<&[u32]>, instrs: &[Instruction]) {
    println!("{title}:");
    for (offset, decoded) in instrs.iter().enumerate() {
        match words {
            Some(words) => println!("  {offset:>4}  {:#010x}  {decoded}", words[offset]),
            None => println!("  {offset:>4}  {decoded}"),
        }
    }
    println!();
}

fn main() {
    let args = Args::parse();

    let Some(set) = OpcodeSet::from_str(&args.set) else {
        eprintln!("Unknown opcode set {:?}; use \"legacy\" or \"modern\".", args.set);
        std::process::exit(1);
    };

    let all = samples();
    let Some(sample) = all.iter().find(|s| s.name == args.sample) else {
        eprintln!("Unknown sample {:?}. Available samples:", args.sample);
        for s in &all {
            eprintln!("  {:<10} {}", s.name, s.describe);
        }
        std::process::exit(1);
    };

    println!("sample {:?}: {}", sample.name, sample.describe);
    println!("opcode set: {}, constant pool: {:?}\n", set.to_str(), sample.pool);

    let Some(words) = encode_stream(&sample.instrs, set) else {
        eprintln!("Sample does not encode in the {} numbering.", set.to_str());
        std::process::exit(1);
    };

    let decoded = match decode_stream(&words, set, RowRef::Objective) {
        Ok(decoded) => decoded,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };
    print_listing("wire listing", Some(&words), &decoded);

    let mut normalized = decoded.clone();
    if let Err(error) = normalize(&mut normalized, RowRef::Objective) {
        eprintln!("{error}");
        std::process::exit(1);
    }
    if normalized == decoded {
        println!("normalization: stream was already in postfix order\n");
    } else {
        print_listing("normalized listing", None, &normalized);
    }

    let mut decoder = RowDecoder::new(&sample.pool, IdentityMap, EvalTree::new(), RowRef::Objective);
    let root = match decoder.build(&normalized) {
        Ok(root) => root,
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    };

    let tree = decoder.into_emitter();
    println!("expression: {}", tree.render(root));
    println!("value at {:?}: {}", args.at, tree.value(root, &args.at));
}
