//! Benchmarks comparing the two execution strategies
//!
//! TWO grammars are benchmarked:
//! 1. Arithmetic - nested expressions with actions
//! 2. CSV - flat records with text captures
//!
//! Interpreted: bytecode dispatch loop (optimize for size)
//! Inlined: unrolled per-rule routines (optimize for speed)
//!
//! Compilation itself is measured separately.
//!
//! Run with: cargo bench --bench backends

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pegc::prelude::*;

// ============================================================================
// Grammars
// ============================================================================

mod arith {
    use pegc::prelude::*;

    pub fn grammar() -> GrammarBuilder {
        GrammarBuilder::new()
            .rule(
                "expr",
                action(
                    seq(vec![
                        label("head", rule_ref("term")),
                        label("tail", star(seq(vec![choice(vec![lit("+"), lit("-")]), rule_ref("term")]))),
                    ]),
                    "fold",
                ),
            )
            .rule(
                "term",
                action(
                    seq(vec![
                        label("head", rule_ref("atom")),
                        label("tail", star(seq(vec![choice(vec![lit("*"), lit("/")]), rule_ref("atom")]))),
                    ]),
                    "fold",
                ),
            )
            .rule(
                "atom",
                choice(vec![
                    action(text(plus(class(vec![ClassPart::Range('0', '9')], false))), "int"),
                    action(seq(vec![lit("("), label("e", rule_ref("expr")), lit(")")]), "e"),
                ]),
            )
    }

    fn apply(op: &str, a: i64, b: i64) -> i64 {
        match op {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            _ if b != 0 => a / b,
            _ => 0,
        }
    }

    pub fn actions() -> ActionTable {
        ActionTable::new()
            .bind("int", |ctx, _| {
                ctx.text().parse::<i64>().map(Value::Int).map_err(|_| ActionError::Fail)
            })
            .bind("e", |_, args| Ok(args[0].clone()))
            .bind("fold", |_, args| {
                let mut acc = args[0].as_int().unwrap_or(0);
                for pair in args[1].as_array().unwrap_or(&[]) {
                    let op = pair.get_index(0).and_then(Value::as_str).unwrap_or("+");
                    let rhs = pair.get_index(1).and_then(Value::as_int).unwrap_or(0);
                    acc = apply(op, acc, rhs);
                }
                Ok(Value::Int(acc))
            })
    }

    pub fn input() -> String {
        let mut s = String::from("1");
        for i in 0..200 {
            s.push_str(&format!("+({}*{}-{})/3", i, i + 1, i % 7));
        }
        s
    }
}

mod csv {
    use pegc::prelude::*;

    pub fn grammar() -> GrammarBuilder {
        GrammarBuilder::new()
            .rule("file", range(0, None, rule_ref("record"), Some(lit("\n"))))
            .rule("record", range(1, None, rule_ref("field"), Some(lit(","))))
            .rule(
                "field",
                choice(vec![
                    seq(vec![lit("\""), text(star(class(vec![ClassPart::Char('"')], true))), lit("\"")]),
                    text(star(class(
                        vec![ClassPart::Char(','), ClassPart::Char('\n'), ClassPart::Char('"')],
                        true,
                    ))),
                ]),
            )
    }

    pub fn input() -> String {
        (0..300)
            .map(|i| format!("{},name{},\"quoted, {}\",{}", i, i, i * 3, i % 11))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn build(grammar: GrammarBuilder, optimize: Optimize) -> Parser {
    compile(grammar.build(), CompileOptions::default().with_optimize(optimize), None)
        .expect("benchmark grammar compiles")
        .parser
        .expect("parser output")
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_arith(c: &mut Criterion) {
    let mut g = c.benchmark_group("arith");
    let input = arith::input();
    let mut interpreted = build(arith::grammar(), Optimize::Size).with_actions(arith::actions());
    let mut inlined = build(arith::grammar(), Optimize::Speed).with_actions(arith::actions());

    g.bench_function("A_interpreted", |b| {
        b.iter(|| interpreted.parse(black_box(&input), ParseOptions::new()))
    });
    g.bench_function("B_inlined", |b| {
        b.iter(|| inlined.parse(black_box(&input), ParseOptions::new()))
    });
    g.finish();
}

fn bench_csv(c: &mut Criterion) {
    let mut g = c.benchmark_group("csv");
    let input = csv::input();
    let mut interpreted = build(csv::grammar(), Optimize::Size);
    let mut inlined = build(csv::grammar(), Optimize::Speed);

    g.bench_function("A_interpreted", |b| {
        b.iter(|| interpreted.parse(black_box(&input), ParseOptions::new()))
    });
    g.bench_function("B_inlined", |b| {
        b.iter(|| inlined.parse(black_box(&input), ParseOptions::new()))
    });
    g.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut g = c.benchmark_group("compile");
    g.bench_function("arith_parser", |b| {
        b.iter(|| compile(black_box(arith::grammar().build()), CompileOptions::default(), None))
    });
    g.bench_function("arith_source", |b| {
        b.iter(|| {
            compile(
                black_box(arith::grammar().build()),
                CompileOptions::default().with_output(OutputKind::Source),
                None,
            )
        })
    });
    g.finish();
}

criterion_group!(benches, bench_arith, bench_csv, bench_compile);
criterion_main!(benches);
