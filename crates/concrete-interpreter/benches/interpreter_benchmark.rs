//! Benchmarks for the concrete interpreter
//!
//! Run with: cargo bench -p concrete-interpreter

use concrete_interpreter::{ConcreteEnv, Interpreter};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wlang_syntax::{parse_aexp, parse_program};

fn bench_expression_eval(c: &mut Criterion) {
    let interp = Interpreter::default();
    let exp = parse_aexp("(x + 1) * (y - 2) / 3 + x * x").unwrap();
    let env: ConcreteEnv = [("x".to_string(), 17), ("y".to_string(), -4)]
        .into_iter()
        .collect();

    c.bench_function("eval_aexp", |bencher| {
        bencher.iter(|| interp.eval_aexp(black_box(&exp), black_box(&env)))
    });
}

fn bench_counting_loop(c: &mut Criterion) {
    let interp = Interpreter::default();
    let mut group = c.benchmark_group("counting_loop");

    for bound in [10, 1_000, 100_000] {
        let prg = parse_program(&format!(
            "i := 0; s := 0; while i < {} do {{ s := s + i; i := i + 1 }}",
            bound
        ))
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(bound), &prg, |bencher, prg| {
            bencher.iter(|| interp.execute(black_box(prg), ConcreteEnv::new()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_expression_eval, bench_counting_loop);
criterion_main!(benches);
