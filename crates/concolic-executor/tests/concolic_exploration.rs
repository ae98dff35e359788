//! Integration tests for the concolic executor

use concolic_executor::{explore, ConcolicExecutor, ConcolicState, ExecConfig, StateStatus};
use symbolic_engine::ConstraintBuilder;
use wlang_syntax::parse_program;
use z3::{Config, Context};

fn run<'ctx>(ctx: &'ctx Context, source: &str, config: ExecConfig) -> Vec<ConcolicState<'ctx>> {
    let program = parse_program(source).expect("test program should parse");
    let engine = ConcolicExecutor::new(ctx, config);
    engine
        .run(&program, engine.initial_state())
        .expect("exploration should not hit a fatal error")
}

/// The concrete witness is a projection of some model of the path condition
fn witness_is_consistent(st: ConcolicState<'_>) -> bool {
    let builder = ConstraintBuilder::new(st.symbolic.context());
    let pins: Vec<_> = st
        .symbolic
        .env()
        .iter()
        .filter_map(|(name, term)| st.concrete.get(name).map(|v| builder.build_pin(term, *v)))
        .collect();

    let (_, mut probe) = st.fork();
    probe.symbolic.add_pc(pins);
    !probe.symbolic.is_empty()
}

#[test]
fn test_assume_then_assert() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; assume x > 10; assert x > 15",
        ExecConfig::default(),
    );

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].status(), StateStatus::Valid);
    assert!(out[0].concrete["x"] > 15);

    assert_eq!(out[1].status(), StateStatus::Error);
    let x = out[1].concrete["x"];
    assert!((11..=15).contains(&x), "witness {} outside failing range", x);
}

#[test]
fn test_straight_line_program() {
    let ctx = Context::new(&Config::new());
    let out = run(&ctx, "x := 10; print_state", ExecConfig::default());

    assert_eq!(out.len(), 1);
    assert!(out[0].is_valid());
    assert_eq!(out[0].concrete["x"], 10);
    assert_eq!(out[0].symbolic.get("x").unwrap().to_string(), "10");
}

#[test]
fn test_nested_conditionals_keep_branch_order() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; if x > 0 then if x > 5 then a := 1 else b := 1 else c := 1",
        ExecConfig::default(),
    );

    assert_eq!(out.len(), 3);
    assert!(out[0].concrete.contains_key("a"));
    assert!(out[0].concrete["x"] > 5);
    assert!(out[1].concrete.contains_key("b"));
    assert!((1..=5).contains(&out[1].concrete["x"]));
    assert!(out[2].concrete.contains_key("c"));
    assert!(out[2].concrete["x"] <= 0);
}

#[test]
fn test_loop_unrolls_then_finishes_concretely() {
    let ctx = Context::new(&Config::new());
    let out = run(&ctx, "havoc x; while x < 20 do x := x + 1", ExecConfig::default());

    // exits at depths 0..=10, then the concrete fallback
    assert_eq!(out.len(), 12);
    assert!(out.iter().all(|s| s.is_valid()));
    assert!(out.iter().all(|s| s.concrete["x"] >= 20));
    assert_eq!(out[11].concrete["x"], 20);

    let out = run(
        &ctx,
        "havoc x; while x < 20 do x := x + 1",
        ExecConfig {
            unroll_bound: 2,
            ..ExecConfig::default()
        },
    );
    assert_eq!(out.len(), 4);
}

#[test]
fn test_loop_without_symbolic_inputs_runs_once() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "i := 0; s := 0; while i < 50 do { s := s + i; i := i + 1 }",
        ExecConfig::default(),
    );

    assert_eq!(out.len(), 1);
    assert!(out[0].is_valid());
    assert_eq!(out[0].concrete["i"], 50);
    assert_eq!(out[0].concrete["s"], 1225);
}

#[test]
fn test_counting_loop_postcondition_holds() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x, y;
         assume y >= 0;
         c := 0;
         r := x;
         while c < y do { r := r + 1; c := c + 1 };
         assert r = x + y",
        ExecConfig::default(),
    );

    assert_eq!(out.len(), 12);
    assert!(out.iter().all(|s| s.is_valid()));
    for st in &out {
        assert_eq!(st.concrete["r"], st.concrete["x"] + st.concrete["y"]);
    }
}

#[test]
fn test_assertion_failure_inside_concrete_fallback() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; while x < 5 do { x := x + 1; assert x < 3 }",
        ExecConfig {
            unroll_bound: 0,
            ..ExecConfig::default()
        },
    );

    assert_eq!(out.len(), 2);
    assert!(out[0].is_valid());
    assert_eq!(out[1].status(), StateStatus::Error);
    assert_eq!(out[1].concrete["x"], 3);
}

#[test]
fn test_assume_false_is_infeasible() {
    let ctx = Context::new(&Config::new());
    let out = run(&ctx, "havoc x; assume false", ExecConfig::default());

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].status(), StateStatus::Infeasible);
    assert!(!out[0].is_error());
}

#[test]
fn test_assume_moves_witness() {
    let ctx = Context::new(&Config::new());
    let out = run(&ctx, "havoc x; assume x = 42", ExecConfig::default());

    assert_eq!(out.len(), 1);
    assert!(out[0].is_valid());
    assert_eq!(out[0].concrete["x"], 42);
}

#[test]
fn test_assert_false_is_an_error() {
    let ctx = Context::new(&Config::new());
    let out = run(&ctx, "assert false", ExecConfig::default());

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].status(), StateStatus::Error);
}

#[test]
fn test_invalid_states_pass_through() {
    let ctx = Context::new(&Config::new());
    let out = run(&ctx, "havoc x; assert x > 0; x := 5", ExecConfig::default());

    assert_eq!(out.len(), 2);
    assert!(out[0].is_valid());
    assert_eq!(out[0].concrete["x"], 5);

    assert!(out[1].is_error());
    assert!(out[1].concrete["x"] <= 0);
}

#[test]
fn test_division_by_zero_agrees_with_concrete() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; y := 7 / x; if y = 0 then z := 1 else z := 2",
        ExecConfig::default(),
    );

    // x = 0 and |x| > 7 both give y = 0
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].concrete["z"], 1);
    assert_eq!(out[1].concrete["z"], 2);
    assert_ne!(out[1].concrete["x"], 0);
}

#[test]
fn test_witnesses_satisfy_path_conditions() {
    let programs = [
        "havoc x; assume x > 10; assert x > 15",
        "havoc x; if x > 0 then if x > 5 then a := 1 else b := 1 else c := 1",
        "havoc x; while x < 20 do { x := x + 1; if x < 4 then y := 1 }",
        "havoc x, y; if x * 2 = y + 1 then z := x - y else z := y / 3",
        "havoc a, b; while a < b do a := a + 2",
    ];

    for source in programs {
        let ctx = Context::new(&Config::new());
        for st in run(&ctx, source, ExecConfig::default()) {
            if st.is_valid() {
                assert!(witness_is_consistent(st), "inconsistent witness for `{}`", source);
            }
        }
    }
}

#[test]
fn test_exploration_is_deterministic() {
    let program = parse_program(
        "havoc x; while x < 20 do { x := x + 1; if x < 4 then y := 1 }",
    )
    .unwrap();
    let config = ExecConfig::default();

    let first = explore(&program, &config, false).unwrap();
    let second = explore(&program, &config, false).unwrap();
    assert_eq!(first.states.len(), second.states.len());
    let statuses = |r: &concolic_executor::ExplorationReport| {
        r.states.iter().map(|s| s.status).collect::<Vec<_>>()
    };
    assert_eq!(statuses(&first), statuses(&second));

    let pc_lengths = |r: &concolic_executor::ExplorationReport| {
        r.states.iter().map(|s| s.path_condition.len()).collect::<Vec<_>>()
    };
    assert_eq!(pc_lengths(&first), pc_lengths(&second));
}

#[test]
fn test_report_partition() {
    let program = parse_program("havoc x; assert x > 0; havoc y; assume false").unwrap();
    let report = explore(&program, &ExecConfig::default(), true).unwrap();

    assert_eq!(report.states.len(), 2);
    assert_eq!((report.valid, report.errors, report.infeasible), (0, 1, 1));

    let (valid, invalid) = report.partition();
    assert!(valid.is_empty());
    assert_eq!(invalid[0].status, StateStatus::Infeasible);
    assert_eq!(invalid[1].status, StateStatus::Error);
    assert!(invalid.iter().all(|s| s.smt2.is_some()));
}

#[test]
fn test_branch_results_partition() {
    let then_part = "if x > 5 then a := 1 else a := 2";
    let else_part = "while x < 3 do x := x + 1";
    let count = |source: String| {
        let ctx = Context::new(&Config::new());
        let n = run(&ctx, &source, ExecConfig::default()).len();
        n
    };

    let whole = count(format!(
        "havoc x; if x > 0 then {{ {} }} else {{ {} }}",
        then_part, else_part
    ));
    let then_only = count(format!("havoc x; assume x > 0; {}", then_part));
    let else_only = count(format!("havoc x; assume not (x > 0); {}", else_part));

    assert_eq!(whole, then_only + else_only);
}

#[test]
fn test_overflow_halts_only_its_path() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; if x > 4611686018427387904 then y := x + x else y := 1",
        ExecConfig::default(),
    );

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].status(), StateStatus::Error);
    assert!(out[0].concrete["x"] > 4611686018427387904);
    assert!(!out[0].concrete.contains_key("y"));

    assert!(out[1].is_valid());
    assert_eq!(out[1].concrete["y"], 1);
}

#[test]
fn test_branch_beyond_i64_is_infeasible() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; if x > 9223372036854775806 + 1 then y := 1 else y := 2",
        ExecConfig::default(),
    );

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].status(), StateStatus::Infeasible);
    assert!(out[1].is_valid());
    assert_eq!(out[1].concrete["y"], 2);
}

#[test]
fn test_fuel_exhaustion_keeps_other_states() {
    let ctx = Context::new(&Config::new());
    let out = run(
        &ctx,
        "havoc x; assert x < 0; while x < 0 do x := x - 1",
        ExecConfig {
            unroll_bound: 1,
            concrete_fuel: 100,
            ..ExecConfig::default()
        },
    );

    // the diverging loop path, then the failed assertion
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].status(), StateStatus::Error);
    assert!(out[0].concrete["x"] < 0);
    assert_eq!(out[1].status(), StateStatus::Error);
    assert!(out[1].concrete["x"] >= 0);
}
