use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use unbeam_core::{render, rewrite, Term};

/// A deeply nested arithmetic tree: `((1 + 2) * (1 + 2)) * ...`
fn arithmetic_tree(depth: usize) -> Term {
    let mut tree = Term::call("+", vec![Term::Int(1), Term::Int(2)]);
    for _ in 0..depth {
        tree = Term::call("*", vec![tree.clone(), tree]);
    }
    tree
}

/// A chain of `:erlang` primitive calls the rewrite pass has to undo.
fn lowered_call(width: usize) -> Term {
    let mut args = Vec::with_capacity(width);
    for index in 0..width {
        args.push(Term::remote_call(
            "erlang",
            "element",
            vec![Term::Int(index as i64 + 1), Term::var("tuple")],
        ));
    }
    Term::call("{}", args)
}

/// The symbolic `&&` case shape at a given nesting depth.
fn nested_and_case(depth: usize) -> Term {
    let falsy_guard = Term::remote_call(
        "erlang",
        "orelse",
        vec![
            Term::remote_call("erlang", "=:=", vec![Term::var("x"), Term::atom("false")]),
            Term::remote_call("erlang", "=:=", vec![Term::var("x"), Term::atom("nil")]),
        ],
    );
    let falsy_clause = Term::call(
        "->",
        vec![
            Term::List(vec![Term::call("when", vec![Term::var("x"), falsy_guard])]),
            Term::var("x"),
        ],
    );

    let mut tree = Term::var("a");
    for _ in 0..depth {
        let default_clause = Term::call(
            "->",
            vec![Term::List(vec![Term::var("_")]), tree.clone()],
        );
        tree = Term::call(
            "case",
            vec![
                Term::var("a"),
                Term::List(vec![Term::Pair(
                    Box::new(Term::atom("do")),
                    Box::new(Term::List(vec![falsy_clause.clone(), default_clause])),
                )]),
            ],
        );
    }
    tree
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for depth in [4, 8, 12] {
        let tree = arithmetic_tree(depth);
        group.bench_with_input(BenchmarkId::new("arithmetic", depth), &tree, |b, tree| {
            b.iter(|| render(black_box(tree)))
        });
    }

    group.finish();
}

fn bench_deinline(c: &mut Criterion) {
    let mut group = c.benchmark_group("rewrite");

    for width in [8, 64, 256] {
        let tree = lowered_call(width);
        group.bench_with_input(
            BenchmarkId::new("rewrite_guard", width),
            &tree,
            |b, tree| b.iter(|| rewrite::rewrite_guard(black_box(tree))),
        );
    }

    for depth in [1, 4, 16] {
        let tree = nested_and_case(depth);
        group.bench_with_input(
            BenchmarkId::new("deinline_through_render", depth),
            &tree,
            |b, tree| b.iter(|| render(black_box(tree))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_deinline);
criterion_main!(benches);
