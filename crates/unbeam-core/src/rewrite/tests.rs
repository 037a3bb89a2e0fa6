use pretty_assertions::assert_eq;

use super::*;

fn erlang_call(function: &str, args: Vec<Term>) -> Term {
    Term::remote_call("erlang", function, args)
}

fn case_expr(argument: Term, clauses: Vec<Term>) -> Term {
    Term::call(
        "case",
        vec![
            argument,
            Term::List(vec![Term::Pair(
                Box::new(Term::atom("do")),
                Box::new(Term::List(clauses)),
            )]),
        ],
    )
}

fn clause(patterns: Vec<Term>, output: Term) -> Term {
    Term::call("->", vec![Term::List(patterns), output])
}

/// `var when var === false or var === nil -> output`
fn falsy_clause(variable: &str, output: Term) -> Term {
    let pattern = Term::var(variable);
    let guard = erlang_call(
        "orelse",
        vec![
            erlang_call("=:=", vec![pattern.clone(), Term::atom("false")]),
            erlang_call("=:=", vec![pattern.clone(), Term::atom("nil")]),
        ],
    );

    clause(vec![Term::call("when", vec![pattern, guard])], output)
}

fn default_clause(output: Term) -> Term {
    clause(vec![Term::var("_")], output)
}

#[test]
fn atom_to_binary_becomes_atom_to_string() {
    let lowered = erlang_call("atom_to_binary", vec![Term::var("x"), Term::atom("utf8")]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::remote_call(
            "Elixir.Atom",
            "to_string",
            vec![Term::var("x")]
        ))
    );
}

#[test]
fn atom_to_binary_declines_on_other_encodings() {
    let latin1 = erlang_call("atom_to_binary", vec![Term::var("x"), Term::atom("latin1")]);
    assert_eq!(deinline(&latin1), None);

    let unary = erlang_call("atom_to_binary", vec![Term::var("x")]);
    assert_eq!(deinline(&unary), None);
}

#[test]
fn element_folds_a_literal_index() {
    let lowered = erlang_call("element", vec![Term::Int(2), Term::var("t")]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("elem", vec![Term::var("t"), Term::Int(1)]))
    );
}

#[test]
fn element_cancels_a_plus_one_index() {
    let index = erlang_call("+", vec![Term::var("i"), Term::Int(1)]);
    let lowered = erlang_call("element", vec![index, Term::var("t")]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("elem", vec![Term::var("t"), Term::var("i")]))
    );
}

#[test]
fn element_synthesizes_a_minus_one_term() {
    let lowered = erlang_call("element", vec![Term::var("i"), Term::var("t")]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::call(
            "elem",
            vec![
                Term::var("t"),
                Term::call("-", vec![Term::var("i"), Term::Int(1)])
            ]
        ))
    );
}

#[test]
fn element_declines_on_wrong_arity() {
    let lowered = erlang_call("element", vec![Term::Int(1)]);
    assert_eq!(deinline(&lowered), None);
}

#[test]
fn error_exception_becomes_raise() {
    let exception = Term::remote_call(
        "Elixir.ArgumentError",
        "exception",
        vec![Term::Binary(b"bad".to_vec())],
    );
    let lowered = erlang_call("error", vec![exception]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::call(
            "raise",
            vec![Term::atom("Elixir.ArgumentError"), Term::Binary(b"bad".to_vec())]
        ))
    );
}

#[test]
fn group_leader_swaps_its_arguments() {
    let lowered = erlang_call("group_leader", vec![Term::var("leader"), Term::var("pid")]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::remote_call(
            "Elixir.Process",
            "group_leader",
            vec![Term::var("pid"), Term::var("leader")]
        ))
    );
}

#[test]
fn send_after_moves_time_last() {
    let lowered = erlang_call(
        "send_after",
        vec![Term::Int(500), Term::var("dest"), Term::var("msg")],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::remote_call(
            "Elixir.Process",
            "send_after",
            vec![Term::var("dest"), Term::var("msg"), Term::Int(500)]
        ))
    );
}

#[test]
fn setelement_becomes_put_elem() {
    let lowered = erlang_call(
        "setelement",
        vec![Term::var("i"), Term::var("t"), Term::var("v")],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call(
            "put_elem",
            vec![
                Term::var("t"),
                Term::call("-", vec![Term::var("i"), Term::Int(1)]),
                Term::var("v")
            ]
        ))
    );
}

#[test]
fn erlang_name_table_renames_operators() {
    let lowered = erlang_call("=<", vec![Term::var("a"), Term::var("b")]);
    assert_eq!(
        deinline(&lowered),
        Some(Term::call("<=", vec![Term::var("a"), Term::var("b")]))
    );

    let lowered = erlang_call("=:=", vec![Term::var("a"), Term::var("b")]);
    assert_eq!(
        deinline(&lowered),
        Some(Term::call("===", vec![Term::var("a"), Term::var("b")]))
    );
}

#[test]
fn erlang_name_table_requalifies_modules() {
    let lowered = erlang_call("band", vec![Term::var("a"), Term::var("b")]);
    assert_eq!(
        deinline(&lowered),
        Some(Term::remote_call(
            "Elixir.Bitwise",
            "band",
            vec![Term::var("a"), Term::var("b")]
        ))
    );

    let lowered = erlang_call("node", vec![]);
    assert_eq!(
        deinline(&lowered),
        Some(Term::remote_call("Elixir.Node", "self", vec![]))
    );
}

#[test]
fn erlang_name_table_is_arity_strict() {
    // is_atom/2 does not exist
    let lowered = erlang_call("is_atom", vec![Term::var("a"), Term::var("b")]);
    assert_eq!(deinline(&lowered), None);
}

#[test]
fn maps_is_key_swaps_its_arguments() {
    let lowered = Term::remote_call("maps", "is_key", vec![Term::var("k"), Term::var("m")]);

    assert_eq!(
        deinline(&lowered),
        Some(Term::remote_call(
            "Elixir.Map",
            "has_key?",
            vec![Term::var("m"), Term::var("k")]
        ))
    );
}

#[test]
fn symbolic_and_case() {
    let lowered = case_expr(
        Term::var("a"),
        vec![
            falsy_clause("x", Term::var("x")),
            default_clause(Term::var("b")),
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("&&", vec![Term::var("a"), Term::var("b")]))
    );
}

#[test]
fn symbolic_and_requires_the_falsy_clause_to_return_its_pattern() {
    let lowered = case_expr(
        Term::var("a"),
        vec![
            falsy_clause("x", Term::var("other")),
            default_clause(Term::var("b")),
        ],
    );

    // still recognized, but as an if/else rather than &&
    assert_eq!(
        deinline(&lowered),
        Some(Term::call(
            "if",
            vec![
                Term::var("a"),
                Term::List(vec![
                    Term::Pair(Box::new(Term::atom("do")), Box::new(Term::var("b"))),
                    Term::Pair(Box::new(Term::atom("else")), Box::new(Term::var("other"))),
                ])
            ]
        ))
    );
}

#[test]
fn symbolic_or_case() {
    let lowered = case_expr(
        Term::var("a"),
        vec![
            falsy_clause("x", Term::var("b")),
            clause(vec![Term::var("y")], Term::var("y")),
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("||", vec![Term::var("a"), Term::var("b")]))
    );
}

#[test]
fn symbolic_or_takes_its_right_operand_from_the_falsy_body() {
    // the pass-through clause only certifies the shape; its variable must
    // never leak into the reconstructed operator
    let lowered = case_expr(
        Term::var("a"),
        vec![
            falsy_clause("x", Term::call("fallback", vec![])),
            clause(vec![Term::var("y")], Term::var("y")),
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call(
            "||",
            vec![Term::var("a"), Term::call("fallback", vec![])]
        ))
    );
}

#[test]
fn word_and_case_with_bad_bool_clause() {
    let bad_bool = clause(
        vec![Term::var("other")],
        erlang_call(
            "error",
            vec![Term::Tuple(vec![
                Term::atom("badbool"),
                Term::atom("and"),
                Term::var("other"),
            ])],
        ),
    );
    let lowered = case_expr(
        Term::var("a"),
        vec![
            clause(vec![Term::atom("false")], Term::atom("false")),
            clause(vec![Term::atom("true")], Term::var("b")),
            bad_bool,
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("and", vec![Term::var("a"), Term::var("b")]))
    );
}

#[test]
fn word_or_case() {
    let lowered = case_expr(
        Term::var("a"),
        vec![
            clause(vec![Term::atom("false")], Term::var("b")),
            clause(vec![Term::atom("true")], Term::atom("true")),
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("or", vec![Term::var("a"), Term::var("b")]))
    );
}

#[test]
fn boolean_outcomes_collapse_to_negation() {
    let lowered = case_expr(
        Term::var("a"),
        vec![
            falsy_clause("x", Term::atom("true")),
            default_clause(Term::atom("false")),
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call("!", vec![Term::var("a")]))
    );
}

#[test]
fn negation_shape_wins_over_match_question() {
    // The negation/if shape also fits the match? recognizer (a one-pattern
    // clause returning true plus a catch-all returning false), so the order
    // of the case rules decides. The falsy-guard shape must not come out as
    // match?.
    let lowered = case_expr(
        Term::var("a"),
        vec![
            falsy_clause("x", Term::atom("true")),
            default_clause(Term::atom("false")),
        ],
    );

    let rewritten = deinline(&lowered).unwrap();
    assert!(rewritten.tagged_args("match?", 2).is_none());
}

#[test]
fn match_question_case() {
    let pattern = Term::Pair(Box::new(Term::atom("ok")), Box::new(Term::var("x")));
    let lowered = case_expr(
        Term::var("value"),
        vec![
            clause(vec![pattern.clone()], Term::atom("true")),
            default_clause(Term::atom("false")),
        ],
    );

    assert_eq!(
        deinline(&lowered),
        Some(Term::call(
            "match?",
            vec![pattern, Term::var("value")]
        ))
    );
}

#[test]
fn unrecognized_case_is_left_alone() {
    let lowered = case_expr(
        Term::var("a"),
        vec![
            clause(vec![Term::atom("small")], Term::Int(1)),
            clause(vec![Term::atom("large")], Term::Int(2)),
        ],
    );

    assert_eq!(deinline(&lowered), None);
}

#[test]
fn rewrites_are_idempotent() {
    // a matcher's own output never matches again
    let idiomatic = [
        Term::call("&&", vec![Term::var("a"), Term::var("b")]),
        Term::call("elem", vec![Term::var("t"), Term::Int(0)]),
        Term::call("!", vec![Term::var("a")]),
        Term::remote_call("Elixir.Atom", "to_string", vec![Term::var("x")]),
        Term::call("match?", vec![Term::atom("ok"), Term::var("v")]),
    ];

    for term in idiomatic {
        assert_eq!(deinline(&term), None, "matched its own output: {term:?}");
    }
}

#[test]
fn guard_rewriting_reaches_nested_primitives() {
    let guard = erlang_call(
        "andalso",
        vec![
            erlang_call("is_tuple", vec![Term::var("t")]),
            erlang_call(
                "==",
                vec![
                    erlang_call("element", vec![Term::Int(1), Term::var("t")]),
                    Term::atom("ok"),
                ],
            ),
        ],
    );

    let rewritten = rewrite_guard(&guard).unwrap();

    assert_eq!(
        rewritten,
        Term::call(
            "and",
            vec![
                Term::call("is_tuple", vec![Term::var("t")]),
                Term::call(
                    "==",
                    vec![
                        Term::call("elem", vec![Term::var("t"), Term::Int(0)]),
                        Term::atom("ok"),
                    ]
                ),
            ]
        )
    );
}

#[test]
fn guard_rewriting_covers_conversions() {
    let guard = erlang_call("atom_to_binary", vec![Term::var("x"), Term::atom("utf8")]);

    assert_eq!(
        rewrite_guard(&guard).unwrap(),
        Term::remote_call("Elixir.Atom", "to_string", vec![Term::var("x")])
    );
}

#[test]
fn guard_rewriting_leaves_unknown_calls_untouched() {
    let guard = erlang_call("unknown_bif", vec![Term::var("x")]);

    assert_eq!(rewrite_guard(&guard).unwrap(), guard);
}
