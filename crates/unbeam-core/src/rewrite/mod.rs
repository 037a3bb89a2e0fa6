//! Lowering-reversal rule set
//!
//! Quoted forms taken from compiled-artifact debug info have been lowered
//! through Erlang core rewriting: primitive calls stand in for standard
//! library functions, and short-circuit sugar (`&&`, `||`, `and`, `or`,
//! `if`, `!`, `match?`) appears as synthetic `case` expressions.
//!
//! Each rule here is an independent partial recognizer: it either matches a
//! lowered shape structurally and produces the idiomatic replacement, or
//! declines. Mismatched arity, wrong atom values, and unexpected nesting all
//! decline rather than error; an unrecognized shape simply falls through to
//! literal rendering. Rules are tried in a fixed order because some shapes
//! overlap (a rewritten `if` clause also resembles a `match?` clause before
//! the boolean branches are checked), so the relative order is load-bearing.

use tracing::trace;

use crate::term::{
    traverse::{prewalk, TraverseError},
    Args, Node, Term,
};

type Rule = fn(&Term) -> Option<Term>;

/// Primitive-call rules, in priority order. These also run inside guards.
const CALL_RULES: &[(&str, Rule)] = &[
    ("atom_to_binary", rewrite_atom_to_binary),
    ("binary_to_atom", rewrite_binary_to_atom),
    ("element", rewrite_element),
    ("error", rewrite_error),
    ("group_leader", rewrite_group_leader),
    ("integer_to_binary", rewrite_integer_to_binary),
    ("monitor", rewrite_monitor),
    ("send_after", rewrite_send_after),
    ("setelement", rewrite_setelement),
    ("erlang", rewrite_erlang),
    ("maps_is_key", rewrite_maps_is_key),
    ("maps_merge", rewrite_maps_merge),
];

/// Synthetic-`case` rules, in priority order.
const CASE_RULES: &[(&str, Rule)] = &[
    ("symbolic_and", rewrite_symbolic_and),
    ("symbolic_or", rewrite_symbolic_or),
    ("word_and", rewrite_word_and),
    ("word_or", rewrite_word_or),
    ("if", rewrite_if),
    ("match_question", rewrite_match_question),
];

/// Try every lowering-reversal rule against `term`, first match wins.
///
/// Returns `None` when no rule recognizes the shape; the caller renders the
/// node as-is.
pub fn deinline(term: &Term) -> Option<Term> {
    for rules in [CALL_RULES, CASE_RULES] {
        for (name, rule) in rules {
            if let Some(rewritten) = rule(term) {
                trace!(rule = name, "lowered shape rewritten");
                return Some(rewritten);
            }
        }
    }

    None
}

/// Rewrite primitive calls inside a guard expression to their standard
/// library equivalents, via a pre-order walk.
///
/// Only the primitive-call rules apply here; the synthetic-`case` shapes
/// cannot occur inside guards.
pub fn rewrite_guard(guard: &Term) -> Result<Term, TraverseError> {
    prewalk(guard.clone(), &mut |term| {
        for (name, rule) in CALL_RULES {
            if let Some(rewritten) = rule(&term) {
                trace!(rule = name, "guard primitive rewritten");
                return rewritten;
            }
        }
        term
    })
}

// ---------------------------------------------------------------------------
// shape accessors

/// `Module.function(args)` with atom module and function names.
fn as_remote_call(term: &Term) -> Option<(&str, &str, &[Term])> {
    let node = match term {
        Term::Node(node) => node,
        _ => return None,
    };
    let args = match &node.args {
        Args::List(args) => args,
        _ => return None,
    };
    let dot = node.head.tagged_args(".", 2)?;

    Some((dot[0].atom_name()?, dot[1].atom_name()?, args))
}

fn as_erlang_call<'a>(term: &'a Term, function: &str, arity: usize) -> Option<&'a [Term]> {
    match as_remote_call(term) {
        Some(("erlang", name, args)) if name == function && args.len() == arity => Some(args),
        _ => None,
    }
}

/// `case argument do clauses end` in its quoted shape: the second argument
/// is a one-element keyword list `[do: clauses]`.
fn as_case(term: &Term) -> Option<(&Term, &[Term])> {
    let args = term.tagged_args("case", 2)?;
    let block_items = match &args[1] {
        Term::List(items) if items.len() == 1 => items,
        _ => return None,
    };
    let (key, clauses) = match &block_items[0] {
        Term::Pair(key, clauses) => (key, clauses),
        _ => return None,
    };
    if key.atom_name() != Some("do") {
        return None;
    }
    match clauses.as_ref() {
        Term::List(clauses) => Some((&args[0], clauses)),
        _ => None,
    }
}

/// A `->` clause as its input patterns and output expression.
fn as_clause(term: &Term) -> Option<(&Term, &Term)> {
    let args = term.tagged_args("->", 2)?;
    Some((&args[0], &args[1]))
}

/// A clause of the shape `x when x === false or x === nil -> output`,
/// returning the pattern variable and the output.
fn as_falsy_clause(term: &Term) -> Option<(&Term, &Term)> {
    let (input, output) = as_clause(term)?;
    let patterns = match input {
        Term::List(patterns) if patterns.len() == 1 => patterns,
        _ => return None,
    };
    let pattern_guard = patterns[0].tagged_args("when", 2)?;
    let pattern = &pattern_guard[0];

    if pattern.is_expression() && is_falsy_guard(&pattern_guard[1], pattern) {
        Some((pattern, output))
    } else {
        None
    }
}

fn is_falsy_guard(guard: &Term, pattern: &Term) -> bool {
    match as_erlang_call(guard, "orelse", 2) {
        Some(args) => {
            is_exact_equality(&args[0], pattern, "false") && is_exact_equality(&args[1], pattern, "nil")
        }
        None => false,
    }
}

fn is_exact_equality(term: &Term, left: &Term, right_atom: &str) -> bool {
    match as_erlang_call(term, "=:=", 2) {
        Some(args) => &args[0] == left && args[1].atom_name() == Some(right_atom),
        None => false,
    }
}

/// A catch-all `_ -> output` clause's output.
fn as_default_clause_output(term: &Term) -> Option<&Term> {
    let (input, output) = as_clause(term)?;
    match input {
        Term::List(patterns) if patterns.len() == 1 && patterns[0].tagged_node("_").is_some() => {
            Some(output)
        }
        _ => None,
    }
}

fn single_pattern(input: &Term) -> Option<&Term> {
    match input {
        Term::List(patterns) if patterns.len() == 1 => Some(&patterns[0]),
        _ => None,
    }
}

fn binary_op(name: &str, left: Term, right: Term) -> Term {
    Term::call(name, vec![left, right])
}

fn dot(module: &str, function: &str) -> Term {
    Term::call(".", vec![Term::atom(module), Term::atom(function)])
}

fn node_with_head(head: Term, args: Vec<Term>) -> Term {
    Term::Node(Box::new(Node::new(head, Vec::new(), Args::List(args))))
}

// ---------------------------------------------------------------------------
// primitive-call rules

fn rewrite_atom_to_binary(term: &Term) -> Option<Term> {
    let args = as_erlang_call(term, "atom_to_binary", 2)?;
    if args[1].atom_name() != Some("utf8") {
        return None;
    }

    Some(Term::remote_call(
        "Elixir.Atom",
        "to_string",
        vec![args[0].clone()],
    ))
}

fn rewrite_binary_to_atom(term: &Term) -> Option<Term> {
    let args = as_erlang_call(term, "binary_to_atom", 2)?;
    if args[1].atom_name() != Some("utf8") {
        return None;
    }

    Some(Term::remote_call(
        "Elixir.String",
        "to_atom",
        vec![args[0].clone()],
    ))
}

/// `:erlang.element/2` uses 1-based indices; `elem/2` is 0-based. A literal
/// index folds, an already-present `+ 1` term cancels, anything else gets an
/// explicit `- 1`.
fn rewrite_element(term: &Term) -> Option<Term> {
    let args = as_erlang_call(term, "element", 2)?;
    let (index, tuple) = (&args[0], &args[1]);

    let adjusted = if let Term::Int(value) = index {
        Term::Int(value - 1)
    } else if let Some(plus_args) = as_erlang_call(index, "+", 2) {
        if plus_args[1] == Term::Int(1) {
            plus_args[0].clone()
        } else {
            binary_op("-", index.clone(), Term::Int(1))
        }
    } else {
        binary_op("-", index.clone(), Term::Int(1))
    };

    Some(Term::call("elem", vec![tuple.clone(), adjusted]))
}

/// `:erlang.error(Mod.exception(arg))` is how `raise/2` lowers.
fn rewrite_error(term: &Term) -> Option<Term> {
    let args = as_erlang_call(term, "error", 1)?;
    let (module, function, exception_args) = as_remote_call(&args[0])?;

    if function == "exception" && exception_args.len() == 1 {
        Some(Term::call(
            "raise",
            vec![Term::atom(module), exception_args[0].clone()],
        ))
    } else {
        None
    }
}

/// The two-argument form swaps `(leader, pid)` to Elixir's `(pid, leader)`.
fn rewrite_group_leader(term: &Term) -> Option<Term> {
    let ("erlang", "group_leader", args) = as_remote_call(term)? else {
        return None;
    };

    let reordered = match args {
        [] => Vec::new(),
        [leader, pid] => vec![pid.clone(), leader.clone()],
        _ => return None,
    };

    Some(Term::remote_call("Elixir.Process", "group_leader", reordered))
}

fn rewrite_integer_to_binary(term: &Term) -> Option<Term> {
    let ("erlang", "integer_to_binary", args) = as_remote_call(term)? else {
        return None;
    };

    match args.len() {
        1 | 2 => Some(Term::remote_call(
            "Elixir.Integer",
            "to_string",
            args.to_vec(),
        )),
        _ => None,
    }
}

fn rewrite_monitor(term: &Term) -> Option<Term> {
    let args = as_erlang_call(term, "monitor", 2)?;
    if args[0].atom_name() != Some("process") {
        return None;
    }

    Some(Term::remote_call(
        "Elixir.Process",
        "monitor",
        vec![args[1].clone()],
    ))
}

/// `:erlang.send_after(time, dest, msg[, opts])` puts the time first;
/// `Process.send_after/3,4` puts it third.
fn rewrite_send_after(term: &Term) -> Option<Term> {
    let ("erlang", "send_after", args) = as_remote_call(term)? else {
        return None;
    };

    let reordered = match args {
        [time, destination, message] => vec![destination.clone(), message.clone(), time.clone()],
        [time, destination, message, opts] => vec![
            destination.clone(),
            message.clone(),
            time.clone(),
            opts.clone(),
        ],
        _ => return None,
    };

    Some(Term::remote_call("Elixir.Process", "send_after", reordered))
}

fn rewrite_setelement(term: &Term) -> Option<Term> {
    let args = as_erlang_call(term, "setelement", 3)?;
    let (index, tuple, value) = (&args[0], &args[1], &args[2]);

    Some(Term::call(
        "put_elem",
        vec![
            tuple.clone(),
            binary_op("-", index.clone(), Term::Int(1)),
            value.clone(),
        ],
    ))
}

/// The 1:1 `:erlang` name table: primitives whose Elixir equivalent keeps
/// the argument order, so only the call head changes.
fn rewrite_erlang(term: &Term) -> Option<Term> {
    let (module, function, args) = as_remote_call(term)?;
    let head = module_function_rewrite(module, function, args.len())?;

    Some(node_with_head(head, args.to_vec()))
}

pub(crate) fn module_function_rewrite(module: &str, function: &str, arity: usize) -> Option<Term> {
    if module != "erlang" {
        return None;
    }

    match (function, arity) {
        ("self", 0) => Some(Term::atom("self")),
        (
            "byte_size" | "is_atom" | "is_binary" | "is_integer" | "is_list" | "is_pid"
            | "is_map" | "is_tuple" | "length" | "map_size" | "node" | "not",
            1,
        ) => Some(Term::atom(function)),
        (
            "*" | "/" | "+" | "++" | "-" | "--" | "<" | "==" | ">=" | ">" | "div" | "min"
            | "rem" | "send",
            2,
        ) => Some(Term::atom(function)),
        ("process_flag", 2 | 3) => Some(dot("Elixir.Process", "flag")),
        ("apply", 2 | 3) => Some(Term::atom("apply")),
        ("binary_part", 3) => Some(Term::atom("binary_part")),
        ("fun_info", 1 | 2) => Some(dot("Elixir.Function", "info")),
        ("=<", 2) => Some(Term::atom("<=")),
        ("/=", 2) => Some(Term::atom("!=")),
        ("=:=", 2) => Some(Term::atom("===")),
        ("=/=", 2) => Some(Term::atom("!==")),
        ("andalso", 2) => Some(Term::atom("and")),
        ("orelse", 2) => Some(Term::atom("or")),
        ("atom_to_list", 1) => Some(dot("Elixir.Atom", "to_charlist")),
        ("demonitor", 2) => Some(dot("Elixir.Process", "demonitor")),
        ("node", 0) => Some(dot("Elixir.Node", "self")),
        ("band" | "bor" | "bnot" | "bsl" | "bsr" | "bxor", 2) => {
            Some(dot("Elixir.Bitwise", function))
        }
        _ => None,
    }
}

/// Argument order is swapped in Elixir compared to Erlang.
fn rewrite_maps_is_key(term: &Term) -> Option<Term> {
    match as_remote_call(term)? {
        ("maps", "is_key", [key, map]) => Some(Term::remote_call(
            "Elixir.Map",
            "has_key?",
            vec![map.clone(), key.clone()],
        )),
        _ => None,
    }
}

fn rewrite_maps_merge(term: &Term) -> Option<Term> {
    match as_remote_call(term)? {
        ("maps", "merge", [left, right]) => Some(Term::remote_call(
            "Elixir.Map",
            "merge",
            vec![left.clone(), right.clone()],
        )),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// synthetic-case rules

/// `a && b` lowers to a case whose falsy clause returns its own pattern and
/// whose default clause returns the second operand.
fn rewrite_symbolic_and(term: &Term) -> Option<Term> {
    let (argument, clauses) = as_case(term)?;
    if clauses.len() != 2 {
        return None;
    }

    let (pattern, output) = as_falsy_clause(&clauses[0])?;
    if pattern != output {
        return None;
    }
    let secondary = as_default_clause_output(&clauses[1])?;

    Some(binary_op("&&", argument.clone(), secondary.clone()))
}

/// `a || b` lowers to a case whose falsy clause returns the second operand
/// and whose other clause passes its pattern through unchanged.
fn rewrite_symbolic_or(term: &Term) -> Option<Term> {
    let (argument, clauses) = as_case(term)?;
    if clauses.len() != 2 {
        return None;
    }

    let (_, falsy_output) = as_falsy_clause(&clauses[0])?;
    let (pass_input, pass_output) = as_clause(&clauses[1])?;
    let pattern = single_pattern(pass_input)?;
    if pattern != pass_output {
        return None;
    }

    Some(binary_op("||", argument.clone(), falsy_output.clone()))
}

/// `a and b` lowers to explicit boolean-pattern clauses, optionally plus a
/// third `:badbool` error clause.
fn rewrite_word_and(term: &Term) -> Option<Term> {
    let (argument, clauses) = as_case(term)?;
    if !(2..=3).contains(&clauses.len()) {
        return None;
    }

    let (false_input, false_output) = as_clause(&clauses[0])?;
    if single_pattern(false_input)?.atom_name() != Some("false")
        || false_output.atom_name() != Some("false")
    {
        return None;
    }

    let (true_input, true_output) = as_clause(&clauses[1])?;
    if single_pattern(true_input)?.atom_name() != Some("true") {
        return None;
    }

    if clauses.len() == 3 && !is_bad_bool_clause(&clauses[2]) {
        return None;
    }

    Some(binary_op("and", argument.clone(), true_output.clone()))
}

fn is_bad_bool_clause(term: &Term) -> bool {
    let Some((input, output)) = as_clause(term) else {
        return false;
    };
    let Some(variable) = single_pattern(input) else {
        return false;
    };

    variable.is_variable() && is_error_bad_bool(output, variable)
}

fn is_error_bad_bool(term: &Term, variable: &Term) -> bool {
    let Some(args) = as_erlang_call(term, "error", 1) else {
        return false;
    };
    match &args[0] {
        Term::Tuple(elements) if elements.len() == 3 => {
            elements[0].atom_name() == Some("badbool")
                && elements[1].atom_name() == Some("and")
                && &elements[2] == variable
        }
        _ => false,
    }
}

/// `a or b` keeps the guard literal in the false clause's output.
fn rewrite_word_or(term: &Term) -> Option<Term> {
    let (argument, clauses) = as_case(term)?;
    if clauses.len() != 2 {
        return None;
    }

    let (false_input, false_output) = as_clause(&clauses[0])?;
    if single_pattern(false_input)?.atom_name() != Some("false") {
        return None;
    }

    let (true_input, true_output) = as_clause(&clauses[1])?;
    if single_pattern(true_input)?.atom_name() != Some("true")
        || true_output.atom_name() != Some("true")
    {
        return None;
    }

    Some(binary_op("or", argument.clone(), false_output.clone()))
}

/// A falsy/default case is `!a` when both outcomes are boolean constants;
/// otherwise it is an `if`/`else`. The default clause's body is the `do`
/// branch and the falsy clause's body is the `else` branch, matching how the
/// compiler lowers `if`.
fn rewrite_if(term: &Term) -> Option<Term> {
    let (condition, clauses) = as_case(term)?;
    if clauses.len() != 2 {
        return None;
    }

    let (_, falsy_output) = as_falsy_clause(&clauses[0])?;
    let default_output = as_default_clause_output(&clauses[1])?;

    if falsy_output.atom_name() == Some("true") && default_output.atom_name() == Some("false") {
        return Some(Term::call("!", vec![condition.clone()]));
    }

    Some(Term::call(
        "if",
        vec![
            condition.clone(),
            Term::List(vec![
                Term::Pair(Box::new(Term::atom("do")), Box::new(default_output.clone())),
                Term::Pair(Box::new(Term::atom("else")), Box::new(falsy_output.clone())),
            ]),
        ],
    ))
}

/// `match?(pattern, value)` lowers to a case whose first clause returns
/// `true` under the pattern and whose catch-all returns `false`.
fn rewrite_match_question(term: &Term) -> Option<Term> {
    let (argument, clauses) = as_case(term)?;
    if clauses.len() != 2 {
        return None;
    }

    let (true_input, true_output) = as_clause(&clauses[0])?;
    let pattern = single_pattern(true_input)?;
    if true_output.atom_name() != Some("true") {
        return None;
    }
    if as_default_clause_output(&clauses[1])?.atom_name() != Some("false") {
        return None;
    }

    Some(Term::call(
        "match?",
        vec![pattern.clone(), argument.clone()],
    ))
}

#[cfg(test)]
mod tests;
