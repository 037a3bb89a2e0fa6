//! Precedence-aware quoted-form printer
//!
//! [`render`] turns a quoted form back into source text through a prioritized
//! dispatch of shape recognizers, first match wins. Dispatch order matters:
//! several recognizers match the same node shape at different specificity
//! (a single-element block collapses before the general block renderer runs,
//! an alias path is checked before generic call rendering), so the chain in
//! [`to_string`] preserves its order exactly.
//!
//! Recognized compiler-lowered shapes are undone through [`crate::rewrite`]
//! before printing; parenthesization decisions consult the operator table in
//! [`operators`].

use thiserror::Error;

use crate::rewrite;
use crate::term::{self, traverse::TraverseError, Args, Term};

pub mod format;
pub mod identifier;
pub mod inspect;
pub mod operators;

use format::adjust_newlines;
use operators::Associativity;


/// Recursion ceiling for adversarially nested input. Each term level costs
/// several native frames through the dispatch chain, so the ceiling must
/// trip long before the thread stack runs out.
const MAX_DEPTH: usize = 200;

/// Printer errors. Shape mismatches are not errors (the next recognizer in
/// the chain gets its turn); these are the conditions that abort a call.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A recognized shape the current rule set deliberately does not cover
    #[error("rendering is not implemented for {0}")]
    NotImplemented(&'static str),

    /// Expression nesting exceeded [`MAX_DEPTH`]
    #[error("expression nesting exceeds the render depth ceiling")]
    TooDeep,

    /// Structural corruption reached a guard-rewrite traversal
    #[error(transparent)]
    Traverse(#[from] TraverseError),
}

type RuleResult = Result<Option<String>, RenderError>;

/// Render a quoted form as source text.
pub fn render(term: &Term) -> Result<String, RenderError> {
    to_string(term, 0)
}

/// Render a body position: block expressions become newline-joined lines
/// rather than the parenthesized block form.
pub fn render_body(term: &Term) -> Result<String, RenderError> {
    block_body_to_string(term, 0)
}

fn to_string(term: &Term, depth: usize) -> Result<String, RenderError> {
    if depth > MAX_DEPTH {
        return Err(RenderError::TooDeep);
    }
    let depth = depth + 1;

    if let Some(text) = variable_to_string(term) {
        return Ok(text);
    }
    if let Some(text) = alias_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = single_expression_block_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = block_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = bit_container_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = tuple_container_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = map_container_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = struct_container_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = fn_arrow_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = fn_block_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = fn_adjusted_block_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = arrow_list_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = when_binary_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = when_splat_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = capture_name_arity_to_string(term)? {
        return Ok(text);
    }
    if let Some(text) = capture_module_name_arity_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = capture_expression_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = not_in_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = access_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = dot_tuple_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = cons_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = call_to_text(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = pair_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(text) = list_to_string(term, depth)? {
        return Ok(text);
    }

    Ok(inspect::inspect(term))
}

// ---------------------------------------------------------------------------
// simple forms

fn variable_to_string(term: &Term) -> Option<String> {
    match term {
        Term::Node(node) if matches!(node.args, Args::Context(_)) => {
            node.head.atom_name().map(str::to_string)
        }
        _ => None,
    }
}

fn alias_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("__aliases__") {
        Some(node) => node,
        None => return Ok(None),
    };
    let segments = match &node.args {
        Args::List(segments) => segments,
        Args::Context(_) => return Ok(None),
    };

    let mut rendered = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Term::Atom(name) => {
                rendered.push(name.strip_prefix("Elixir.").unwrap_or(name).to_string())
            }
            other => rendered.push(to_string(other, depth)?),
        }
    }

    Ok(Some(rendered.join(".")))
}

fn single_expression_block_to_string(term: &Term, depth: usize) -> RuleResult {
    match term.tagged_args("__block__", 1) {
        Some(args) => Ok(Some(to_string(&args[0], depth)?)),
        None => Ok(None),
    }
}

fn block_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("__block__") {
        Some(node) => node,
        None => return Ok(None),
    };
    if !matches!(node.args, Args::List(_)) {
        return Ok(None);
    }

    let body = adjust_newlines(&block_body_to_string(term, depth)?, "\n  ");

    Ok(Some(format!("(\n  {body}\n)")))
}

/// Newline-joined rendering of a block body, an arrow-clause list, or a
/// plain expression. Used wherever a body position accepts any of the three.
fn block_body_to_string(term: &Term, depth: usize) -> Result<String, RenderError> {
    if let Some(text) = arrow_clauses_block_to_string(term, depth)? {
        return Ok(text);
    }
    if let Some(node) = term.tagged_node("__block__") {
        if let Args::List(expressions) = &node.args {
            let rendered = expressions
                .iter()
                .map(|expression| to_string(expression, depth))
                .collect::<Result<Vec<_>, _>>()?;

            return Ok(rendered.join("\n"));
        }
    }

    to_string(term, depth)
}

fn arrow_clauses_block_to_string(term: &Term, depth: usize) -> RuleResult {
    let clauses = match term {
        Term::List(clauses) if !clauses.is_empty() => clauses,
        _ => return Ok(None),
    };
    if clauses[0].tagged_node("->").is_none() {
        return Ok(None);
    }

    let mut rendered = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let args = match clause.tagged_args("->", 2) {
            Some(args) => args,
            None => return Ok(None),
        };
        let patterns = match &args[0] {
            Term::List(patterns) => patterns.as_slice(),
            _ => return Ok(None),
        };

        let mut left = comma_join_or_empty_parentheses(patterns, false, depth)?;
        // a lone case expression on the left reads ambiguously without parens
        if patterns.len() == 1 && patterns[0].tagged_node("case").is_some() {
            left = format!("({left})");
        }

        let body = adjust_newlines(&block_body_to_string(&args[1], depth)?, "\n  ");
        rendered.push(format!("{left}->\n  {body}"));
    }

    Ok(Some(rendered.join("\n")))
}

// ---------------------------------------------------------------------------
// containers

fn bit_container_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("<<>>") {
        Some(node) => node,
        None => return Ok(None),
    };
    let segments = match &node.args {
        Args::List(segments) => segments,
        Args::Context(_) => return Ok(None),
    };

    if is_interpolated(segments) {
        return Ok(Some(interpolate(segments, depth)?));
    }

    let mut rendered = Vec::with_capacity(segments.len());
    for segment in segments {
        let text = bit_segment_to_string(segment, depth)?;

        // parenthesized when the segment could be confused with the
        // container's own delimiters
        if text.starts_with('<') || text.ends_with('>') {
            rendered.push(format!("({text})"));
        } else {
            rendered.push(text);
        }
    }

    Ok(Some(format!("<<{}>>", rendered.join(", "))))
}

fn bit_segment_to_string(segment: &Term, depth: usize) -> Result<String, RenderError> {
    if let Some(args) = segment.tagged_args("::", 2) {
        let left = operand_to_string(&args[0], "::", Associativity::Left, depth)?;
        let mods = bit_mods_to_string(&args[1], "::", Associativity::Right, depth)?;

        return Ok(format!("{left}::{mods}"));
    }

    to_string(segment, depth)
}

fn bit_mods_to_string(
    term: &Term,
    parent_operator: &str,
    side: Associativity,
    depth: usize,
) -> Result<String, RenderError> {
    if let Term::Node(node) = term {
        if let (Some(operator @ ("*" | "-")), Args::List(args)) =
            (node.head.atom_name(), &node.args)
        {
            if args.len() == 2 {
                let left = bit_mods_to_string(&args[0], operator, Associativity::Left, depth)?;
                let right = bit_mods_to_string(&args[1], operator, Associativity::Right, depth)?;

                return Ok(format!("{left}{operator}{right}"));
            }
        }
    }

    operand_to_string(term, parent_operator, side, depth)
}

fn is_interpolated(segments: &[Term]) -> bool {
    !segments.is_empty() && segments.iter().all(is_interpolated_segment)
}

fn is_interpolated_segment(segment: &Term) -> bool {
    if matches!(segment, Term::Binary(_)) {
        return true;
    }

    interpolation_expression(segment).is_some()
}

/// The expression inside a `Kernel.to_string(expr) :: binary` segment.
fn interpolation_expression(segment: &Term) -> Option<&Term> {
    let args = segment.tagged_args("::", 2)?;
    args[1].tagged_node("binary")?;

    match &args[0] {
        Term::Node(node) => {
            let dot = node.head.tagged_args(".", 2)?;
            if dot[0].atom_name() != Some("Elixir.Kernel") || dot[1].atom_name() != Some("to_string")
            {
                return None;
            }
            match &node.args {
                Args::List(call_args) if call_args.len() == 1 => Some(&call_args[0]),
                _ => None,
            }
        }
        _ => None,
    }
}

fn interpolate(segments: &[Term], depth: usize) -> Result<String, RenderError> {
    let mut interpolated = String::from("\"");

    for segment in segments {
        match segment {
            Term::Binary(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => interpolated.push_str(&identifier::escape(text)),
                Err(_) => return Err(RenderError::NotImplemented("non-utf8 binary segment")),
            },
            other => match interpolation_expression(other) {
                Some(expression) => {
                    interpolated.push_str("#{");
                    interpolated.push_str(&to_string(expression, depth)?);
                    interpolated.push('}');
                }
                None => return Err(RenderError::NotImplemented("bit segment interpolation")),
            },
        }
    }

    interpolated.push('"');
    Ok(interpolated)
}

fn tuple_container_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("{}") {
        Some(node) => node,
        None => return Ok(None),
    };
    match &node.args {
        Args::List(elements) => Ok(Some(format!("{{{}}}", comma_join(elements, depth)?))),
        Args::Context(_) => Ok(None),
    }
}

fn map_container_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("%{}") {
        Some(node) => node,
        None => return Ok(None),
    };
    let pairs = match &node.args {
        Args::List(pairs) => pairs,
        Args::Context(_) => return Ok(None),
    };

    let (struct_name, fields) = struct_name_and_fields(pairs, depth)?;

    Ok(Some(format!(
        "%{struct_name}{{{}}}",
        map_to_string(&fields, depth)?
    )))
}

/// Pull an internal `__struct__` key out to the `%Name{...}` prefix form.
fn struct_name_and_fields(
    pairs: &[Term],
    _depth: usize,
) -> Result<(String, Vec<Term>), RenderError> {
    let mut struct_name = None;
    let mut fields = Vec::with_capacity(pairs.len());

    for pair in pairs {
        match pair {
            Term::Pair(key, value)
                if key.atom_name() == Some("__struct__")
                    && matches!(**value, Term::Atom(_))
                    && struct_name.is_none() =>
            {
                struct_name = value.atom_name().map(inspect::inspect_atom);
            }
            other => fields.push(other.clone()),
        }
    }

    Ok((struct_name.unwrap_or_default(), fields))
}

fn map_to_string(pairs: &[Term], depth: usize) -> Result<String, RenderError> {
    // map-update syntax: %{base | fields}
    if pairs.len() == 1 {
        if let Some(args) = pairs[0].tagged_args("|", 2) {
            if let Term::List(update_pairs) = &args[1] {
                return Ok(format!(
                    "{} | {}",
                    to_string(&args[0], depth)?,
                    map_to_string(update_pairs, depth)?
                ));
            }
        }
    }

    if term::is_keyword_list(pairs) {
        keyword_list_to_string(pairs, depth)
    } else {
        let rendered = pairs
            .iter()
            .map(|pair| match pair {
                Term::Pair(key, value) => Ok(format!(
                    "{} => {}",
                    to_string(key, depth)?,
                    to_string(value, depth)?
                )),
                other => to_string(other, depth),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rendered.join(", "))
    }
}

fn struct_container_to_string(term: &Term, depth: usize) -> RuleResult {
    let args = match term.tagged_args("%", 2) {
        Some(args) => args,
        None => return Ok(None),
    };

    let map_args = match args[1].tagged_node("%{}") {
        Some(node) => match &node.args {
            Args::List(pairs) => pairs,
            Args::Context(_) => return Ok(None),
        },
        None => return Ok(None),
    };

    Ok(Some(format!(
        "%{}{{{}}}",
        to_string(&args[0], depth)?,
        map_to_string(map_args, depth)?
    )))
}

// ---------------------------------------------------------------------------
// anonymous functions and clause lists

fn fn_arrow_to_string(term: &Term, depth: usize) -> RuleResult {
    let clauses = match term.tagged_args("fn", 1) {
        Some(args) => args,
        None => return Ok(None),
    };
    let clause_args = match clauses[0].tagged_args("->", 2) {
        Some(args) => args,
        None => return Ok(None),
    };

    // block bodies take the multi-line form instead
    if clause_args[1].tagged_node("__block__").is_some() {
        return Ok(None);
    }

    Ok(Some(format!(
        "fn {} end",
        arrow_to_string(clauses, false, depth)?
    )))
}

fn fn_block_to_string(term: &Term, depth: usize) -> RuleResult {
    let clauses = match term.tagged_args("fn", 1) {
        Some(args) => args,
        None => return Ok(None),
    };
    if clauses[0].tagged_node("->").is_none() {
        return Ok(None);
    }

    let body = block_body_to_string(&Term::List(clauses.to_vec()), depth)?;

    Ok(Some(format!("fn {body}\nend")))
}

fn fn_adjusted_block_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("fn") {
        Some(node) => node,
        None => return Ok(None),
    };
    let clauses = match &node.args {
        Args::List(clauses) => clauses,
        Args::Context(_) => return Ok(None),
    };

    let body = adjust_newlines(
        &block_body_to_string(&Term::List(clauses.clone()), depth)?,
        "\n  ",
    );

    Ok(Some(format!("fn\n  {body}\nend")))
}

fn arrow_list_to_string(term: &Term, depth: usize) -> RuleResult {
    let clauses = match term {
        Term::List(clauses) if !clauses.is_empty() => clauses,
        _ => return Ok(None),
    };
    if clauses[0].tagged_node("->").is_none() {
        return Ok(None);
    }

    Ok(Some(format!(
        "({})",
        arrow_to_string(clauses, true, depth)?
    )))
}

fn arrow_to_string(
    clauses: &[Term],
    empty_parentheses: bool,
    depth: usize,
) -> Result<String, RenderError> {
    let mut rendered = Vec::with_capacity(clauses.len());

    for clause in clauses {
        let args = clause
            .tagged_args("->", 2)
            .ok_or(RenderError::NotImplemented("malformed arrow clause"))?;
        let patterns = match &args[0] {
            Term::List(patterns) => patterns.as_slice(),
            _ => return Err(RenderError::NotImplemented("malformed arrow clause")),
        };

        let left = comma_join_or_empty_parentheses(patterns, empty_parentheses, depth)?;
        let right = to_string(&args[1], depth)?;

        rendered.push(format!("{left}-> {right}"));
    }

    Ok(rendered.join("; "))
}

fn comma_join_or_empty_parentheses(
    patterns: &[Term],
    empty_parentheses: bool,
    depth: usize,
) -> Result<String, RenderError> {
    if patterns.is_empty() {
        if empty_parentheses {
            Ok("() ".to_string())
        } else {
            Ok(String::new())
        }
    } else {
        Ok(format!("{} ", comma_join(patterns, depth)?))
    }
}

// ---------------------------------------------------------------------------
// guards

fn when_binary_to_string(term: &Term, depth: usize) -> RuleResult {
    let args = match term.tagged_args("when", 2) {
        Some(args) => args,
        None => return Ok(None),
    };
    let (left, right) = (&args[0], &args[1]);

    let right_text = match right {
        Term::List(elements) if !elements.is_empty() && term::is_keyword_list(elements) => {
            keyword_list_to_string(elements, depth)?
        }
        _ => {
            let rewritten = rewrite::rewrite_guard(right)?;
            operand_to_string(&rewritten, "when", Associativity::Right, depth)?
        }
    };
    let left_text = operand_to_string(left, "when", Associativity::Left, depth)?;

    Ok(Some(format!("{left_text} when {right_text}")))
}

/// More than one value precedes `when`: `(a, b) when guard`.
fn when_splat_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term.tagged_node("when") {
        Some(node) => node,
        None => return Ok(None),
    };
    let args = match &node.args {
        Args::List(args) if !args.is_empty() => args,
        _ => return Ok(None),
    };

    let (patterns, guard) = args.split_at(args.len() - 1);
    let rewritten = rewrite::rewrite_guard(&guard[0])?;

    Ok(Some(format!(
        "({}) when {}",
        comma_join(patterns, depth)?,
        to_string(&rewritten, depth)?
    )))
}

// ---------------------------------------------------------------------------
// captures

fn capture_name_arity_to_string(term: &Term) -> RuleResult {
    let slash_args = match capture_slash_args(term) {
        Some(args) => args,
        None => return Ok(None),
    };

    let name = match &slash_args[0] {
        Term::Node(node) if matches!(node.args, Args::Context(_)) => match node.head.atom_name() {
            Some(name) => name,
            None => return Ok(None),
        },
        _ => return Ok(None),
    };
    let arity = match &slash_args[1] {
        Term::Int(arity) => arity,
        _ => return Ok(None),
    };

    Ok(Some(format!(
        "&{}/{arity}",
        identifier::inspect_as_function(name, true)
    )))
}

fn capture_module_name_arity_to_string(term: &Term, depth: usize) -> RuleResult {
    let slash_args = match capture_slash_args(term) {
        Some(args) => args,
        None => return Ok(None),
    };

    let arity = match &slash_args[1] {
        Term::Int(arity) => *arity,
        _ => return Ok(None),
    };
    let (module, function, call_args) = match remote_call_parts(&slash_args[0]) {
        Some(parts) => parts,
        None => return Ok(None),
    };
    if !call_args.is_empty() {
        return Ok(None);
    }

    if module == "erlang" {
        // capturing a primitive captures its stdlib equivalent when one exists
        let arity_usize = usize::try_from(arity).unwrap_or(usize::MAX);
        return match rewrite::module_function_rewrite(module, function, arity_usize) {
            Some(Term::Atom(rewritten)) => Ok(Some(format!("&{rewritten}/{arity}"))),
            Some(ref head) => match head.tagged_args(".", 2) {
                Some(dot) => {
                    let rewritten_module = to_string(&dot[0], depth)?;
                    let rewritten_function = dot[1].atom_name().unwrap_or(function);

                    Ok(Some(format!(
                        "&{rewritten_module}.{rewritten_function}/{arity}"
                    )))
                }
                None => Ok(Some(format!("&:erlang.{function}/{arity}"))),
            },
            None => Ok(Some(format!("&:erlang.{function}/{arity}"))),
        };
    }

    Ok(Some(format!(
        "&{}.{function}/{arity}",
        inspect::inspect_atom(module)
    )))
}

fn capture_expression_to_string(term: &Term, depth: usize) -> RuleResult {
    let args = match term.tagged_args("&", 1) {
        Some(args) => args,
        None => return Ok(None),
    };

    match &args[0] {
        Term::Int(_) => Ok(None),
        expression => Ok(Some(format!("&({})", to_string(expression, depth)?))),
    }
}

fn capture_slash_args(term: &Term) -> Option<&[Term]> {
    let args = term.tagged_args("&", 1)?;
    args[0].tagged_args("/", 2)
}

fn remote_call_parts(term: &Term) -> Option<(&str, &str, &[Term])> {
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

// ---------------------------------------------------------------------------
// operators and calls

fn not_in_to_string(term: &Term, depth: usize) -> RuleResult {
    let args = match term.tagged_args("not", 1) {
        Some(args) => args,
        None => return Ok(None),
    };
    let in_args = match args[0].tagged_args("in", 2) {
        Some(args) => args,
        None => return Ok(None),
    };

    Ok(Some(format!(
        "{} not in {}",
        to_string(&in_args[0], depth)?,
        to_string(&in_args[1], depth)?
    )))
}

fn access_to_string(term: &Term, depth: usize) -> RuleResult {
    let (module, function, args) = match remote_call_parts(term) {
        Some(parts) => parts,
        None => return Ok(None),
    };
    if module != "Elixir.Access" || function != "get" || args.len() != 2 {
        return Ok(None);
    }

    let left = to_string(&args[0], depth)?;
    let right = to_string(&Term::List(vec![args[1].clone()]), depth)?;

    if is_operation_expression(&args[0]) {
        Ok(Some(format!("({left}){right}")))
    } else {
        Ok(Some(format!("{left}{right}")))
    }
}

fn dot_tuple_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term {
        Term::Node(node) => node,
        _ => return Ok(None),
    };
    let args = match &node.args {
        Args::List(args) => args,
        _ => return Ok(None),
    };
    let dot = match node.head.tagged_args(".", 2) {
        Some(dot) => dot,
        None => return Ok(None),
    };
    if dot[1].atom_name() != Some("{}") {
        return Ok(None);
    }

    Ok(Some(format!(
        "{}.{{{}}}",
        to_string(&dot[0], depth)?,
        arguments_to_string(args, depth)?
    )))
}

fn cons_to_string(term: &Term, depth: usize) -> RuleResult {
    let args = match term.tagged_args("|", 2) {
        Some(args) => args,
        None => return Ok(None),
    };

    Ok(Some(format!(
        "{} | {}",
        to_string(&args[0], depth)?,
        to_string(&args[1], depth)?
    )))
}

fn call_to_text(term: &Term, depth: usize) -> RuleResult {
    let node = match term {
        Term::Node(node) => node,
        _ => return Ok(None),
    };
    if !matches!(node.args, Args::List(_)) {
        return Ok(None);
    }

    if let Some(text) = module_attribute_to_string(term, depth)? {
        return Ok(Some(text));
    }
    if let Some(text) = unary_call_to_string(term, depth)? {
        return Ok(Some(text));
    }
    if let Some(text) = binary_call_to_string(term, depth)? {
        return Ok(Some(text));
    }
    if let Some(text) = sigil_call_to_string(term, depth)? {
        return Ok(Some(text));
    }
    if let Some(rewritten) = rewrite::deinline(term) {
        return Ok(Some(to_string(&rewritten, depth)?));
    }

    Ok(Some(other_call_to_string(term, depth)?))
}

fn module_attribute_to_string(term: &Term, depth: usize) -> RuleResult {
    let args = match term.tagged_args("@", 1) {
        Some(args) => args,
        None => return Ok(None),
    };
    let definition = match &args[0] {
        Term::Node(node) => node,
        _ => return Ok(None),
    };
    let name = match definition.head.atom_name() {
        Some(name) => name,
        None => return Ok(None),
    };
    let value = match &definition.args {
        Args::List(values) if values.len() == 1 => &values[0],
        _ => return Ok(None),
    };

    Ok(Some(format!("@{name} {}", to_string(value, depth)?)))
}

fn unary_call_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term {
        Term::Node(node) => node,
        _ => return Ok(None),
    };
    let operator = match node.head.atom_name() {
        Some(name) => name,
        None => return Ok(None),
    };
    let args = match &node.args {
        Args::List(args) if args.len() == 1 => args,
        _ => return Ok(None),
    };
    if operators::unary_operator(operator).is_none() {
        return Ok(None);
    }

    let argument = to_string(&args[0], depth)?;

    if operator == "not" || is_operation_expression(&args[0]) {
        Ok(Some(format!("{operator}({argument})")))
    } else {
        Ok(Some(format!("{operator}{argument}")))
    }
}

fn binary_call_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term {
        Term::Node(node) => node,
        _ => return Ok(None),
    };
    let operator = match node.head.atom_name() {
        Some(name) => name,
        None => return Ok(None),
    };
    let args = match &node.args {
        Args::List(args) if args.len() == 2 => args,
        _ => return Ok(None),
    };
    if operators::binary_operator(operator).is_none() {
        return Ok(None);
    }
    let (left, right) = (&args[0], &args[1]);

    // `x == nil` reads better as its kernel shorthand
    if operator == "==" && right.atom_name() == Some("nil") {
        return Ok(Some(to_string(
            &Term::call("is_nil", vec![left.clone()]),
            depth,
        )?));
    }

    let operator_text = if operator == ".." {
        operator.to_string()
    } else {
        format!(" {operator} ")
    };

    let operation = format!(
        "{}{operator_text}{}",
        operand_to_string(left, operator, Associativity::Left, depth)?,
        operand_to_string(right, operator, Associativity::Right, depth)?
    );

    if operator == "->" {
        Ok(Some(format!("({operation})")))
    } else {
        Ok(Some(operation))
    }
}

fn sigil_call_to_string(term: &Term, depth: usize) -> RuleResult {
    let node = match term {
        Term::Node(node) => node,
        _ => return Ok(None),
    };
    let sigil = match node.head.atom_name() {
        Some(name) => name,
        None => return Ok(None),
    };
    let name = match sigil.strip_prefix("sigil_") {
        Some(name) => name,
        None => return Ok(None),
    };
    let args = match &node.args {
        Args::List(args) if args.len() == 2 => args,
        _ => return Ok(None),
    };
    let segments = match args[0].tagged_node("<<>>") {
        Some(bit_node) => match &bit_node.args {
            Args::List(segments) => segments,
            Args::Context(_) => return Ok(None),
        },
        None => return Ok(None),
    };
    let modifiers = match &args[1] {
        Term::List(modifiers) => modifiers,
        _ => return Ok(None),
    };

    let mut modifier_text = String::new();
    for modifier in modifiers {
        match modifier {
            Term::Int(codepoint) => match u32::try_from(*codepoint).ok().and_then(char::from_u32) {
                Some(c) => modifier_text.push(c),
                None => return Err(RenderError::NotImplemented("sigil modifiers")),
            },
            _ => return Err(RenderError::NotImplemented("sigil modifiers")),
        }
    }

    Ok(Some(format!(
        "~{name}{}{modifier_text}",
        interpolate(segments, depth)?
    )))
}

fn other_call_to_string(term: &Term, depth: usize) -> Result<String, RenderError> {
    let node = match term {
        Term::Node(node) => node,
        _ => return Ok(inspect::inspect(term)),
    };
    let args = match &node.args {
        Args::List(args) => args.as_slice(),
        Args::Context(_) => return Ok(inspect::inspect(term)),
    };

    if let Some((last, init)) = args.split_last() {
        if let Term::List(blocks) = last {
            if term::is_keyword_blocks(blocks) {
                return Ok(format!(
                    "{}{}",
                    call_with_arguments_to_string(&node.head, init, depth)?,
                    keyword_blocks_to_string(blocks, depth)?
                ));
            }
        }
    }

    call_with_arguments_to_string(&node.head, args, depth)
}

fn call_with_arguments_to_string(
    target: &Term,
    args: &[Term],
    depth: usize,
) -> Result<String, RenderError> {
    Ok(format!(
        "{}({})",
        call_target_to_string(target, depth)?,
        arguments_to_string(args, depth)?
    ))
}

fn call_target_to_string(target: &Term, depth: usize) -> Result<String, RenderError> {
    if depth > MAX_DEPTH {
        return Err(RenderError::TooDeep);
    }

    if let Term::Atom(name) = target {
        return Ok(identifier::inspect_as_function(name, true));
    }

    if let Some(node) = target.tagged_node(".") {
        if let Args::List(dot_args) = &node.args {
            match dot_args.as_slice() {
                // anonymous-function application: `fun.(args)`
                [operand] => {
                    return Ok(format!("{}.", module_to_string(operand, depth)?));
                }
                [left, Term::Atom(function)] => {
                    return Ok(format!(
                        "{}.{}",
                        module_to_string(left, depth)?,
                        identifier::inspect_as_function(function, false)
                    ));
                }
                [left, right] => {
                    return Ok(format!(
                        "{}.{}",
                        module_to_string(left, depth)?,
                        call_target_to_string(right, depth + 1)?
                    ));
                }
                _ => {}
            }
        }
    }

    to_string(target, depth)
}

fn module_to_string(module: &Term, depth: usize) -> Result<String, RenderError> {
    if let Term::Atom(name) = module {
        return Ok(inspect::inspect_atom(name));
    }

    let needs_parentheses = match module {
        Term::Node(node) => match node.head.atom_name() {
            Some("&") => match &node.args {
                Args::List(args) => args.len() == 1 && !matches!(args[0], Term::Int(_)),
                Args::Context(_) => false,
            },
            Some("fn") => true,
            _ => match &node.args {
                Args::List(args) => match args.first() {
                    Some(Term::List(blocks)) => term::is_keyword_blocks(blocks),
                    _ => false,
                },
                Args::Context(_) => false,
            },
        },
        _ => false,
    };

    let rendered = to_string(module, depth)?;

    if needs_parentheses {
        Ok(format!("({rendered})"))
    } else {
        Ok(rendered)
    }
}

/// Call argument rendering folds a trailing keyword list into the bare
/// `key: value` suffix form without brackets.
fn arguments_to_string(args: &[Term], depth: usize) -> Result<String, RenderError> {
    if let Some((Term::List(keywords), init)) = args.split_last().map(|(last, init)| (last, init)) {
        if !keywords.is_empty() && term::is_keyword_list(keywords) {
            let keyword_text = keyword_list_to_string(keywords, depth)?;

            return if init.is_empty() {
                Ok(keyword_text)
            } else {
                Ok(format!("{}, {keyword_text}", comma_join(init, depth)?))
            };
        }
    }

    comma_join(args, depth)
}

fn keyword_list_to_string(keywords: &[Term], depth: usize) -> Result<String, RenderError> {
    let rendered = keywords
        .iter()
        .map(|keyword| match keyword {
            Term::Pair(key, value) => match key.atom_name() {
                Some(name) => Ok(format!(
                    "{} {}",
                    identifier::inspect_as_key(name),
                    to_string(value, depth)?
                )),
                None => to_string(keyword, depth),
            },
            other => to_string(other, depth),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rendered.join(", "))
}

fn keyword_blocks_to_string(blocks: &[Term], depth: usize) -> Result<String, RenderError> {
    let mut rendered = String::from(" ");

    for keyword in term::KEYWORD_BLOCK_KEYWORDS {
        if let Some(block) = term::keyword_get(blocks, keyword) {
            let body = adjust_newlines(&block_body_to_string(block, depth)?, "\n  ");

            rendered.push_str(keyword);
            rendered.push_str("\n  ");
            rendered.push_str(&body);
            rendered.push('\n');
        }
    }

    rendered.push_str("end");
    Ok(rendered)
}

fn pair_to_string(term: &Term, depth: usize) -> RuleResult {
    // raw 2-tuples print through the `{}` expression-node shape
    match term {
        Term::Pair(left, right) => Ok(Some(to_string(
            &Term::call("{}", vec![left.as_ref().clone(), right.as_ref().clone()]),
            depth,
        )?)),
        _ => Ok(None),
    }
}

fn list_to_string(term: &Term, depth: usize) -> RuleResult {
    let elements = match term {
        Term::List(elements) => elements,
        _ => return Ok(None),
    };

    if elements.is_empty() {
        return Ok(Some("[]".to_string()));
    }
    if identifier::is_printable_list(elements) {
        return Ok(Some(format!(
            "'{}'",
            identifier::printable_list_to_string(elements)
        )));
    }
    if term::is_keyword_list(elements) {
        return Ok(Some(format!(
            "[{}]",
            keyword_list_to_string(elements, depth)?
        )));
    }

    Ok(Some(format!("[{}]", comma_join(elements, depth)?)))
}

// ---------------------------------------------------------------------------
// operands and parenthesization

fn is_operation_expression(term: &Term) -> bool {
    let node = match term {
        Term::Node(node) => node,
        _ => return false,
    };
    let operator = match node.head.atom_name() {
        Some(name) => name,
        None => return false,
    };

    match &node.args {
        Args::List(args) => match args.len() {
            2 => operators::binary_operator(operator).is_some(),
            1 => operators::unary_operator(operator).is_some(),
            _ => false,
        },
        Args::Context(_) => false,
    }
}

/// Render an operand of `parent_operator`, parenthesizing when the operand's
/// own top operator binds looser, or equally on the non-associative side.
fn operand_to_string(
    term: &Term,
    parent_operator: &str,
    side: Associativity,
    depth: usize,
) -> Result<String, RenderError> {
    if let Term::Node(node) = term {
        if let (Some(operator), Args::List(args)) = (node.head.atom_name(), &node.args) {
            if args.len() == 2 {
                if let (Some((_, precedence)), Some((parent_associativity, parent_precedence))) = (
                    operators::binary_operator(operator),
                    operators::binary_operator(parent_operator),
                ) {
                    let needs_parentheses = match parent_precedence.cmp(&precedence) {
                        std::cmp::Ordering::Less => false,
                        std::cmp::Ordering::Greater => true,
                        std::cmp::Ordering::Equal => parent_associativity != side,
                    };

                    let rendered = to_string(term, depth)?;
                    return if needs_parentheses {
                        Ok(format!("({rendered})"))
                    } else {
                        Ok(rendered)
                    };
                }
            }
        }
    }

    // an empty block in a value position renders as ()
    if parent_operator == "->" && side == Associativity::Left {
        if let Term::List(elements) = term {
            if elements.is_empty() {
                return Ok("()".to_string());
            }
        }
    }

    to_string(term, depth)
}

fn comma_join(elements: &[Term], depth: usize) -> Result<String, RenderError> {
    let rendered = elements
        .iter()
        .map(|element| to_string(element, depth))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rendered.join(", "))
}
