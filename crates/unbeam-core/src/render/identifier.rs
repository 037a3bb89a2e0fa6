//! Identifier legality and rendering decisions
//!
//! Decides whether an atom's name can be printed as a bare function or
//! keyword identifier or must be quoted, and owns the charlist printability
//! classification used for single-quoted list literals.

use crate::term::Term;

use super::operators;

/// Prefix the compiler puts on macro-definition-only call heads.
const MACRO_CALL_PREFIX: &str = "MACRO-";

/// Whether `name` is legal as a bare (unquoted) function or keyword
/// identifier: a lowercase letter or underscore, then alphanumerics and
/// underscores, optionally ending in `?` or `!`.
pub fn is_callable_name(name: &str) -> bool {
    let mut chars = name.chars().peekable();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }

    while let Some(c) = chars.next() {
        if c == '?' || c == '!' {
            return chars.next().is_none();
        }
        if !c.is_ascii_alphanumeric() && c != '_' {
            return false;
        }
    }

    true
}

/// Render an atom name in function-head position. Local call heads have the
/// macro definition prefix stripped first.
pub fn inspect_as_function(name: &str, local: bool) -> String {
    let name = if local {
        name.strip_prefix(MACRO_CALL_PREFIX).unwrap_or(name)
    } else {
        name
    };

    if is_callable_name(name) || operators::is_operator(name) {
        name.to_string()
    } else {
        format!("\"{}\"", escape(name))
    }
}

/// Render an atom name in keyword-key position, with the trailing colon.
pub fn inspect_as_key(name: &str) -> String {
    if is_callable_name(name) {
        format!("{name}:")
    } else {
        format!("\"{}\":", escape(name))
    }
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// Whether every element of `list` is a printable codepoint, making the
/// list renderable as a single-quoted charlist literal.
pub fn is_printable_list(list: &[Term]) -> bool {
    !list.is_empty()
        && list.iter().all(|element| match element {
            Term::Int(codepoint) => is_printable_codepoint(*codepoint),
            _ => false,
        })
}

/// Render a printable charlist's codepoints, without the surrounding quotes.
pub fn printable_list_to_string(list: &[Term]) -> String {
    list.iter()
        .filter_map(|element| match element {
            Term::Int(codepoint) => u32::try_from(*codepoint).ok().and_then(char::from_u32),
            _ => None,
        })
        .collect()
}

fn is_printable_codepoint(codepoint: i64) -> bool {
    match codepoint {
        0x20..=0x7e => true,
        // \n \t \v \b \f \r \e
        10 | 9 | 11 | 8 | 12 | 13 | 27 => true,
        _ => false,
    }
}
