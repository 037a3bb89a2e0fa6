//! Literal term inspection
//!
//! Total rendering of any [`Term`] as valid source text. This is the
//! printer's final fallback: quoted-form shapes the printer recognizes never
//! reach it, everything else does, so it must render every variant.

use crate::term::{Args, Term};

use super::identifier;

/// Render `term` as a source literal, with necessary quoting and escaping.
pub fn inspect(term: &Term) -> String {
    match term {
        Term::Atom(name) => inspect_atom(name),
        Term::Int(value) => value.to_string(),
        Term::Float(value) => inspect_float(*value),
        Term::Binary(bytes) => inspect_binary(bytes),
        Term::List(elements) => format!("[{}]", join(elements)),
        Term::Pair(left, right) => format!("{{{}, {}}}", inspect(left), inspect(right)),
        Term::Tuple(elements) => format!("{{{}}}", join(elements)),
        Term::Map(pairs) => {
            let rendered = pairs
                .iter()
                .map(|(key, value)| format!("{} => {}", inspect(key), inspect(value)))
                .collect::<Vec<_>>()
                .join(", ");

            format!("%{{{rendered}}}")
        }
        // raw three-element tuple shape for nodes nobody printed
        Term::Node(node) => {
            let args = match &node.args {
                Args::List(list) => format!("[{}]", join(list)),
                Args::Context(context) => inspect_atom(context),
            };

            format!(
                "{{{}, [{}], {}}}",
                inspect(&node.head),
                join(&node.meta),
                args
            )
        }
    }
}

/// Render an atom, using the module-alias form for `Elixir.`-prefixed names.
pub fn inspect_atom(name: &str) -> String {
    if let Some(alias) = name.strip_prefix("Elixir.") {
        return alias.to_string();
    }

    match name {
        "nil" | "true" | "false" => name.to_string(),
        _ if identifier::is_callable_name(name) || super::operators::is_operator(name) => {
            format!(":{name}")
        }
        _ => format!(":\"{}\"", identifier::escape(name)),
    }
}

fn inspect_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

fn inspect_binary(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.chars().all(|c| !c.is_control() || c == '\n' || c == '\t') => {
            format!("\"{}\"", identifier::escape(text))
        }
        _ => {
            let rendered = bytes
                .iter()
                .map(|byte| byte.to_string())
                .collect::<Vec<_>>()
                .join(", ");

            format!("<<{rendered}>>")
        }
    }
}

fn join(elements: &[Term]) -> String {
    elements
        .iter()
        .map(inspect)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoms() {
        assert_eq!(inspect(&Term::atom("ok")), ":ok");
        assert_eq!(inspect(&Term::atom("nil")), "nil");
        assert_eq!(inspect(&Term::atom("true")), "true");
        assert_eq!(inspect(&Term::atom("Elixir.Foo.Bar")), "Foo.Bar");
        assert_eq!(inspect(&Term::atom("utf8")), ":utf8");
        assert_eq!(inspect(&Term::atom("foo bar")), ":\"foo bar\"");
        assert_eq!(inspect(&Term::atom("++")), ":++");
    }

    #[test]
    fn numbers() {
        assert_eq!(inspect(&Term::Int(-42)), "-42");
        assert_eq!(inspect(&Term::Float(1.0)), "1.0");
        assert_eq!(inspect(&Term::Float(1.5)), "1.5");
    }

    #[test]
    fn binaries() {
        assert_eq!(inspect(&Term::Binary(b"hello".to_vec())), "\"hello\"");
        assert_eq!(inspect(&Term::Binary(vec![0, 1, 255])), "<<0, 1, 255>>");
        assert_eq!(
            inspect(&Term::Binary(b"say \"hi\"".to_vec())),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn containers() {
        assert_eq!(
            inspect(&Term::List(vec![Term::Int(1), Term::atom("a")])),
            "[1, :a]"
        );
        assert_eq!(
            inspect(&Term::Pair(
                Box::new(Term::atom("ok")),
                Box::new(Term::Int(1))
            )),
            "{:ok, 1}"
        );
        assert_eq!(
            inspect(&Term::Map(vec![(Term::atom("a"), Term::Int(1))])),
            "%{:a => 1}"
        );
        assert_eq!(
            inspect(&Term::Tuple(vec![
                Term::Int(1),
                Term::Int(2),
                Term::Int(3),
                Term::Int(4)
            ])),
            "{1, 2, 3, 4}"
        );
    }

    #[test]
    fn nodes_render_as_raw_tuples() {
        assert_eq!(inspect(&Term::var("x")), "{:x, [], nil}");
        assert_eq!(
            inspect(&Term::call("foo", vec![Term::Int(1)])),
            "{:foo, [], [1]}"
        );
    }
}
