//! Compiler debug-info envelope
//!
//! The `Dbgi` chunk stores `{:debug_info_v1, backend, payload}`. For modules
//! the Elixir compiler produced, the backend is `:elixir_erl` and the payload
//! is `{:elixir_v1, map, specs}` where the map carries the module name,
//! source location, attributes, and the definition list with full quoted
//! clauses. Modules compiled from Erlang carry a different backend and
//! cannot be unpacked here.

use thiserror::Error;

use crate::term::{self, Term};

#[derive(Error, Debug)]
pub enum DebugInfoError {
    #[error("term is not a debug_info_v1 envelope")]
    NotDebugInfoV1,

    #[error("debug info was produced by backend {0:?}, not :elixir_erl")]
    ForeignBackend(String),

    #[error("malformed debug info: {0}")]
    Malformed(&'static str),
}

/// Definition kind, taken verbatim from the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DefKind {
    Def,
    Defp,
    Defmacro,
    Defmacrop,
}

impl DefKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DefKind::Def => "def",
            DefKind::Defp => "defp",
            DefKind::Defmacro => "defmacro",
            DefKind::Defmacrop => "defmacrop",
        }
    }

    fn from_atom(name: &str) -> Option<Self> {
        match name {
            "def" => Some(DefKind::Def),
            "defp" => Some(DefKind::Defp),
            "defmacro" => Some(DefKind::Defmacro),
            "defmacrop" => Some(DefKind::Defmacrop),
            _ => None,
        }
    }
}

/// One clause of a definition: quoted argument patterns, guards, and body.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub line: Option<i64>,
    pub args: Vec<Term>,
    pub guards: Vec<Term>,
    pub body: Term,
}

/// One function or macro definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub name: String,
    pub arity: i64,
    pub kind: DefKind,
    pub line: Option<i64>,
    pub clauses: Vec<Clause>,
}

/// Unpacked `:elixir_v1` debug info.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugInfo {
    pub module: String,
    pub file: Option<String>,
    pub line: Option<i64>,
    pub attributes: Vec<(String, Term)>,
    pub definitions: Vec<Definition>,
}

impl DebugInfo {
    /// Unpack the decoded `Dbgi` term.
    pub fn from_term(term: &Term) -> Result<Self, DebugInfoError> {
        let envelope = match term {
            Term::Tuple(elements) if elements.len() == 3 => elements,
            _ => return Err(DebugInfoError::NotDebugInfoV1),
        };
        if envelope[0].atom_name() != Some("debug_info_v1") {
            return Err(DebugInfoError::NotDebugInfoV1);
        }
        match envelope[1].atom_name() {
            Some("elixir_erl") => {}
            Some(backend) => return Err(DebugInfoError::ForeignBackend(backend.to_string())),
            None => return Err(DebugInfoError::NotDebugInfoV1),
        }

        let payload = match &envelope[2] {
            Term::Tuple(elements)
                if elements.len() == 3 && elements[0].atom_name() == Some("elixir_v1") =>
            {
                &elements[1]
            }
            _ => return Err(DebugInfoError::Malformed("expected an elixir_v1 payload")),
        };
        let pairs = match payload {
            Term::Map(pairs) => pairs,
            _ => return Err(DebugInfoError::Malformed("elixir_v1 payload is not a map")),
        };

        let module = match map_get(pairs, "module").and_then(Term::atom_name) {
            Some(module) => module.to_string(),
            None => return Err(DebugInfoError::Malformed("missing module name")),
        };
        let file = map_get(pairs, "file").and_then(|file| match file {
            Term::Binary(bytes) => String::from_utf8(bytes.clone()).ok(),
            _ => None,
        });
        let line = map_get(pairs, "line").and_then(|line| match line {
            Term::Int(line) => Some(*line),
            _ => None,
        });

        let attributes = match map_get(pairs, "attributes") {
            Some(Term::List(entries)) => entries
                .iter()
                .filter_map(|entry| match entry {
                    Term::Pair(key, value) => key
                        .atom_name()
                        .map(|name| (name.to_string(), value.as_ref().clone())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let definition_terms = match map_get(pairs, "definitions") {
            Some(Term::List(definitions)) => definitions.as_slice(),
            _ => return Err(DebugInfoError::Malformed("missing definition list")),
        };
        let definitions = definition_terms
            .iter()
            .map(definition_from_term)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DebugInfo {
            module,
            file,
            line,
            attributes,
            definitions,
        })
    }
}

fn map_get<'a>(pairs: &'a [(Term, Term)], key: &str) -> Option<&'a Term> {
    pairs
        .iter()
        .find(|(pair_key, _)| pair_key.atom_name() == Some(key))
        .map(|(_, value)| value)
}

/// `{{name, arity}, kind, meta, clauses}`
fn definition_from_term(term: &Term) -> Result<Definition, DebugInfoError> {
    let elements = match term {
        Term::Tuple(elements) if elements.len() == 4 => elements,
        _ => return Err(DebugInfoError::Malformed("definition is not a 4-tuple")),
    };

    let (name, arity) = match &elements[0] {
        Term::Pair(name, arity) => match (name.atom_name(), arity.as_ref()) {
            (Some(name), Term::Int(arity)) => (name.to_string(), *arity),
            _ => return Err(DebugInfoError::Malformed("malformed name/arity pair")),
        },
        _ => return Err(DebugInfoError::Malformed("malformed name/arity pair")),
    };

    let kind = elements[1]
        .atom_name()
        .and_then(DefKind::from_atom)
        .ok_or(DebugInfoError::Malformed("unknown definition kind"))?;

    let line = match &elements[2] {
        Term::List(meta) => meta_line(meta),
        _ => None,
    };

    let clause_terms = match &elements[3] {
        Term::List(clauses) => clauses.as_slice(),
        _ => return Err(DebugInfoError::Malformed("definition clauses are not a list")),
    };
    let clauses = clause_terms
        .iter()
        .map(clause_from_term)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Definition {
        name,
        arity,
        kind,
        line,
        clauses,
    })
}

/// `{meta, args, guards, body}`
fn clause_from_term(term: &Term) -> Result<Clause, DebugInfoError> {
    let elements = match term {
        Term::Tuple(elements) if elements.len() == 4 => elements,
        _ => return Err(DebugInfoError::Malformed("clause is not a 4-tuple")),
    };

    let line = match &elements[0] {
        Term::List(meta) => meta_line(meta),
        _ => None,
    };
    let args = match &elements[1] {
        Term::List(args) => args.clone(),
        _ => return Err(DebugInfoError::Malformed("clause arguments are not a list")),
    };
    let guards = match &elements[2] {
        Term::List(guards) => guards.clone(),
        _ => return Err(DebugInfoError::Malformed("clause guards are not a list")),
    };

    Ok(Clause {
        line,
        args,
        guards,
        body: elements[3].clone(),
    })
}

fn meta_line(meta: &[Term]) -> Option<i64> {
    match term::keyword_get(meta, "line") {
        Some(Term::Int(line)) => Some(*line),
        _ => None,
    }
}
