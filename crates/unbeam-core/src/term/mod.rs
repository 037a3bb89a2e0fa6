//! Quoted-form tree model and shape predicates
//!
//! A [`Term`] is the universal value type flowing through every component:
//! the same tree Elixir's macro system manipulates, as decoded from a BEAM
//! file's external-term payloads. Expression nodes (`{head, metadata, args}`
//! 3-tuples whose metadata is a list) are classified once at decode time into
//! the dedicated [`Node`] variant; everything else stays a plain container.

use serde::{Deserialize, Serialize};

pub mod traverse;

/// The fixed, ordered set of keyword-block keys, in render order.
pub const KEYWORD_BLOCK_KEYWORDS: [&str; 5] = ["do", "catch", "rescue", "after", "else"];

/// A quoted form or plain Erlang term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    /// Symbolic constant, including `nil`, `true`, `false`, operator and
    /// module names (module atoms carry the `Elixir.` prefix).
    Atom(String),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Binary/string literal
    Binary(Vec<u8>),
    /// List literal; may be keyword-shaped (see [`is_keyword_list`])
    List(Vec<Term>),
    /// Raw 2-element tuple (not an expression node)
    Pair(Box<Term>, Box<Term>),
    /// Expression node: call, operator application, or variable reference
    Node(Box<Node>),
    /// Raw tuple of any other arity; never a quoted expression
    Tuple(Vec<Term>),
    /// Map literal as an ordered association list
    Map(Vec<(Term, Term)>),
}

/// The arguments slot of an expression node.
///
/// A list marks a call or operator application; an atom marks a bare
/// variable reference whose "context" is that atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Args {
    /// Call/operator arguments in application order
    List(Vec<Term>),
    /// Variable context
    Context(String),
}

/// The canonical `{head, metadata, args}` expression-node shape.
///
/// `head` is an atom (function/operator/form name) or a nested node (for
/// dotted/remote calls). `metadata` is semantically inert for printing but
/// preserved for round-trip traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub head: Term,
    pub meta: Vec<Term>,
    pub args: Args,
}

impl Node {
    pub fn new(head: Term, meta: Vec<Term>, args: Args) -> Self {
        Node { head, meta, args }
    }
}

impl Term {
    /// Atom constructor shorthand.
    pub fn atom(name: &str) -> Term {
        Term::Atom(name.to_string())
    }

    /// A local call node `name(args)` with empty metadata.
    pub fn call(name: &str, args: Vec<Term>) -> Term {
        Term::Node(Box::new(Node::new(
            Term::atom(name),
            Vec::new(),
            Args::List(args),
        )))
    }

    /// A remote call node `Module.function(args)` with empty metadata.
    ///
    /// `module` is the full atom name, so Elixir modules carry their
    /// `Elixir.` prefix.
    pub fn remote_call(module: &str, function: &str, args: Vec<Term>) -> Term {
        Term::Node(Box::new(Node::new(
            Term::call(".", vec![Term::atom(module), Term::atom(function)]),
            Vec::new(),
            Args::List(args),
        )))
    }

    /// A bare variable reference `name` in context `nil`.
    pub fn var(name: &str) -> Term {
        Term::Node(Box::new(Node::new(
            Term::atom(name),
            Vec::new(),
            Args::Context("nil".to_string()),
        )))
    }

    /// True iff this is an expression node.
    pub fn is_expression(&self) -> bool {
        matches!(self, Term::Node(_))
    }

    /// True iff this is an expression node whose head is an atom and whose
    /// arguments are a (possibly empty) list.
    pub fn is_local_call(&self) -> bool {
        match self {
            Term::Node(node) => {
                matches!(node.head, Term::Atom(_)) && matches!(node.args, Args::List(_))
            }
            _ => false,
        }
    }

    /// True iff this is an expression node whose arguments slot is a context
    /// atom, i.e. a bare variable reference.
    pub fn is_variable(&self) -> bool {
        match self {
            Term::Node(node) => {
                matches!(node.head, Term::Atom(_)) && matches!(node.args, Args::Context(_))
            }
            _ => false,
        }
    }

    /// True iff this is an `__aliases__` path node.
    pub fn is_alias(&self) -> bool {
        match self {
            Term::Node(node) => matches!(&node.head, Term::Atom(name) if name == "__aliases__"),
            _ => false,
        }
    }

    /// The atom name when this is an atom.
    pub fn atom_name(&self) -> Option<&str> {
        match self {
            Term::Atom(name) => Some(name),
            _ => None,
        }
    }

    /// The node when this is an expression node tagged with `name`.
    pub fn tagged_node(&self, name: &str) -> Option<&Node> {
        match self {
            Term::Node(node) => match &node.head {
                Term::Atom(head) if head == name => Some(node),
                _ => None,
            },
            _ => None,
        }
    }

    /// The argument list when this is a node tagged with `name` carrying
    /// exactly `arity` list arguments.
    pub fn tagged_args(&self, name: &str, arity: usize) -> Option<&[Term]> {
        let node = self.tagged_node(name)?;
        match &node.args {
            Args::List(args) if args.len() == arity => Some(args),
            _ => None,
        }
    }
}

/// Whether every element of `list` is an atom-keyed pair.
///
/// Recognized structurally, never tagged: a keyword list is just a list
/// shape the printer treats specially.
pub fn is_keyword_list(list: &[Term]) -> bool {
    list.iter()
        .all(|element| matches!(element, Term::Pair(key, _) if matches!(**key, Term::Atom(_))))
}

/// Whether `list` is a keyword list whose keys are drawn from the fixed
/// `do`/`catch`/`rescue`/`after`/`else` set, starting with `do`.
pub fn is_keyword_blocks(list: &[Term]) -> bool {
    let first_is_do = match list.first() {
        Some(Term::Pair(key, _)) => key.atom_name() == Some("do"),
        _ => false,
    };

    first_is_do
        && list.iter().all(|element| match element {
            Term::Pair(key, _) => key
                .atom_name()
                .map(|name| KEYWORD_BLOCK_KEYWORDS.contains(&name))
                .unwrap_or(false),
            _ => false,
        })
}

/// Look up the value stored under atom `key` in a keyword-shaped list.
pub fn keyword_get<'a>(list: &'a [Term], key: &str) -> Option<&'a Term> {
    list.iter().find_map(|element| match element {
        Term::Pair(pair_key, value) if pair_key.atom_name() == Some(key) => Some(value.as_ref()),
        _ => None,
    })
}
