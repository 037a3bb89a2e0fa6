//! Operator precedence and associativity table
//!
//! A read-only table constructed once at first use. Ranks and associativity
//! follow the Elixir grammar; higher rank binds tighter.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Which side of a binary operator an operand can sit on without needing
/// parentheses at equal precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

static BINARY_OPERATORS: Lazy<HashMap<&'static str, (Associativity, u16)>> = Lazy::new(|| {
    use Associativity::{Left, Right};

    let mut table = HashMap::new();

    let entries: [(&str, Associativity, u16); 42] = [
        ("->", Right, 10),
        ("<-", Left, 40),
        ("\\\\", Left, 40),
        ("when", Right, 50),
        ("::", Right, 60),
        ("|", Right, 70),
        ("=", Right, 100),
        ("||", Left, 120),
        ("|||", Left, 120),
        ("or", Left, 120),
        ("&&", Left, 130),
        ("&&&", Left, 130),
        ("and", Left, 130),
        ("==", Left, 140),
        ("!=", Left, 140),
        ("=~", Left, 140),
        ("===", Left, 140),
        ("!==", Left, 140),
        ("<", Left, 150),
        (">", Left, 150),
        ("<=", Left, 150),
        (">=", Left, 150),
        ("|>", Left, 160),
        ("<<<", Left, 160),
        (">>>", Left, 160),
        ("<<~", Left, 160),
        ("~>>", Left, 160),
        ("<~", Left, 160),
        ("~>", Left, 160),
        ("<~>", Left, 160),
        ("<|>", Left, 160),
        ("in", Left, 170),
        ("^^^", Left, 180),
        ("++", Right, 200),
        ("--", Right, 200),
        ("<>", Right, 200),
        ("..", Right, 200),
        ("+", Left, 210),
        ("-", Left, 210),
        ("*", Left, 220),
        ("/", Left, 220),
        (".", Left, 310),
    ];

    for (name, associativity, precedence) in entries {
        table.insert(name, (associativity, precedence));
    }

    table
});

static UNARY_OPERATORS: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut table = HashMap::new();

    for name in ["+", "-", "!", "^", "not", "~~~"] {
        table.insert(name, 300u16);
    }
    table.insert("&", 90);
    table.insert("@", 320);

    table
});

/// Associativity and precedence rank for a binary operator name, or `None`
/// for non-operators.
pub fn binary_operator(name: &str) -> Option<(Associativity, u16)> {
    BINARY_OPERATORS.get(name).copied()
}

/// Precedence rank for a unary operator name, or `None` for non-operators.
pub fn unary_operator(name: &str) -> Option<u16> {
    UNARY_OPERATORS.get(name).copied()
}

/// Whether `name` names any operator, binary or unary.
pub fn is_operator(name: &str) -> bool {
    binary_operator(name).is_some() || unary_operator(name).is_some()
}
