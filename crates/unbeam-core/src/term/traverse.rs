//! Generic quoted-form traversal
//!
//! A single reusable pre-order/post-order walker with a threaded accumulator.
//! Every rewrite pass goes through this one traversal so they all share the
//! same order contract: a node's head first (when it is itself a node), then
//! each argument in sequence order; pair left then right; list elements in
//! order.

use thiserror::Error;

use super::{Args, Node, Term};

/// Nesting ceiling for adversarially deep trees; trips well before the
/// native stack would.
const MAX_DEPTH: usize = 200;

/// Raised when a container that is not part of the quoted-form value space
/// reaches a traversal step. Continuing would risk rewriting a tree we do
/// not understand, so this propagates instead of being skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraverseError {
    #[error("cannot traverse a raw {0}-element tuple")]
    RawTuple(usize),
    #[error("cannot traverse a map term")]
    Map,
    #[error("term nesting exceeds the traversal depth ceiling")]
    TooDeep,
}

/// Apply `transform` to each node before descending into its children,
/// returning the rebuilt tree.
pub fn prewalk<F>(term: Term, transform: &mut F) -> Result<Term, TraverseError>
where
    F: FnMut(Term) -> Term,
{
    let (term, ()) = traverse(
        term,
        (),
        &mut |term, ()| (transform(term), ()),
        &mut |term, ()| (term, ()),
    )?;

    Ok(term)
}

/// Traverse `term` applying `pre` before descending into a node's children
/// and `post` after, threading `acc` through both hooks.
pub fn traverse<A, Pre, Post>(
    term: Term,
    acc: A,
    pre: &mut Pre,
    post: &mut Post,
) -> Result<(Term, A), TraverseError>
where
    Pre: FnMut(Term, A) -> (Term, A),
    Post: FnMut(Term, A) -> (Term, A),
{
    let (term, acc) = pre(term, acc);
    traverse_tail(term, acc, pre, post, 0)
}

fn traverse_tail<A, Pre, Post>(
    term: Term,
    acc: A,
    pre: &mut Pre,
    post: &mut Post,
    depth: usize,
) -> Result<(Term, A), TraverseError>
where
    Pre: FnMut(Term, A) -> (Term, A),
    Post: FnMut(Term, A) -> (Term, A),
{
    if depth > MAX_DEPTH {
        return Err(TraverseError::TooDeep);
    }

    match term {
        Term::Node(node) => {
            let Node { head, meta, args } = *node;

            let (head, acc) = if head.is_expression() {
                let (head, acc) = pre(head, acc);
                traverse_tail(head, acc, pre, post, depth + 1)?
            } else {
                (head, acc)
            };

            let (args, acc) = traverse_args(args, acc, pre, post, depth + 1)?;

            Ok(post(Term::Node(Box::new(Node::new(head, meta, args))), acc))
        }
        Term::Pair(left, right) => {
            let (left, acc) = pre(*left, acc);
            let (left, acc) = traverse_tail(left, acc, pre, post, depth + 1)?;
            let (right, acc) = pre(*right, acc);
            let (right, acc) = traverse_tail(right, acc, pre, post, depth + 1)?;

            Ok(post(Term::Pair(Box::new(left), Box::new(right)), acc))
        }
        Term::List(elements) => {
            let (elements, acc) = traverse_elements(elements, acc, pre, post, depth + 1)?;

            Ok(post(Term::List(elements), acc))
        }
        Term::Tuple(elements) => Err(TraverseError::RawTuple(elements.len())),
        Term::Map(_) => Err(TraverseError::Map),
        leaf => Ok(post(leaf, acc)),
    }
}

fn traverse_args<A, Pre, Post>(
    args: Args,
    acc: A,
    pre: &mut Pre,
    post: &mut Post,
    depth: usize,
) -> Result<(Args, A), TraverseError>
where
    Pre: FnMut(Term, A) -> (Term, A),
    Post: FnMut(Term, A) -> (Term, A),
{
    match args {
        Args::Context(context) => Ok((Args::Context(context), acc)),
        Args::List(elements) => {
            let (elements, acc) = traverse_elements(elements, acc, pre, post, depth)?;

            Ok((Args::List(elements), acc))
        }
    }
}

fn traverse_elements<A, Pre, Post>(
    elements: Vec<Term>,
    mut acc: A,
    pre: &mut Pre,
    post: &mut Post,
    depth: usize,
) -> Result<(Vec<Term>, A), TraverseError>
where
    Pre: FnMut(Term, A) -> (Term, A),
    Post: FnMut(Term, A) -> (Term, A),
{
    let mut traversed = Vec::with_capacity(elements.len());

    for element in elements {
        let (element, element_acc) = pre(element, acc);
        let (element, element_acc) = traverse_tail(element, element_acc, pre, post, depth)?;

        traversed.push(element);
        acc = element_acc;
    }

    Ok((traversed, acc))
}
