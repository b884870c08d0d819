use super::{Expr, Term};
use crate::token::Token;
use recursion::{Collapsible, MappableFrame, PartiallyApplied};

/// short-lived single layer of a boolean search expression, used for
/// expressing recursive algorithms over a single layer of a borrowed Expr
pub enum ExprFrame<X, T> {
    // borrowed filter or free text
    Term(T),
    // boolean operators
    And(X, X),
    Or(X, X),
    // literal values
    Literal(bool),
}

impl<T> MappableFrame for ExprFrame<PartiallyApplied, T> {
    type Frame<X> = ExprFrame<X, T>;

    fn map_frame<A, B>(input: Self::Frame<A>, mut f: impl FnMut(A) -> B) -> Self::Frame<B> {
        use ExprFrame::*;
        match input {
            And(a, b) => And(f(a), f(b)),
            Or(a, b) => Or(f(a), f(b)),
            Term(t) => Term(t),
            Literal(bool) => Literal(bool),
        }
    }
}

impl<'e, 'a> Collapsible for &'e Expr<'a> {
    type FrameToken = ExprFrame<PartiallyApplied, Term<'a>>;

    fn into_frame(self) -> ExprFrame<Self, Term<'a>> {
        match self {
            Expr::And(a, b) => ExprFrame::And(a, b),
            Expr::Or(a, b) => ExprFrame::Or(a, b),
            Expr::Term(t) => ExprFrame::Term(*t),
            Expr::Literal(b) => ExprFrame::Literal(*b),
        }
    }
}

/// single layer of the token tree: a token and its already-collapsed children
///
/// only groups have children
pub struct TokenFrame<'t, X> {
    pub token: &'t Token,
    pub children: Vec<X>,
}

impl<'t> MappableFrame for TokenFrame<'t, PartiallyApplied> {
    type Frame<X> = TokenFrame<'t, X>;

    fn map_frame<A, B>(input: Self::Frame<A>, f: impl FnMut(A) -> B) -> Self::Frame<B> {
        TokenFrame {
            token: input.token,
            children: input.children.into_iter().map(f).collect(),
        }
    }
}

impl<'t> Collapsible for &'t Token {
    type FrameToken = TokenFrame<'t, PartiallyApplied>;

    fn into_frame(self) -> TokenFrame<'t, Self> {
        let children = match self {
            Token::LogicGroup(group) => group.inner.iter().collect(),
            _ => Vec::new(),
        };
        TokenFrame {
            token: self,
            children,
        }
    }
}
