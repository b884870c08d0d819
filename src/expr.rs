pub mod frame;

use std::fmt::Display;

use recursion::CollapsibleExt;
use serde::Serialize;

use crate::{
    expr::frame::ExprFrame,
    token::{BooleanOperator, Filter, FreeText, Span, Token},
};

/// A search term the evaluator hands to its predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Term<'a> {
    Filter(&'a Filter),
    FreeText(&'a FreeText),
}

impl Display for Term<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Filter(filter) => write!(f, "{}", filter.text),
            Term::FreeText(text) => write!(f, "{}", text.text),
        }
    }
}

/// Boolean structure of a parsed query, borrowing its terms from the token tree
///
/// Adjacent terms are implicitly ANDed and `OR` binds more loosely than
/// `AND`, so `a b OR c` reads as `(a AND b) OR c`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    // boolean operators
    And(Box<Self>, Box<Self>),
    Or(Box<Self>, Box<Self>),
    // search terms
    Term(Term<'a>),
    // literal boolean values
    Literal(bool),
}

impl Display for Expr<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And(a, b) => write!(f, "({} AND {})", a, b),
            Self::Or(a, b) => write!(f, "({} OR {})", a, b),
            Self::Term(t) => write!(f, "{}", t),
            Self::Literal(b) => write!(f, "{}", b),
        }
    }
}

impl<'a> Expr<'a> {
    pub fn and(a: Self, b: Self) -> Self {
        Self::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Self, b: Self) -> Self {
        Self::Or(Box::new(a), Box::new(b))
    }

    /// Build the expression for a token sequence
    ///
    /// Whitespace, unbalanced parens and invalid connectives do not take
    /// part; an empty sequence is `Literal(true)`.
    pub fn from_tokens(tokens: &'a [Token]) -> Self {
        let mut alternatives: Vec<Vec<Expr<'a>>> = vec![Vec::new()];

        for token in tokens {
            let term = match token {
                Token::Filter(filter) => Expr::Term(Term::Filter(filter)),
                Token::FreeText(text) => Expr::Term(Term::FreeText(text)),
                Token::LogicGroup(group) => Expr::from_tokens(&group.inner),
                Token::LogicBoolean(boolean)
                    if boolean.invalid.is_none() && boolean.operator == BooleanOperator::Or =>
                {
                    alternatives.push(Vec::new());
                    continue;
                }
                Token::LogicBoolean(_) | Token::Spaces(_) | Token::Paren(_) => continue,
            };

            if let Some(current) = alternatives.last_mut() {
                current.push(term);
            }
        }

        alternatives
            .into_iter()
            .filter_map(|terms| terms.into_iter().reduce(Expr::and))
            .reduce(Expr::or)
            .unwrap_or(Expr::Literal(true))
    }

    /// Evaluate against a predicate; negated filters are passed as-is and
    /// the predicate decides what `!` means for them
    pub fn evaluate(&self, mut f: impl FnMut(Term<'a>) -> bool) -> bool {
        self.collapse_frames(|frame| match frame {
            ExprFrame::Term(t) => f(t),
            ExprFrame::And(a, b) => a && b,
            ExprFrame::Or(a, b) => a || b,
            ExprFrame::Literal(x) => x,
        })
    }

    /// Resolve the terms the predicate has an answer for and fold the
    /// resulting literals away
    pub fn reduce(&self, mut f: impl FnMut(Term<'a>) -> Option<bool>) -> Expr<'a> {
        self.collapse_frames(|frame| match frame {
            ExprFrame::Term(t) => match f(t) {
                Some(known) => Expr::Literal(known),
                None => Expr::Term(t),
            },
            ExprFrame::And(a, b) => match (a, b) {
                (Expr::Literal(false), _) => Expr::Literal(false),
                (_, Expr::Literal(false)) => Expr::Literal(false),
                (x, Expr::Literal(true)) => x,
                (Expr::Literal(true), x) => x,
                (a, b) => Expr::and(a, b),
            },
            ExprFrame::Or(a, b) => match (a, b) {
                (Expr::Literal(true), _) => Expr::Literal(true),
                (_, Expr::Literal(true)) => Expr::Literal(true),
                (x, Expr::Literal(false)) => x,
                (Expr::Literal(false), x) => x,
                (a, b) => Expr::or(a, b),
            },
            ExprFrame::Literal(x) => Expr::Literal(x),
        })
    }

    /// Terms in source order
    pub fn terms(&self) -> Vec<Term<'a>> {
        self.collapse_frames(|frame: ExprFrame<Vec<Term<'a>>, Term<'a>>| match frame {
            ExprFrame::Term(t) => vec![t],
            ExprFrame::And(mut a, b) | ExprFrame::Or(mut a, b) => {
                a.extend(b);
                a
            }
            ExprFrame::Literal(_) => Vec::new(),
        })
    }
}

/// Whether any token in the tree satisfies `f`
pub fn any_token(tokens: &[Token], f: impl Fn(&Token) -> bool) -> bool {
    tokens.iter().any(|token| {
        token.collapse_frames(|frame| f(frame.token) || frame.children.into_iter().any(|c| c))
    })
}

pub fn contains_filter_key(tokens: &[Token], key: &str) -> bool {
    any_token(tokens, |token| {
        token
            .as_filter()
            .map_or(false, |filter| filter.key_name() == key)
    })
}

/// Filters matching `f`, in source order, including those inside groups
pub fn find_filters<'t>(tokens: &'t [Token], f: impl Fn(&Filter) -> bool) -> Vec<&'t Filter> {
    tokens
        .iter()
        .flat_map(|token| {
            token.collapse_frames(|frame| {
                let mut found: Vec<&'t Filter> = frame.children.into_iter().flatten().collect();
                if let Token::Filter(filter) = frame.token {
                    if f(filter) {
                        found.push(filter);
                    }
                }
                found
            })
        })
        .collect()
}

pub fn has_invalid(tokens: &[Token]) -> bool {
    any_token(tokens, |token| token.invalid().is_some())
}

/// First invalid annotation in source order
pub fn first_invalid(tokens: &[Token]) -> Option<FoundAnnotation<'_>> {
    annotations(tokens)
        .into_iter()
        .find(|a| a.severity == Severity::Invalid)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Invalid,
    Warning,
}

/// An annotation located in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoundAnnotation<'t> {
    pub span: Span,
    pub severity: Severity,
    pub reason: &'t str,
}

/// Every invalid and warning annotation in the tree, in source order
///
/// Filter problems that came from the value point at the value; other
/// filter problems point at the whole filter.
pub fn annotations(tokens: &[Token]) -> Vec<FoundAnnotation<'_>> {
    tokens
        .iter()
        .flat_map(|token| {
            token.collapse_frames(|frame| {
                let mut found = own_annotations(frame.token);
                found.extend(frame.children.into_iter().flatten());
                found
            })
        })
        .collect()
}

fn own_annotations(token: &Token) -> Vec<FoundAnnotation<'_>> {
    let mut found = Vec::new();

    if let Token::Filter(filter) = token {
        if let Some(warning) = &filter.warning {
            found.push(FoundAnnotation {
                span: filter.key.span(),
                severity: Severity::Warning,
                reason: &warning.reason,
            });
        }
        if let Some(invalid) = &filter.invalid {
            let from_value = filter.value.invalid.as_ref() == Some(invalid);
            let span = if from_value && !filter.value.span.is_empty() {
                filter.value.span
            } else {
                filter.span
            };
            found.push(FoundAnnotation {
                span,
                severity: Severity::Invalid,
                reason: &invalid.reason,
            });
        }
        return found;
    }

    if let Some(invalid) = token.invalid() {
        let span = match token {
            Token::LogicGroup(group) => group.open,
            other => other.span(),
        };
        found.push(FoundAnnotation {
            span,
            severity: Severity::Invalid,
            reason: &invalid.reason,
        });
    }
    if let Some(warning) = token.warning() {
        found.push(FoundAnnotation {
            span: token.span(),
            severity: Severity::Warning,
            reason: &warning.reason,
        });
    }
    found
}
