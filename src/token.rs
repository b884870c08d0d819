//! Token tree produced by the search parser
//!
//! Every token records the byte span it was built from. The tree is
//! constructed bottom-up by [`crate::parser::builder::TokenBuilder`] and is
//! never mutated afterward; annotations (`invalid` / `warning`) are part of
//! each node from the moment it exists.

use std::fmt;

use serde::Serialize;

use crate::{
    error::QueryReport,
    expr::{self, Expr},
    flatten::{self, FlatToken, HighlightSpan},
    value::TypedValue,
};

/// Byte offsets `[start, end)` into the original query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Zero-width span at `pos`
    pub fn empty_at(pos: usize) -> Self {
        Span {
            start: pos,
            end: pos,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

impl From<pest::Span<'_>> for Span {
    fn from(span: pest::Span<'_>) -> Self {
        Span::new(span.start(), span.end())
    }
}

/// Explanation attached to an invalid or suspicious token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub reason: String,
}

impl Annotation {
    pub fn new(reason: impl Into<String>) -> Self {
        Annotation {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Flat token kinds, one per highlightable piece of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    FreeText,
    Spaces,
    LogicBoolean,
    ParenOpen,
    ParenClose,
    Negation,
    KeySimple,
    KeyExplicitTag,
    KeyAggregate,
    Separator,
    Operator,
    ValueText,
    ValueNumber,
    ValueDuration,
    ValueSize,
    ValuePercentage,
    ValueBoolean,
    ValueIso8601Date,
    ValueRelativeDate,
    ValueTextList,
    ValueNumberList,
}

/// A top-level or grouped token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Token {
    Spaces(Spaces),
    FreeText(FreeText),
    LogicBoolean(LogicBoolean),
    LogicGroup(LogicGroup),
    Paren(Paren),
    Filter(Filter),
}

impl Token {
    pub fn span(&self) -> Span {
        match self {
            Token::Spaces(t) => t.span,
            Token::FreeText(t) => t.span,
            Token::LogicBoolean(t) => t.span,
            Token::LogicGroup(t) => t.span,
            Token::Paren(t) => t.span,
            Token::Filter(t) => t.span,
        }
    }

    /// Source text this token was built from
    pub fn text(&self) -> &str {
        match self {
            Token::Spaces(t) => &t.text,
            Token::FreeText(t) => &t.text,
            Token::LogicBoolean(t) => &t.text,
            Token::LogicGroup(t) => &t.text,
            Token::Paren(t) => &t.text,
            Token::Filter(t) => &t.text,
        }
    }

    /// Annotation on this node only; see [`crate::expr::has_invalid`] for the subtree
    pub fn invalid(&self) -> Option<&Annotation> {
        match self {
            Token::Spaces(_) => None,
            Token::FreeText(t) => t.invalid.as_ref(),
            Token::LogicBoolean(t) => t.invalid.as_ref(),
            Token::LogicGroup(t) => t.invalid.as_ref(),
            Token::Paren(t) => Some(&t.invalid),
            Token::Filter(t) => t.invalid.as_ref(),
        }
    }

    pub fn warning(&self) -> Option<&Annotation> {
        match self {
            Token::FreeText(t) => t.warning.as_ref(),
            Token::Filter(t) => t.warning.as_ref(),
            _ => None,
        }
    }

    pub fn as_filter(&self) -> Option<&Filter> {
        match self {
            Token::Filter(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_spaces(&self) -> bool {
        matches!(self, Token::Spaces(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spaces {
    pub span: Span,
    pub text: String,
}

/// Untagged search term: a run of bare words or a quoted phrase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreeText {
    pub span: Span,
    pub text: String,
    /// Search term without quotes and escapes
    pub value: String,
    pub quoted: bool,
    pub invalid: Option<Annotation>,
    pub warning: Option<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicBoolean {
    pub span: Span,
    pub text: String,
    pub operator: BooleanOperator,
    pub invalid: Option<Annotation>,
}

/// Balanced `( ... )` group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogicGroup {
    pub span: Span,
    pub text: String,
    pub open: Span,
    pub close: Span,
    pub inner: Vec<Token>,
    pub invalid: Option<Annotation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParenSide {
    Open,
    Close,
}

/// Parenthesis without a partner; always invalid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paren {
    pub span: Span,
    pub text: String,
    pub side: ParenSide,
    pub invalid: Annotation,
}

/// How a filter's value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    Text,
    TextIn,
    Number,
    NumberIn,
    Duration,
    Size,
    Percentage,
    Boolean,
    Date,
    RelativeDate,
}

/// `[!]key:[operator]value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filter {
    pub span: Span,
    pub text: String,
    pub kind: FilterKind,
    pub negation: Option<Span>,
    pub key: Key,
    pub separator: Span,
    pub operator: Operator,
    pub operator_span: Option<Span>,
    pub value: ValueToken,
    pub invalid: Option<Annotation>,
    pub warning: Option<Annotation>,
}

impl Filter {
    pub fn negated(&self) -> bool {
        self.negation.is_some()
    }

    pub fn key_name(&self) -> &str {
        self.key.name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Key {
    Simple(KeySimple),
    ExplicitTag(KeyExplicitTag),
    Aggregate(KeyAggregate),
}

impl Key {
    /// Name used for registry lookup: the key itself, the tag inside
    /// `tags[...]`, or the aggregate function name
    pub fn name(&self) -> &str {
        match self {
            Key::Simple(k) => &k.text,
            Key::ExplicitTag(k) => &k.key,
            Key::Aggregate(k) => &k.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Key::Simple(k) => k.span,
            Key::ExplicitTag(k) => k.span,
            Key::Aggregate(k) => k.span,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Key::Simple(k) => &k.text,
            Key::ExplicitTag(k) => &k.text,
            Key::Aggregate(k) => &k.text,
        }
    }

    pub fn token_kind(&self) -> TokenKind {
        match self {
            Key::Simple(_) => TokenKind::KeySimple,
            Key::ExplicitTag(_) => TokenKind::KeyExplicitTag,
            Key::Aggregate(_) => TokenKind::KeyAggregate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySimple {
    pub span: Span,
    pub text: String,
}

/// `tags[key]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyExplicitTag {
    pub span: Span,
    pub text: String,
    pub key: String,
}

/// `function(arg, ...)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyAggregate {
    pub span: Span,
    pub text: String,
    pub name: String,
    pub args: Vec<AggregateArg>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateArg {
    pub span: Span,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    /// No operator written
    #[default]
    Default,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Equal,
    NotEqual,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Operator::GreaterThan),
            ">=" => Some(Operator::GreaterThanEqual),
            "<" => Some(Operator::LessThan),
            "<=" => Some(Operator::LessThanEqual),
            "=" => Some(Operator::Equal),
            "!=" => Some(Operator::NotEqual),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Default => "",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
        }
    }

    /// Ordering comparisons, as opposed to (in)equality
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::GreaterThanEqual
                | Operator::LessThan
                | Operator::LessThanEqual
        )
    }
}

/// Value side of a filter, coerced against the key's kind
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueToken {
    /// Zero-width at the end of the filter when no value was written
    pub span: Span,
    pub text: String,
    pub kind: TokenKind,
    pub quoted: bool,
    /// `None` exactly when coercion failed
    pub value: Option<TypedValue>,
    pub invalid: Option<Annotation>,
}

/// One element of a `[a, b, c]` list value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    /// Span of the element itself, excluding surrounding whitespace
    pub span: Span,
    pub text: String,
    pub quoted: bool,
    pub value: Option<TypedValue>,
    pub invalid: Option<Annotation>,
}

/// Outcome of parsing one query string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    source: String,
    tokens: Vec<Token>,
}

impl ParseResult {
    pub(crate) fn new(source: String, tokens: Vec<Token>) -> Self {
        ParseResult { source, tokens }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn flatten(&self) -> Vec<FlatToken<'_>> {
        flatten::flatten(&self.tokens)
    }

    pub fn highlight(&self) -> Vec<HighlightSpan> {
        flatten::highlight(&self.tokens)
    }

    /// Exact reconstruction of the input
    pub fn to_source(&self) -> String {
        flatten::to_source(&self.tokens)
    }

    /// Canonical query string
    pub fn stringify(&self) -> String {
        flatten::stringify(&self.tokens)
    }

    pub fn expr(&self) -> Expr<'_> {
        Expr::from_tokens(&self.tokens)
    }

    pub fn has_invalid(&self) -> bool {
        expr::has_invalid(&self.tokens)
    }

    pub fn contains_filter_key(&self, key: &str) -> bool {
        expr::contains_filter_key(&self.tokens, key)
    }

    /// All filters in source order, including those nested in groups
    pub fn filters(&self) -> Vec<&Filter> {
        expr::find_filters(&self.tokens, |_| true)
    }

    pub fn report(&self) -> Option<QueryReport> {
        QueryReport::from_result(self)
    }
}
