//! Source-order traversals that turn the token tree back into flat sequences

use itertools::Itertools;
use serde::Serialize;

use crate::{
    token::{Filter, FreeText, LogicBoolean, LogicGroup, Paren, Span, Spaces, Token, TokenKind},
    value::TypedValue,
};

/// Leaf-level view of the tree; groups contribute their two parens
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatToken<'a> {
    Spaces(&'a Spaces),
    FreeText(&'a FreeText),
    LogicBoolean(&'a LogicBoolean),
    Filter(&'a Filter),
    GroupOpen(&'a LogicGroup),
    GroupClose(&'a LogicGroup),
    Paren(&'a Paren),
}

impl<'a> FlatToken<'a> {
    pub fn span(&self) -> Span {
        match self {
            FlatToken::Spaces(t) => t.span,
            FlatToken::FreeText(t) => t.span,
            FlatToken::LogicBoolean(t) => t.span,
            FlatToken::Filter(t) => t.span,
            FlatToken::GroupOpen(g) => g.open,
            FlatToken::GroupClose(g) => g.close,
            FlatToken::Paren(t) => t.span,
        }
    }

    pub fn text(&self) -> &'a str {
        match self {
            FlatToken::Spaces(t) => &t.text,
            FlatToken::FreeText(t) => &t.text,
            FlatToken::LogicBoolean(t) => &t.text,
            FlatToken::Filter(t) => &t.text,
            FlatToken::GroupOpen(_) => "(",
            FlatToken::GroupClose(_) => ")",
            FlatToken::Paren(t) => &t.text,
        }
    }

    pub fn is_spaces(&self) -> bool {
        matches!(self, FlatToken::Spaces(_))
    }
}

/// Pre-order, left-to-right flattening
pub fn flatten(tokens: &[Token]) -> Vec<FlatToken<'_>> {
    let mut out = Vec::with_capacity(tokens.len());
    flatten_into(tokens, &mut out);
    out
}

fn flatten_into<'a>(tokens: &'a [Token], out: &mut Vec<FlatToken<'a>>) {
    for token in tokens {
        match token {
            Token::Spaces(t) => out.push(FlatToken::Spaces(t)),
            Token::FreeText(t) => out.push(FlatToken::FreeText(t)),
            Token::LogicBoolean(t) => out.push(FlatToken::LogicBoolean(t)),
            Token::Filter(t) => out.push(FlatToken::Filter(t)),
            Token::Paren(t) => out.push(FlatToken::Paren(t)),
            Token::LogicGroup(g) => {
                out.push(FlatToken::GroupOpen(g));
                flatten_into(&g.inner, out);
                out.push(FlatToken::GroupClose(g));
            }
        }
    }
}

/// Exact reconstruction of the parsed input
pub fn to_source(tokens: &[Token]) -> String {
    flatten(tokens).iter().map(FlatToken::text).collect()
}

/// Canonical query string
///
/// Whitespace runs become a single space, list values are written as
/// `[a,b]`, and leading/trailing whitespace (including inside groups) is
/// dropped.
pub fn stringify(tokens: &[Token]) -> String {
    tokens
        .iter()
        .filter(|t| !t.is_spaces())
        .map(stringify_token)
        .join(" ")
}

fn stringify_token(token: &Token) -> String {
    match token {
        Token::Spaces(_) => " ".to_string(),
        Token::FreeText(t) if t.quoted => t.text.clone(),
        Token::FreeText(t) => t.text.split_whitespace().join(" "),
        Token::LogicBoolean(t) => t.operator.as_str().to_string(),
        Token::LogicGroup(g) => format!("({})", stringify(&g.inner)),
        Token::Paren(p) => p.text.clone(),
        Token::Filter(f) => stringify_filter(f),
    }
}

fn stringify_filter(filter: &Filter) -> String {
    let value = match filter.value.value.as_ref().and_then(TypedValue::list_items) {
        Some(items) => format!("[{}]", items.iter().map(|i| i.text.as_str()).join(",")),
        None => filter.value.text.clone(),
    };

    format!(
        "{}{}:{}{}",
        if filter.negated() { "!" } else { "" },
        filter.key.text(),
        filter.operator.as_str(),
        value
    )
}

/// A styled region for syntax highlighting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightSpan {
    pub span: Span,
    pub kind: TokenKind,
    pub invalid: bool,
    pub warning: bool,
}

/// Split the tree into highlight regions covering the input without gaps
///
/// Filters are broken into negation, key, separator, operator and value
/// regions. Zero-width regions (an absent value) are left out.
pub fn highlight(tokens: &[Token]) -> Vec<HighlightSpan> {
    let mut out = Vec::new();
    for token in flatten(tokens) {
        highlight_flat(token, &mut out);
    }
    out
}

fn push(out: &mut Vec<HighlightSpan>, span: Span, kind: TokenKind, invalid: bool, warning: bool) {
    if !span.is_empty() {
        out.push(HighlightSpan {
            span,
            kind,
            invalid,
            warning,
        });
    }
}

fn highlight_flat(token: FlatToken<'_>, out: &mut Vec<HighlightSpan>) {
    match token {
        FlatToken::Spaces(t) => push(out, t.span, TokenKind::Spaces, false, false),
        FlatToken::FreeText(t) => push(
            out,
            t.span,
            TokenKind::FreeText,
            t.invalid.is_some(),
            t.warning.is_some(),
        ),
        FlatToken::LogicBoolean(t) => {
            push(out, t.span, TokenKind::LogicBoolean, t.invalid.is_some(), false)
        }
        FlatToken::GroupOpen(g) => push(out, g.open, TokenKind::ParenOpen, g.invalid.is_some(), false),
        FlatToken::GroupClose(g) => {
            push(out, g.close, TokenKind::ParenClose, g.invalid.is_some(), false)
        }
        FlatToken::Paren(p) => {
            let kind = match p.side {
                crate::token::ParenSide::Open => TokenKind::ParenOpen,
                crate::token::ParenSide::Close => TokenKind::ParenClose,
            };
            push(out, p.span, kind, true, false)
        }
        FlatToken::Filter(f) => {
            let invalid = f.invalid.is_some();
            if let Some(negation) = f.negation {
                push(out, negation, TokenKind::Negation, invalid, false);
            }
            push(out, f.key.span(), f.key.token_kind(), invalid, f.warning.is_some());
            push(out, f.separator, TokenKind::Separator, invalid, false);
            if let Some(operator) = f.operator_span {
                push(out, operator, TokenKind::Operator, invalid, false);
            }
            push(
                out,
                f.value.span,
                f.value.kind,
                f.value.invalid.is_some(),
                false,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SearchConfig, parse_search};

    fn tokens(input: &str) -> Vec<Token> {
        parse_search(input, &SearchConfig::default())
            .unwrap()
            .into_tokens()
    }

    #[test]
    fn test_flatten_groups() {
        let tokens = tokens("(is:unresolved OR level:error) foo");
        let flat = flatten(&tokens);
        let texts: Vec<&str> = flat.iter().map(|t| t.text()).collect();
        assert_eq!(
            texts,
            vec!["(", "is:unresolved", " ", "OR", " ", "level:error", ")", " ", "foo"]
        );
    }

    #[test]
    fn test_stringify_normalizes_whitespace() {
        let tokens = tokens("  is:unresolved   ( level:error )  foo   bar ");
        assert_eq!(stringify(&tokens), "is:unresolved (level:error) foo bar");
    }

    #[test]
    fn test_stringify_lists() {
        let tokens = tokens("release:[ a ,  \"b c\" ]");
        assert_eq!(stringify(&tokens), "release:[a,\"b c\"]");
    }

    #[test]
    fn test_highlight_filter_parts() {
        let tokens = tokens("!duration:>1h");
        let kinds: Vec<TokenKind> = highlight(&tokens).iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Negation,
                TokenKind::KeySimple,
                TokenKind::Separator,
                TokenKind::Operator,
                TokenKind::ValueDuration,
            ]
        );
    }
}
