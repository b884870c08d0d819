//! Turns raw lexical tokens into the annotated token tree
//!
//! This is where keys are looked up in the registry, values are coerced and
//! every user-input problem becomes an `invalid` or `warning` annotation.
//! Nothing here fails: the worst outcome for a token is an annotation.

use slog::{debug, Logger};

use super::{
    ast::{RawFilter, RawFreeText, RawGroup, RawKey, RawListEntry, RawListItem, RawToken, RawValue},
    raw::MAX_GROUP_DEPTH,
};
use crate::{
    config::{KeyDescriptor, SearchConfig, UnknownKeyPolicy},
    token::{
        AggregateArg, Annotation, BooleanOperator, Filter, FilterKind, FreeText, Key,
        KeyAggregate, KeyExplicitTag, KeySimple, ListItem, LogicBoolean, LogicGroup, Operator,
        Paren, ParenSide, Spaces, Span, Token, TokenKind, ValueToken,
    },
    value::{self, CoercionError, TypedValue, ValueKind},
};

/// Coarse shape of a raw token, used to check boolean placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Space,
    Term,
    Boolean,
    Paren,
}

impl Shape {
    fn of(token: &RawToken<'_>) -> Self {
        match token {
            RawToken::Spaces(_) => Shape::Space,
            RawToken::Boolean(_) => Shape::Boolean,
            RawToken::ParenOpen(_) | RawToken::ParenClose(_) | RawToken::DeepParen(_) => {
                Shape::Paren
            }
            RawToken::Group(_) | RawToken::Filter(_) | RawToken::FreeText(_) => Shape::Term,
        }
    }
}

/// Nearest non-whitespace tokens on either side
#[derive(Debug, Clone, Copy)]
struct Neighbors {
    before: Option<Shape>,
    after: Option<Shape>,
}

/// Registry lookup outcome for a filter key
struct ResolvedKey {
    kind: ValueKind,
    descriptor: Option<KeyDescriptor>,
    invalid: Option<Annotation>,
    warning: Option<Annotation>,
}

pub struct TokenBuilder<'c> {
    config: &'c SearchConfig,
    logger: Logger,
}

impl<'c> TokenBuilder<'c> {
    pub fn new(config: &'c SearchConfig, logger: Logger) -> Self {
        TokenBuilder { config, logger }
    }

    /// Build the token tree for a top-level token sequence
    pub fn build(&self, raw: Vec<RawToken<'_>>) -> Vec<Token> {
        self.build_list(raw)
    }

    fn build_list(&self, raw: Vec<RawToken<'_>>) -> Vec<Token> {
        let shapes: Vec<Shape> = raw.iter().map(Shape::of).collect();

        let tokens = raw
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let neighbors = Neighbors {
                    before: shapes[..i].iter().rev().copied().find(|s| *s != Shape::Space),
                    after: shapes[i + 1..].iter().copied().find(|s| *s != Shape::Space),
                };
                self.build_token(token, neighbors)
            })
            .collect();

        merge_free_text(tokens)
    }

    fn build_token(&self, raw: RawToken<'_>, neighbors: Neighbors) -> Token {
        match raw {
            RawToken::Spaces(span) => Token::Spaces(Spaces {
                span: span.into(),
                text: span.as_str().to_string(),
            }),
            RawToken::Boolean(span) => self.build_boolean(span, neighbors),
            RawToken::Group(group) => self.build_group(group),
            RawToken::ParenOpen(span) => Token::Paren(Paren {
                span: span.into(),
                text: span.as_str().to_string(),
                side: ParenSide::Open,
                invalid: Annotation::new("Unbalanced parenthesis: missing closing ')'"),
            }),
            RawToken::ParenClose(span) => Token::Paren(Paren {
                span: span.into(),
                text: span.as_str().to_string(),
                side: ParenSide::Close,
                invalid: Annotation::new("Unbalanced parenthesis: missing opening '('"),
            }),
            RawToken::DeepParen(span) => Token::Paren(Paren {
                span: span.into(),
                text: span.as_str().to_string(),
                side: if span.as_str() == "(" {
                    ParenSide::Open
                } else {
                    ParenSide::Close
                },
                invalid: Annotation::new(format!(
                    "Parentheses cannot be nested more than {} levels deep",
                    MAX_GROUP_DEPTH
                )),
            }),
            RawToken::Filter(filter) => self.build_filter(filter),
            RawToken::FreeText(text) => self.build_free_text(text),
        }
    }

    fn build_boolean(&self, span: pest::Span<'_>, neighbors: Neighbors) -> Token {
        let text = span.as_str();
        let operator = if text.eq_ignore_ascii_case("or") {
            BooleanOperator::Or
        } else {
            BooleanOperator::And
        };

        let invalid = if !self.config.options.allow_boolean {
            Some(Annotation::new(
                "Boolean operators are not supported in this search",
            ))
        } else if neighbors.before == Some(Shape::Boolean) {
            Some(Annotation::new("Logical operators cannot be repeated"))
        } else if neighbors.before != Some(Shape::Term) {
            Some(Annotation::new(format!(
                "{} must be preceded by a search term",
                operator.as_str()
            )))
        } else if neighbors.after != Some(Shape::Term) {
            Some(Annotation::new(format!(
                "{} must be followed by a search term",
                operator.as_str()
            )))
        } else {
            None
        };

        Token::LogicBoolean(LogicBoolean {
            span: span.into(),
            text: text.to_string(),
            operator,
            invalid,
        })
    }

    fn build_group(&self, group: RawGroup<'_>) -> Token {
        let invalid = (!self.config.options.allow_parens)
            .then(|| Annotation::new("Parentheses are not supported in this search"));

        Token::LogicGroup(LogicGroup {
            span: group.span.into(),
            text: group.span.as_str().to_string(),
            open: group.open.into(),
            close: group.close.into(),
            inner: self.build_list(group.inner),
            invalid,
        })
    }

    fn build_free_text(&self, raw: RawFreeText<'_>) -> Token {
        let (span, value, quoted, mut invalid) = match raw {
            RawFreeText::Word(span) => (span, span.as_str().to_string(), false, None),
            RawFreeText::Quoted {
                span,
                inner,
                terminated,
            } => {
                let invalid =
                    (!terminated).then(|| Annotation::new("Missing closing quote"));
                (span, value::unescape_quoted(inner.as_str()), true, invalid)
            }
        };

        if invalid.is_none() && !self.config.options.allow_free_text {
            invalid = Some(Annotation::new(
                "Free text is not supported in this search",
            ));
        }

        Token::FreeText(FreeText {
            span: span.into(),
            text: span.as_str().to_string(),
            value,
            quoted,
            invalid,
            warning: None,
        })
    }

    fn build_filter(&self, raw: RawFilter<'_>) -> Token {
        let key = build_key(&raw.key);
        let resolved = self.resolve_key(&key);

        if is_free_text_fallback(&raw, &resolved) {
            debug!(self.logger, "treating filter-like text as free text"; "text" => raw.span.as_str());
            return self.build_free_text(RawFreeText::Word(raw.span));
        }

        let operator = raw
            .operator
            .and_then(|op| Operator::parse(op.as_str()))
            .unwrap_or_default();
        let value_pos = raw.operator.unwrap_or(raw.separator).end();
        let value = self.build_value(raw.value.as_ref(), &resolved, value_pos);

        let negation_invalid = (raw.negation.is_some() && !self.config.options.allow_negation)
            .then(|| Annotation::new("Negation is not supported in this search"));

        let operator_invalid = if value.value.as_ref().and_then(TypedValue::list_items).is_some()
            && operator != Operator::Default
        {
            Some(Annotation::new(format!(
                "Operator {} cannot be used with a list of values",
                operator.as_str()
            )))
        } else if operator.is_comparison() && !resolved.kind.supports_comparison() {
            Some(Annotation::new(format!(
                "Operator {} is not valid for {} values",
                operator.as_str(),
                resolved.kind
            )))
        } else {
            None
        };

        let invalid = resolved
            .invalid
            .or(negation_invalid)
            .or(operator_invalid)
            .or_else(|| value.invalid.clone());

        Token::Filter(Filter {
            span: raw.span.into(),
            text: raw.span.as_str().to_string(),
            kind: filter_kind(resolved.kind, &value),
            negation: raw.negation.map(Span::from),
            key,
            separator: raw.separator.into(),
            operator,
            operator_span: raw.operator.map(Span::from),
            value,
            invalid,
            warning: resolved.warning,
        })
    }

    fn resolve_key(&self, key: &Key) -> ResolvedKey {
        let registry = &self.config.registry;

        match key {
            Key::Simple(simple) => match registry.lookup(&simple.text) {
                Some(descriptor) => ResolvedKey {
                    kind: descriptor.kind,
                    invalid: descriptor.aggregate.then(|| {
                        Annotation::new(format!(
                            "{} is an aggregate function and must be written as {}(...)",
                            simple.text, simple.text
                        ))
                    }),
                    descriptor: Some(descriptor),
                    warning: None,
                },
                None => {
                    debug!(self.logger, "unknown search key"; "key" => &simple.text);
                    let reason = || {
                        Annotation::new(format!(
                            "\"{}\" is not a recognized search key",
                            simple.text
                        ))
                    };
                    let (invalid, warning) = match self.config.options.unknown_keys {
                        UnknownKeyPolicy::Warn => (None, Some(reason())),
                        UnknownKeyPolicy::Invalid => (Some(reason()), None),
                        UnknownKeyPolicy::Allow => (None, None),
                    };
                    ResolvedKey {
                        kind: ValueKind::Text,
                        descriptor: None,
                        invalid,
                        warning,
                    }
                }
            },
            // custom tags are always text and never unknown
            Key::ExplicitTag(_) => ResolvedKey {
                kind: ValueKind::Text,
                descriptor: None,
                invalid: None,
                warning: None,
            },
            Key::Aggregate(aggregate) => match registry.lookup(&aggregate.name) {
                Some(descriptor) => ResolvedKey {
                    kind: descriptor.kind,
                    invalid: (!descriptor.aggregate).then(|| {
                        Annotation::new(format!(
                            "{} is not an aggregate function",
                            aggregate.name
                        ))
                    }),
                    descriptor: Some(descriptor),
                    warning: None,
                },
                None => {
                    debug!(self.logger, "unknown aggregate function"; "function" => &aggregate.name);
                    ResolvedKey {
                        kind: ValueKind::Number,
                        descriptor: None,
                        invalid: None,
                        warning: Some(Annotation::new(format!(
                            "\"{}\" is not a recognized aggregate function",
                            aggregate.name
                        ))),
                    }
                }
            },
        }
    }

    fn build_value(
        &self,
        raw: Option<&RawValue<'_>>,
        resolved: &ResolvedKey,
        value_pos: usize,
    ) -> ValueToken {
        let kind = resolved.kind;

        let (span, text, quoted, result) = match raw {
            None => (
                Span::empty_at(value_pos),
                String::new(),
                false,
                Err(CoercionError::Empty.reason()),
            ),
            Some(RawValue::Quoted {
                span,
                terminated: false,
                ..
            }) => (
                Span::from(*span),
                span.as_str().to_string(),
                true,
                Err("Missing closing quote".to_string()),
            ),
            Some(RawValue::Quoted {
                span,
                inner,
                terminated: true,
            }) => {
                let unescaped = value::unescape_quoted(inner.as_str());
                let result = self
                    .coerce_scalar(kind, resolved.descriptor.as_ref(), &unescaped, true)
                    .map_err(|e| e.reason());
                (Span::from(*span), span.as_str().to_string(), true, result)
            }
            Some(RawValue::Bare(span)) => {
                let text = span.as_str();
                let result = if text.starts_with('[') && !text.contains(']') {
                    Err("Unterminated list; expected ']'".to_string())
                } else {
                    self.coerce_scalar(kind, resolved.descriptor.as_ref(), text, false)
                        .map_err(|e| e.reason())
                };
                (Span::from(*span), text.to_string(), false, result)
            }
            Some(RawValue::List { span, entries }) => {
                return self.build_list_value(*span, entries, resolved);
            }
        };

        match result {
            Ok(value) => ValueToken {
                span,
                text,
                kind: value.token_kind(),
                quoted,
                value: Some(value),
                invalid: None,
            },
            Err(reason) => ValueToken {
                span,
                text,
                kind: kind.token_kind(),
                quoted,
                value: None,
                invalid: Some(Annotation::new(reason)),
            },
        }
    }

    fn build_list_value(
        &self,
        span: pest::Span<'_>,
        entries: &[RawListEntry<'_>],
        resolved: &ResolvedKey,
    ) -> ValueToken {
        let (item_kind, kind) = match resolved.kind.list_token_kind() {
            Some(kind) => (resolved.kind, kind),
            None => (ValueKind::Text, TokenKind::ValueTextList),
        };
        let descriptor = resolved.descriptor.as_ref();
        let only_blank = entries.len() == 1 && entries[0].item.is_none();

        let items: Vec<ListItem> = if only_blank {
            Vec::new()
        } else {
            entries
                .iter()
                .map(|entry| self.build_list_item(entry, item_kind, descriptor))
                .collect()
        };

        let allows_list = match descriptor {
            Some(d) => d.allows_list(),
            None => resolved.kind.supports_list(),
        };

        let invalid = if !allows_list {
            Some(Annotation::new(format!(
                "{} values cannot be given as a list",
                resolved.kind
            )))
        } else if only_blank {
            Some(Annotation::new("Lists must contain at least one value"))
        } else {
            items.iter().find_map(|item| item.invalid.clone())
        };

        let value = if item_kind == ValueKind::Number {
            TypedValue::NumberList(items)
        } else {
            TypedValue::TextList(items)
        };

        ValueToken {
            span: span.into(),
            text: span.as_str().to_string(),
            kind,
            quoted: false,
            value: Some(value),
            invalid,
        }
    }

    fn build_list_item(
        &self,
        entry: &RawListEntry<'_>,
        kind: ValueKind,
        descriptor: Option<&KeyDescriptor>,
    ) -> ListItem {
        let (span, text, quoted, result) = match &entry.item {
            None => (
                Span::from(entry.span),
                String::new(),
                false,
                Err("Lists should not have empty values".to_string()),
            ),
            Some(RawListItem::Bare(span)) => (
                Span::from(*span),
                span.as_str().to_string(),
                false,
                self.coerce_scalar(kind, descriptor, span.as_str(), false)
                    .map_err(|e| e.reason()),
            ),
            Some(RawListItem::Quoted { span, inner }) => {
                let unescaped = value::unescape_quoted(inner.as_str());
                (
                    Span::from(*span),
                    span.as_str().to_string(),
                    true,
                    self.coerce_scalar(kind, descriptor, &unescaped, true)
                        .map_err(|e| e.reason()),
                )
            }
        };

        match result {
            Ok(value) => ListItem {
                span,
                text,
                quoted,
                value: Some(value),
                invalid: None,
            },
            Err(reason) => ListItem {
                span,
                text,
                quoted,
                value: None,
                invalid: Some(Annotation::new(reason)),
            },
        }
    }

    /// Coerce one literal, then apply wildcard and allowed-value rules
    fn coerce_scalar(
        &self,
        kind: ValueKind,
        descriptor: Option<&KeyDescriptor>,
        text: &str,
        quoted: bool,
    ) -> Result<TypedValue, CoercionError> {
        let value = if quoted && text.is_empty() && kind == ValueKind::Text {
            TypedValue::Text(String::new())
        } else {
            value::coerce(kind, text)?
        };

        if kind == ValueKind::Text {
            if !self.config.options.allow_wildcard && text.contains('*') {
                return Err(CoercionError::Wildcard);
            }
            if let Some(allowed) = descriptor.and_then(|d| d.allowed_values.as_deref()) {
                value::check_allowed(text, allowed)?;
            }
        }

        Ok(value)
    }
}

fn build_key(raw: &RawKey<'_>) -> Key {
    match raw {
        RawKey::Simple(span) => Key::Simple(KeySimple {
            span: (*span).into(),
            text: span.as_str().to_string(),
        }),
        RawKey::ExplicitTag { span, name } => Key::ExplicitTag(KeyExplicitTag {
            span: (*span).into(),
            text: span.as_str().to_string(),
            key: name.as_str().to_string(),
        }),
        RawKey::Aggregate { span, name, args } => Key::Aggregate(KeyAggregate {
            span: (*span).into(),
            text: span.as_str().to_string(),
            name: name.as_str().to_string(),
            args: args
                .iter()
                .map(|arg| AggregateArg {
                    span: (*arg).into(),
                    text: arg.as_str().to_string(),
                })
                .collect(),
        }),
    }
}

/// Unknown simple keys with nothing after the colon, or a URL remainder
/// (`https://...`), read as plain search text rather than a broken filter
fn is_free_text_fallback(raw: &RawFilter<'_>, resolved: &ResolvedKey) -> bool {
    let unknown_simple = matches!(raw.key, RawKey::Simple(_)) && resolved.descriptor.is_none();
    if !unknown_simple || raw.operator.is_some() {
        return false;
    }

    match &raw.value {
        None => true,
        Some(RawValue::Bare(span)) => span.as_str().starts_with("//"),
        Some(_) => false,
    }
}

fn filter_kind(kind: ValueKind, value: &ValueToken) -> FilterKind {
    match (kind, &value.value) {
        (_, Some(TypedValue::TextList(_))) => FilterKind::TextIn,
        (_, Some(TypedValue::NumberList(_))) => FilterKind::NumberIn,
        (ValueKind::Date, Some(TypedValue::RelativeDate(_))) => FilterKind::RelativeDate,
        (ValueKind::Date, _) => FilterKind::Date,
        (ValueKind::Text, _) => FilterKind::Text,
        (ValueKind::Number, _) => FilterKind::Number,
        (ValueKind::Duration, _) => FilterKind::Duration,
        (ValueKind::Size, _) => FilterKind::Size,
        (ValueKind::Percentage, _) => FilterKind::Percentage,
        (ValueKind::Boolean, _) => FilterKind::Boolean,
    }
}

fn is_mergeable(text: &FreeText) -> bool {
    !text.quoted && text.invalid.is_none() && text.warning.is_none()
}

/// Join bare words separated only by whitespace into a single free text run
fn merge_free_text(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());

    for token in tokens {
        let merged = match (&token, out.as_slice()) {
            (Token::FreeText(word), [.., Token::FreeText(prev), Token::Spaces(gap)])
                if is_mergeable(word) && is_mergeable(prev) =>
            {
                let text = format!("{}{}{}", prev.text, gap.text, word.text);
                Some(FreeText {
                    span: Span::new(prev.span.start, word.span.end),
                    value: text.clone(),
                    text,
                    quoted: false,
                    invalid: None,
                    warning: None,
                })
            }
            _ => None,
        };

        match merged {
            Some(run) => {
                out.truncate(out.len() - 2);
                out.push(Token::FreeText(run));
            }
            None => out.push(token),
        }
    }

    out
}
