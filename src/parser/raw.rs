use pest::{
    iterators::{Pair, Pairs},
    Parser,
};
use pest_derive::Parser;

use super::ast::{RawFilter, RawFreeText, RawGroup, RawKey, RawListEntry, RawListItem, RawToken, RawValue};
use crate::error::SearchError;

/// Groups nested deeper than this are not built; their parens are kept as
/// `RawToken::DeepParen` and the tokens between them stay in the enclosing group.
pub const MAX_GROUP_DEPTH: usize = 64;

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
pub struct RawParser;

impl RawParser {
    /// Tokenize a search query into raw lexical tokens
    ///
    /// The grammar accepts every input, so an error here means the grammar
    /// itself is broken rather than the query.
    pub fn parse_raw_tokens(input: &str) -> Result<Vec<RawToken<'_>>, SearchError> {
        let mut pairs = Self::parse(Rule::query, input)
            .map_err(|e| SearchError::from_pest(Box::new(e), input.to_string()))?;

        let query_pair = pairs
            .next()
            .ok_or_else(|| SearchError::internal("Grammar guarantees query exists"))?;

        let flat = Self::parse_items(query_pair.into_inner())?;
        Ok(nest_groups(flat))
    }

    fn parse_items(pairs: Pairs<'_, Rule>) -> Result<Vec<RawToken<'_>>, SearchError> {
        pairs
            .filter(|pair| pair.as_rule() != Rule::EOI)
            .map(Self::parse_item)
            .collect()
    }

    fn parse_item(pair: Pair<'_, Rule>) -> Result<RawToken<'_>, SearchError> {
        match pair.as_rule() {
            Rule::spaces => Ok(RawToken::Spaces(pair.as_span())),
            Rule::boolean => Ok(RawToken::Boolean(pair.as_span())),
            Rule::paren_open => Ok(RawToken::ParenOpen(pair.as_span())),
            Rule::paren_close => Ok(RawToken::ParenClose(pair.as_span())),
            Rule::filter => Self::parse_filter(pair),
            Rule::word => Ok(RawToken::FreeText(RawFreeText::Word(pair.as_span()))),
            Rule::quoted_text | Rule::unterminated_text => {
                let span = pair.as_span();
                let terminated = pair.as_rule() == Rule::quoted_text;
                let inner = Self::quoted_inner(pair)?;
                Ok(RawToken::FreeText(RawFreeText::Quoted {
                    span,
                    inner,
                    terminated,
                }))
            }
            rule => Err(SearchError::internal(format!(
                "Unexpected item rule: {:?}",
                rule
            ))),
        }
    }

    fn parse_filter(pair: Pair<'_, Rule>) -> Result<RawToken<'_>, SearchError> {
        let span = pair.as_span();

        let mut negation = None;
        let mut key = None;
        let mut separator = None;
        let mut operator = None;
        let mut value = None;

        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::negation => negation = Some(part.as_span()),
                Rule::simple_key => key = Some(RawKey::Simple(part.as_span())),
                Rule::explicit_tag_key => key = Some(Self::parse_explicit_tag(part)?),
                Rule::aggregate_key => key = Some(Self::parse_aggregate(part)?),
                Rule::separator => separator = Some(part.as_span()),
                Rule::operator => operator = Some(part.as_span()),
                Rule::bare_value => value = Some(RawValue::Bare(part.as_span())),
                Rule::quoted_value | Rule::unterminated_value => {
                    let span = part.as_span();
                    let terminated = part.as_rule() == Rule::quoted_value;
                    let inner = Self::quoted_inner(part)?;
                    value = Some(RawValue::Quoted {
                        span,
                        inner,
                        terminated,
                    });
                }
                Rule::list_value => value = Some(Self::parse_list(part)?),
                rule => {
                    return Err(SearchError::internal(format!(
                        "Unexpected filter rule: {:?}",
                        rule
                    )))
                }
            }
        }

        let key = key.ok_or_else(|| SearchError::internal("Grammar guarantees filter has key"))?;
        let separator = separator
            .ok_or_else(|| SearchError::internal("Grammar guarantees filter has separator"))?;

        Ok(RawToken::Filter(RawFilter {
            span,
            negation,
            key,
            separator,
            operator,
            value,
        }))
    }

    fn parse_explicit_tag(pair: Pair<'_, Rule>) -> Result<RawKey<'_>, SearchError> {
        let span = pair.as_span();
        let name = pair
            .into_inner()
            .next()
            .ok_or_else(|| SearchError::internal("Grammar guarantees explicit tag has name"))?;

        Ok(RawKey::ExplicitTag {
            span,
            name: name.as_span(),
        })
    }

    fn parse_aggregate(pair: Pair<'_, Rule>) -> Result<RawKey<'_>, SearchError> {
        let span = pair.as_span();
        let mut inner = pair.into_inner();

        let name = inner
            .next()
            .filter(|p| p.as_rule() == Rule::aggregate_name)
            .ok_or_else(|| SearchError::internal("Grammar guarantees aggregate has name"))?;
        let args = inner.map(|arg| arg.as_span()).collect();

        Ok(RawKey::Aggregate {
            span,
            name: name.as_span(),
            args,
        })
    }

    fn parse_list(pair: Pair<'_, Rule>) -> Result<RawValue<'_>, SearchError> {
        let span = pair.as_span();
        let mut entries = Vec::new();

        for entry in pair.into_inner() {
            let entry_span = entry.as_span();
            let item = match entry.into_inner().next() {
                None => None,
                Some(item) => match item.as_rule() {
                    Rule::bare_item => Some(RawListItem::Bare(item.as_span())),
                    Rule::quoted_value => {
                        let item_span = item.as_span();
                        let inner = Self::quoted_inner(item)?;
                        Some(RawListItem::Quoted {
                            span: item_span,
                            inner,
                        })
                    }
                    rule => {
                        return Err(SearchError::internal(format!(
                            "Unexpected list item rule: {:?}",
                            rule
                        )))
                    }
                },
            };
            entries.push(RawListEntry {
                span: entry_span,
                item,
            });
        }

        Ok(RawValue::List { span, entries })
    }

    fn quoted_inner(pair: Pair<'_, Rule>) -> Result<pest::Span<'_>, SearchError> {
        pair.into_inner()
            .next()
            .map(|inner| inner.as_span())
            .ok_or_else(|| SearchError::internal("Grammar guarantees quoted content exists"))
    }
}

/// Pair the flat paren tokens into groups
///
/// Runs in one pass with an explicit stack. A paren with no partner stays
/// a `ParenOpen`/`ParenClose`; matched parens past `MAX_GROUP_DEPTH` become
/// `DeepParen`.
fn nest_groups(flat: Vec<RawToken<'_>>) -> Vec<RawToken<'_>> {
    let mut paired = vec![false; flat.len()];
    let mut open = Vec::new();
    for (i, token) in flat.iter().enumerate() {
        match token {
            RawToken::ParenOpen(_) => open.push(i),
            RawToken::ParenClose(_) => {
                if let Some(j) = open.pop() {
                    paired[j] = true;
                    paired[i] = true;
                }
            }
            _ => {}
        }
    }

    let mut outer: Vec<(pest::Span<'_>, Vec<RawToken<'_>>)> = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0;

    for (token, paired) in flat.into_iter().zip(paired) {
        match token {
            RawToken::ParenOpen(span) if paired => {
                depth += 1;
                if depth > MAX_GROUP_DEPTH {
                    current.push(RawToken::DeepParen(span));
                } else {
                    outer.push((span, std::mem::take(&mut current)));
                }
            }
            RawToken::ParenClose(close) if paired => {
                if depth > MAX_GROUP_DEPTH {
                    current.push(RawToken::DeepParen(close));
                } else if let Some((open, parent)) = outer.pop() {
                    let inner = std::mem::replace(&mut current, parent);
                    current.push(RawToken::Group(RawGroup {
                        span: open.start_pos().span(&close.end_pos()),
                        open,
                        inner,
                        close,
                    }));
                }
                depth -= 1;
            }
            other => current.push(other),
        }
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_of(tokens: &[RawToken<'_>]) -> usize {
        tokens
            .iter()
            .filter_map(|t| match t {
                RawToken::Group(g) => Some(1 + depth_of(&g.inner)),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_groups_stop_at_max_depth() {
        let n = MAX_GROUP_DEPTH + 3;
        let input = format!("{}a{}", "(".repeat(n), ")".repeat(n));
        let tokens = RawParser::parse_raw_tokens(&input).unwrap();

        assert_eq!(depth_of(&tokens), MAX_GROUP_DEPTH);

        let mut innermost = &tokens;
        while let [RawToken::Group(g)] = innermost.as_slice() {
            innermost = &g.inner;
        }
        let deep = innermost
            .iter()
            .filter(|t| matches!(t, RawToken::DeepParen(_)))
            .count();
        assert_eq!(deep, 6);
    }

    #[test]
    fn test_stray_parens_do_not_nest() {
        let tokens = RawParser::parse_raw_tokens("(a (b)").unwrap();
        assert!(matches!(tokens[0], RawToken::ParenOpen(_)));
        assert!(matches!(&tokens[3], RawToken::Group(g) if g.span.as_str() == "(b)"));
        assert_eq!(depth_of(&tokens), 1);
    }
}
