use search_syntax::{flatten::FlatToken, parse_search, token::TokenKind, SearchConfig};

const QUERIES: &[&str] = &[
    "is:unresolved",
    "is:unresolved duration:>1h",
    "  leading and trailing  ",
    "foo bar baz",
    r#"message:"hello \"world\"" level:error"#,
    r#"message:"unclosed and more"#,
    "(is:unresolved OR is:ignored) AND level:error",
    "((a OR b) c) d",
    "unbalanced ( paren",
    "stray ) paren ) )",
    "event.type:[error, default,transaction]",
    "release:[ a , \"b c\" ,]",
    "!tags[browser]:Chrome p95(transaction.duration):<=1.5s count():>10",
    "https://sentry.io/issues/?query=is:unresolved",
    "firstSeen:-7d lastSeen:2024-01-31T12:00:00Z",
    "OR AND and or",
    "key: is:",
    "tabs\tand\nnewlines",
    "é ünïcode:välue \"ß\"",
    "foo:bar( baz",
    "is:unresolved(",
    "tags:(a) ((b)",
];

fn parse(input: &str) -> search_syntax::ParseResult {
    parse_search(input, &SearchConfig::default()).unwrap()
}

#[test]
fn test_to_source_is_exact() {
    for query in QUERIES {
        let result = parse(query);
        assert_eq!(&result.to_source(), query);

        let joined: String = result.flatten().iter().map(|t| t.text()).collect();
        assert_eq!(&joined, query);
    }
}

#[test]
fn test_flatten_is_idempotent() {
    for query in QUERIES {
        let result = parse(query);
        assert_eq!(result.flatten(), result.flatten(), "flatten differs for {:?}", query);
        assert_eq!(result.highlight(), result.highlight());
    }
}

#[test]
fn test_flatten_is_in_source_order() {
    for query in QUERIES {
        let result = parse(query);
        let mut pos = 0;
        for token in result.flatten() {
            let span = token.span();
            assert_eq!(span.start, pos, "out of order in {:?}", query);
            pos = span.end;
        }
        assert_eq!(pos, query.len());
    }
}

#[test]
fn test_highlight_covers_input() {
    for query in QUERIES {
        let result = parse(query);
        let covered: String = result
            .highlight()
            .iter()
            .map(|h| h.span.slice(query))
            .collect();
        assert_eq!(&covered, query);
    }
}

#[test]
fn test_two_filters_flatten() {
    let result = parse("is:unresolved duration:>1h");
    let flat = result.flatten();
    assert_eq!(flat.len(), 3);
    assert!(matches!(flat[0], FlatToken::Filter(_)));
    assert!(matches!(flat[1], FlatToken::Spaces(_)));
    assert!(matches!(flat[2], FlatToken::Filter(_)));

    let without_spaces: Vec<_> = flat.iter().filter(|t| !t.is_spaces()).collect();
    assert_eq!(without_spaces.len(), 2);

    let joined: String = flat.iter().map(|t| t.text()).collect();
    assert_eq!(joined, "is:unresolved duration:>1h");
}

#[test]
fn test_stringify_round_trip() {
    for query in QUERIES {
        let canonical = parse(query).stringify();
        if canonical.is_empty() {
            continue;
        }
        let reparsed = parse(&canonical);

        // canonical form is a fixed point
        assert_eq!(reparsed.stringify(), canonical, "for {:?}", query);

        // and it keeps the same non-whitespace structure
        let kinds = |r: &search_syntax::ParseResult| -> Vec<TokenKind> {
            r.highlight()
                .into_iter()
                .filter(|h| h.kind != TokenKind::Spaces)
                .map(|h| h.kind)
                .collect()
        };
        assert_eq!(kinds(&parse(query)), kinds(&reparsed), "for {:?}", query);
    }
}

#[test]
fn test_stringify_examples() {
    let cases = [
        ("is:unresolved   duration:>1h", "is:unresolved duration:>1h"),
        ("  ( a   OR b )  ", "(a OR b)"),
        ("release:[ 1.0 ,  2.0 ]", "release:[1.0,2.0]"),
        ("x and y", "x AND y"),
        ("!level:error", "!level:error"),
    ];

    for (input, expected) in cases {
        assert_eq!(parse(input).stringify(), expected);
    }
}
