use std::fs;

use search_syntax::{
    config::UnknownKeyPolicy, token::Token, QueryReport, SearchConfig, SearchError, SearchParser,
};
use slog::{o, Discard, Logger};
use tempdir::TempDir;

fn parser(config: SearchConfig) -> SearchParser {
    SearchParser::new(Logger::root(Discard, o!()), config).unwrap()
}

#[test]
fn test_config_file_round_trip() {
    let tmp_dir = TempDir::new("search-config").unwrap();
    let path = tmp_dir.path().join("search.json");
    fs::write(
        &path,
        r#"{
            "options": {"unknown_keys": "invalid", "allow_wildcard": false},
            "keys": {
                "service": {"kind": "text", "label": "Service"},
                "latency": {"kind": "duration"},
                "errors": {"kind": "number", "allow_list": false}
            }
        }"#,
    )
    .unwrap();

    let config = SearchConfig::from_file(&path).unwrap();
    assert_eq!(config.options.unknown_keys, UnknownKeyPolicy::Invalid);
    let parser = parser(config);

    let result = parser.parse("service:api latency:>200ms").unwrap();
    assert!(!result.has_invalid());

    for query in ["team:core", "service:api*", "errors:[1, 2]"] {
        let result = parser.parse(query).unwrap();
        assert!(result.has_invalid(), "{} should be invalid", query);
    }
}

#[test]
fn test_missing_config_file() {
    let tmp_dir = TempDir::new("search-config").unwrap();
    let path = tmp_dir.path().join("absent.json");

    let err = SearchConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, SearchError::ConfigIo { .. }));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_malformed_config_file() {
    let tmp_dir = TempDir::new("search-config").unwrap();
    let path = tmp_dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    let err = SearchConfig::from_file(&path).unwrap_err();
    assert!(matches!(err, SearchError::ConfigJson(_)));
}

#[test]
fn test_disabled_free_text() {
    let config = SearchConfig::from_json_str(
        r#"{"include_builtin": true, "options": {"allow_free_text": false}}"#,
    )
    .unwrap();
    let result = parser(config).parse("is:unresolved crash").unwrap();

    match &result.tokens()[2] {
        Token::FreeText(text) => assert!(text.invalid.is_some()),
        other => panic!("expected free text, got {:?}", other),
    }
}

#[test]
fn test_query_report() {
    let parser = parser(SearchConfig::default());

    let result = parser.parse("is:unresolved").unwrap();
    assert!(QueryReport::from_result(&result).is_none());

    let result = parser.parse("mystery:1 duration:>1x (").unwrap();
    let report = result.report().unwrap();
    assert_eq!(report.invalid_count(), 2);
    assert_eq!(report.warning_count(), 1);
    assert!(report.to_string().contains("2 invalid"));
}
