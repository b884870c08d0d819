use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{
    expr::{annotations, Severity},
    parser::raw::Rule,
    token::ParseResult,
    value::ValueKind,
};

/// Errors that stop a search from being parsed at all
///
/// User-input problems never end up here; they are attached to the tokens
/// of a successful parse. These variants cover caller misconfiguration and
/// grammar bugs.
#[derive(Debug, Diagnostic, Error)]
pub enum SearchError {
    #[error("Syntax error at line {line}, column {col}")]
    #[diagnostic(code(search::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("{expected_msg}")]
        span: SourceSpan,
        expected_msg: String,
        line: usize,
        col: usize,
    },

    #[error("Empty search query")]
    #[diagnostic(code(search::empty))]
    Empty,

    #[error("Invalid key registry")]
    #[diagnostic(
        code(search::registry),
        help("Check the key descriptors supplied to the search parser")
    )]
    Registry(#[from] RegistryError),

    #[error("Failed to read search config {path}")]
    #[diagnostic(code(search::config_io))]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid search config")]
    #[diagnostic(
        code(search::config_json),
        help("Expected a JSON object with an optional \"options\" table and a \"keys\" table")
    )]
    ConfigJson(#[from] serde_json::Error),

    #[error("Internal parser error: {message}")]
    #[diagnostic(code(search::internal))]
    Internal { message: String },
}

impl SearchError {
    /// Create a syntax error from a pest error
    pub fn from_pest(pest_err: Box<pest::error::Error<Rule>>, src: String) -> Self {
        use pest::error::{ErrorVariant, InputLocation, LineColLocation};

        let span: SourceSpan = match pest_err.location {
            InputLocation::Pos(pos) if pos >= src.len() && pos > 0 => (pos - 1, 1).into(),
            InputLocation::Pos(pos) => (pos, usize::from(pos < src.len())).into(),
            InputLocation::Span((start, end)) => (start, end.saturating_sub(start).max(1)).into(),
        };

        let (line, col) = match pest_err.line_col {
            LineColLocation::Pos((line, col)) => (line, col),
            LineColLocation::Span((line, col), _) => (line, col),
        };

        let expected_msg = match &pest_err.variant {
            ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
                let names: Vec<String> = positives.iter().map(|r| format!("{:?}", r)).collect();
                format!("Expected one of: {}", names.join(", "))
            }
            ErrorVariant::ParsingError { .. } => "Unexpected input".to_string(),
            ErrorVariant::CustomError { message } => message.clone(),
        };

        SearchError::Syntax {
            src,
            span,
            expected_msg,
            line,
            col,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        SearchError::Internal {
            message: msg.into(),
        }
    }
}

/// Caller misconfiguration in a key registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid search key name {name:?}: keys may only contain letters, digits, '_', '.' and '-'")]
    InvalidKeyName { name: String },

    #[error("Key {name:?} lists allowed values but has kind {kind}; only text keys can restrict values")]
    AllowedValuesOnNonText { name: String, kind: ValueKind },

    #[error("Key {name:?} has an empty set of allowed values")]
    EmptyAllowedValues { name: String },

    #[error("Key {name:?} enables lists but {kind} values have no list form")]
    ListsUnsupported { name: String, kind: ValueKind },
}

/// Renderable report of every invalid and warning token in a parsed query
#[derive(Debug, Diagnostic, Error)]
#[error("{summary}")]
#[diagnostic(code(search::query))]
pub struct QueryReport {
    summary: String,
    #[source_code]
    src: NamedSource<String>,
    #[label(collection)]
    labels: Vec<LabeledSpan>,
    #[help]
    help: Option<String>,
    invalid: usize,
    warnings: usize,
}

impl QueryReport {
    /// Build a report for a parse result, or `None` when nothing is flagged
    pub fn from_result(result: &ParseResult) -> Option<Self> {
        let found = annotations(result.tokens());
        if found.is_empty() {
            return None;
        }

        let invalid = found
            .iter()
            .filter(|a| a.severity == Severity::Invalid)
            .count();
        let warnings = found.len() - invalid;

        let labels = found
            .iter()
            .map(|a| {
                let label = match a.severity {
                    Severity::Invalid => a.reason.to_string(),
                    Severity::Warning => format!("warning: {}", a.reason),
                };
                LabeledSpan::new_with_span(Some(label), (a.span.start, a.span.len()))
            })
            .collect();

        let summary = match (invalid, warnings) {
            (0, w) => format!("Search query has {} warning(s)", w),
            (i, 0) => format!("Search query has {} invalid token(s)", i),
            (i, w) => format!(
                "Search query has {} invalid token(s) and {} warning(s)",
                i, w
            ),
        };

        let help = (invalid > 0).then(|| {
            "Invalid tokens are ignored when the query is sent; fix them to filter on them"
                .to_string()
        });

        Some(QueryReport {
            summary,
            src: NamedSource::new("query", result.source().to_string()),
            labels,
            help,
            invalid,
            warnings,
        })
    }

    pub fn invalid_count(&self) -> usize {
        self.invalid
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }
}
