//! Value coercion: validation and normalization of filter value literals
//!
//! Every coercer returns `Result<_, CoercionError>`; the error's display text
//! becomes the `invalid` reason on the value token. Coercers never panic on
//! user input.

pub mod time;
pub mod units;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::{ListItem, TokenKind};

pub use self::time::{parse_date, parse_iso_date, parse_relative_date, IsoDate, RelativeDate};
pub use self::units::{parse_duration, parse_size, DurationUnit, DurationValue, SizeValue};

/// Value kind a registered key expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Number,
    Duration,
    Size,
    Percentage,
    Boolean,
    Date,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Duration => "duration",
            ValueKind::Size => "size",
            ValueKind::Percentage => "percentage",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
        }
    }

    /// Whether `>`, `<`, `>=` and `<=` are meaningful for this kind
    pub fn supports_comparison(&self) -> bool {
        matches!(
            self,
            ValueKind::Number
                | ValueKind::Duration
                | ValueKind::Size
                | ValueKind::Percentage
                | ValueKind::Date
        )
    }

    /// Whether `key:[a, b]` has a meaning for this kind
    pub fn supports_list(&self) -> bool {
        matches!(self, ValueKind::Text | ValueKind::Number)
    }

    /// Token kind for a scalar value of this kind
    pub fn token_kind(&self) -> TokenKind {
        match self {
            ValueKind::Text => TokenKind::ValueText,
            ValueKind::Number => TokenKind::ValueNumber,
            ValueKind::Duration => TokenKind::ValueDuration,
            ValueKind::Size => TokenKind::ValueSize,
            ValueKind::Percentage => TokenKind::ValuePercentage,
            ValueKind::Boolean => TokenKind::ValueBoolean,
            ValueKind::Date => TokenKind::ValueIso8601Date,
        }
    }

    /// Token kind for a list value of this kind, if lists are supported
    pub fn list_token_kind(&self) -> Option<TokenKind> {
        match self {
            ValueKind::Text => Some(TokenKind::ValueTextList),
            ValueKind::Number => Some(TokenKind::ValueNumberList),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A coerced value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Duration(DurationValue),
    Size(SizeValue),
    /// Normalized to a 0-1 fraction
    Percentage(f64),
    Boolean(bool),
    Iso8601Date(IsoDate),
    RelativeDate(RelativeDate),
    TextList(Vec<ListItem>),
    NumberList(Vec<ListItem>),
}

impl TypedValue {
    /// Token kind describing this value
    pub fn token_kind(&self) -> TokenKind {
        match self {
            TypedValue::Text(_) => TokenKind::ValueText,
            TypedValue::Number(_) => TokenKind::ValueNumber,
            TypedValue::Duration(_) => TokenKind::ValueDuration,
            TypedValue::Size(_) => TokenKind::ValueSize,
            TypedValue::Percentage(_) => TokenKind::ValuePercentage,
            TypedValue::Boolean(_) => TokenKind::ValueBoolean,
            TypedValue::Iso8601Date(_) => TokenKind::ValueIso8601Date,
            TypedValue::RelativeDate(_) => TokenKind::ValueRelativeDate,
            TypedValue::TextList(_) => TokenKind::ValueTextList,
            TypedValue::NumberList(_) => TokenKind::ValueNumberList,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn list_items(&self) -> Option<&[ListItem]> {
        match self {
            TypedValue::TextList(items) | TypedValue::NumberList(items) => Some(items),
            _ => None,
        }
    }
}

/// Reason a literal failed coercion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("Filter must have a value")]
    Empty,

    #[error("Invalid number \"{0}\". Expected a number, optionally followed by k, m or b")]
    InvalidNumber(String),

    #[error("\"{0}\" is not a finite number")]
    NonFinite(String),

    #[error("Invalid {kind} \"{text}\": missing number")]
    MissingNumber { kind: ValueKind, text: String },

    #[error("Invalid {kind} \"{text}\": missing unit. Expected one of: {expected}")]
    MissingUnit {
        kind: ValueKind,
        text: String,
        expected: &'static str,
    },

    #[error("Invalid {kind} unit \"{unit}\". Expected one of: {expected}")]
    UnknownUnit {
        kind: ValueKind,
        unit: String,
        expected: &'static str,
    },

    #[error("Invalid percentage \"{0}\". Expected a number followed by %, or a fraction")]
    InvalidPercentage(String),

    #[error("Invalid boolean \"{0}\". Expected true, false, 1 or 0")]
    InvalidBoolean(String),

    #[error("Invalid date \"{0}\". Expected an ISO-8601 date such as 2024-01-31 or 2024-01-31T12:00:00Z, or a relative date such as -7d")]
    InvalidDate(String),

    #[error("Invalid relative date \"{text}\": {detail}")]
    InvalidRelativeDate { text: String, detail: String },

    #[error("Invalid value \"{text}\". Expected one of: {allowed}")]
    NotAllowed { text: String, allowed: String },

    #[error("Wildcards are not supported in this search")]
    Wildcard,
}

impl CoercionError {
    /// Annotation reason for this failure
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Coerce a literal into a typed value of the given kind
pub fn coerce(kind: ValueKind, text: &str) -> Result<TypedValue, CoercionError> {
    if text.is_empty() {
        return Err(CoercionError::Empty);
    }

    match kind {
        ValueKind::Text => Ok(TypedValue::Text(text.to_string())),
        ValueKind::Number => parse_number(text).map(TypedValue::Number),
        ValueKind::Duration => parse_duration(text).map(TypedValue::Duration),
        ValueKind::Size => parse_size(text).map(TypedValue::Size),
        ValueKind::Percentage => parse_percentage(text).map(TypedValue::Percentage),
        ValueKind::Boolean => parse_boolean(text).map(TypedValue::Boolean),
        ValueKind::Date => parse_date(text),
    }
}

/// Parse a plain float with an optional `k`, `m` or `b` magnitude suffix
pub fn parse_number(text: &str) -> Result<f64, CoercionError> {
    let (digits, multiplier) = match text.char_indices().last() {
        Some((i, c)) if i > 0 => match c.to_ascii_lowercase() {
            'k' => (&text[..i], 1e3),
            'm' => (&text[..i], 1e6),
            'b' => (&text[..i], 1e9),
            _ => (text, 1.0),
        },
        _ => (text, 1.0),
    };

    let number =
        parse_plain(digits).ok_or_else(|| CoercionError::InvalidNumber(text.to_string()))?;

    let value = number * multiplier;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoercionError::NonFinite(text.to_string()))
    }
}

/// Parse `<number>%` into a fraction, or a bare fraction as-is
pub fn parse_percentage(text: &str) -> Result<f64, CoercionError> {
    let (digits, divisor) = match text.strip_suffix('%') {
        Some(digits) => (digits, 100.0),
        None => (text, 1.0),
    };

    parse_finite(digits)
        .map(|n| n / divisor)
        .ok_or_else(|| CoercionError::InvalidPercentage(text.to_string()))
}

pub fn parse_boolean(text: &str) -> Result<bool, CoercionError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CoercionError::InvalidBoolean(text.to_string())),
    }
}

/// Membership check against a key's allowed values
pub fn check_allowed(text: &str, allowed: &[String]) -> Result<(), CoercionError> {
    if allowed.iter().any(|a| a == text) {
        Ok(())
    } else {
        Err(CoercionError::NotAllowed {
            text: text.to_string(),
            allowed: allowed.join(", "),
        })
    }
}

/// Remove the escapes from the content of a quoted literal
///
/// `\"` and `\\` collapse to the escaped character; any other backslash is
/// kept verbatim.
pub fn unescape_quoted(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Plain float parse that refuses the textual forms of NaN and infinity
///
/// Overflowing literals such as `1e999` still parse (to infinity).
pub(crate) fn parse_plain(text: &str) -> Option<f64> {
    if !text.starts_with(|c: char| c.is_ascii_digit() || "+-.".contains(c)) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| !n.is_nan())
}

pub(crate) fn parse_finite(text: &str) -> Option<f64> {
    parse_plain(text).filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_plain() {
        assert_eq!(parse_number("42").unwrap(), 42.0);
        assert_eq!(parse_number("-1.5").unwrap(), -1.5);
        assert_eq!(parse_number(".5").unwrap(), 0.5);
        assert_eq!(parse_number("1e3").unwrap(), 1000.0);
    }

    #[test]
    fn test_number_magnitude_suffix() {
        assert_eq!(parse_number("2k").unwrap(), 2000.0);
        assert_eq!(parse_number("1.5m").unwrap(), 1_500_000.0);
        assert_eq!(parse_number("3B").unwrap(), 3e9);
    }

    #[test]
    fn test_number_rejects_non_finite() {
        assert!(matches!(parse_number("NaN"), Err(CoercionError::InvalidNumber(_))));
        assert!(matches!(parse_number("inf"), Err(CoercionError::InvalidNumber(_))));
        assert!(matches!(parse_number("1e999"), Err(CoercionError::NonFinite(_))));
        assert!(parse_number("abc").is_err());
        assert!(parse_number("k").is_err());
    }

    #[test]
    fn test_percentage() {
        assert_eq!(parse_percentage("50%").unwrap(), 0.5);
        assert_eq!(parse_percentage("0.25").unwrap(), 0.25);
        assert_eq!(parse_percentage("100%").unwrap(), 1.0);
        assert!(parse_percentage("%").is_err());
        assert!(parse_percentage("half").is_err());
    }

    #[test]
    fn test_boolean() {
        assert!(parse_boolean("true").unwrap());
        assert!(parse_boolean("TRUE").unwrap());
        assert!(parse_boolean("1").unwrap());
        assert!(!parse_boolean("False").unwrap());
        assert!(!parse_boolean("0").unwrap());
        assert!(parse_boolean("yes").is_err());
    }

    #[test]
    fn test_coerce_dispatch() {
        assert_eq!(
            coerce(ValueKind::Text, "unresolved").unwrap(),
            TypedValue::Text("unresolved".to_string())
        );
        assert_eq!(
            coerce(ValueKind::Number, "10").unwrap().token_kind(),
            TokenKind::ValueNumber
        );
        assert_eq!(
            coerce(ValueKind::Date, "-7d").unwrap().token_kind(),
            TokenKind::ValueRelativeDate
        );
        assert_eq!(
            coerce(ValueKind::Date, "2024-01-31").unwrap().token_kind(),
            TokenKind::ValueIso8601Date
        );
        assert_eq!(coerce(ValueKind::Duration, ""), Err(CoercionError::Empty));
    }

    #[test]
    fn test_reasons_are_not_empty() {
        for (kind, text) in [
            (ValueKind::Number, "abc"),
            (ValueKind::Duration, "1parsec"),
            (ValueKind::Size, "1zz"),
            (ValueKind::Percentage, "x"),
            (ValueKind::Boolean, "maybe"),
            (ValueKind::Date, "yesterday"),
        ] {
            let err = coerce(kind, text).unwrap_err();
            assert!(!err.reason().is_empty(), "empty reason for {} {}", kind, text);
        }
    }

    #[test]
    fn test_allowed_values() {
        let allowed = vec!["error".to_string(), "transaction".to_string()];
        assert!(check_allowed("error", &allowed).is_ok());
        let err = check_allowed("foo", &allowed).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value \"foo\". Expected one of: error, transaction"
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_quoted(r#"a \"b\" c"#), r#"a "b" c"#);
        assert_eq!(unescape_quoted(r"back\\slash"), r"back\slash");
        assert_eq!(unescape_quoted(r"keep\n"), r"keep\n");
        assert_eq!(unescape_quoted("trailing\\"), "trailing\\");
    }
}
