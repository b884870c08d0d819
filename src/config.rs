//! Key registry and parser options
//!
//! The registry tells the parser which keys exist and what kind of value each
//! one expects. It is read-only configuration owned by the caller.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    path::Path,
    sync::{Arc, OnceLock},
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{RegistryError, SearchError},
    value::ValueKind,
};

/// What the parser knows about one search key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescriptor {
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Overrides whether `key:[a, b]` is accepted; defaults to the kind's list support
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_list: Option<bool>,
    /// Key is an aggregate function written as `name(args)`
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl KeyDescriptor {
    pub fn new(kind: ValueKind) -> Self {
        KeyDescriptor {
            kind,
            label: None,
            allow_list: None,
            aggregate: false,
            allowed_values: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn aggregate(mut self) -> Self {
        self.aggregate = true;
        self
    }

    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_lists(mut self) -> Self {
        self.allow_list = Some(false);
        self
    }

    pub fn allows_list(&self) -> bool {
        self.allow_list.unwrap_or_else(|| self.kind.supports_list())
    }
}

/// Read-only lookup of recognized search keys
pub trait KeyRegistry: Debug {
    fn lookup(&self, name: &str) -> Option<KeyDescriptor>;

    /// Reject misconfiguration before any query is parsed
    fn validate(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

fn key_name_regex() -> &'static Regex {
    static KEY_NAME: OnceLock<Regex> = OnceLock::new();
    KEY_NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("static key name pattern"))
}

/// Registry backed by an in-memory map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticKeyRegistry {
    keys: BTreeMap<String, KeyDescriptor>,
}

impl StaticKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, name: impl Into<String>, descriptor: KeyDescriptor) -> Self {
        self.insert(name, descriptor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, descriptor: KeyDescriptor) {
        self.keys.insert(name.into(), descriptor);
    }

    pub fn extend(&mut self, other: StaticKeyRegistry) {
        self.keys.extend(other.keys);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys used by the issue stream and discover search bars
    pub fn issue_search() -> Self {
        use ValueKind::*;

        let text = |label: &str| KeyDescriptor::new(Text).with_label(label);
        let aggregate = |kind: ValueKind, label: &str| {
            KeyDescriptor::new(kind).with_label(label).aggregate()
        };

        StaticKeyRegistry::new()
            .with_key(
                "is",
                text("Status").without_lists().with_allowed_values([
                    "resolved",
                    "unresolved",
                    "ignored",
                    "archived",
                    "assigned",
                    "unassigned",
                    "for_review",
                    "linked",
                    "unlinked",
                ]),
            )
            .with_key("has", text("Has tag"))
            .with_key("message", text("Message"))
            .with_key("title", text("Title"))
            .with_key("release", text("Release"))
            .with_key("environment", text("Environment"))
            .with_key("transaction", text("Transaction"))
            .with_key("assigned", text("Assigned to"))
            .with_key("bookmarks", text("Bookmarked by"))
            .with_key("user.email", text("User email"))
            .with_key("url", text("URL"))
            .with_key("browser.name", text("Browser"))
            .with_key("os.name", text("Operating system"))
            .with_key("error.type", text("Error type"))
            .with_key(
                "event.type",
                text("Event type").with_allowed_values(["error", "default", "transaction"]),
            )
            .with_key(
                "level",
                text("Level").with_allowed_values(["fatal", "error", "warning", "info", "debug"]),
            )
            .with_key("times_seen", KeyDescriptor::new(Number).with_label("Times seen"))
            .with_key("issue.id", KeyDescriptor::new(Number).with_label("Issue ID"))
            .with_key("http.status_code", KeyDescriptor::new(Number).with_label("HTTP status"))
            .with_key("duration", KeyDescriptor::new(Duration).with_label("Duration"))
            .with_key(
                "transaction.duration",
                KeyDescriptor::new(Duration).with_label("Transaction duration"),
            )
            .with_key(
                "measurements.lcp",
                KeyDescriptor::new(Duration).with_label("Largest contentful paint"),
            )
            .with_key(
                "measurements.app_start_cold",
                KeyDescriptor::new(Duration).with_label("Cold start"),
            )
            .with_key(
                "measurements.size",
                KeyDescriptor::new(Size).with_label("Payload size"),
            )
            .with_key("attachment.size", KeyDescriptor::new(Size).with_label("Attachment size"))
            .with_key(
                "crash_free_rate",
                KeyDescriptor::new(Percentage).with_label("Crash free rate"),
            )
            .with_key(
                "error.handled",
                KeyDescriptor::new(Boolean).with_label("Error handled"),
            )
            .with_key(
                "error.unhandled",
                KeyDescriptor::new(Boolean).with_label("Error unhandled"),
            )
            .with_key("firstSeen", KeyDescriptor::new(Date).with_label("First seen"))
            .with_key("lastSeen", KeyDescriptor::new(Date).with_label("Last seen"))
            .with_key("timestamp", KeyDescriptor::new(Date).with_label("Timestamp"))
            .with_key("count", aggregate(Number, "Count"))
            .with_key("count_unique", aggregate(Number, "Count unique"))
            .with_key("avg", aggregate(Duration, "Average"))
            .with_key("p50", aggregate(Duration, "50th percentile"))
            .with_key("p75", aggregate(Duration, "75th percentile"))
            .with_key("p95", aggregate(Duration, "95th percentile"))
            .with_key("p99", aggregate(Duration, "99th percentile"))
            .with_key("failure_rate", aggregate(Percentage, "Failure rate"))
            .with_key("apdex", aggregate(Number, "Apdex"))
            .with_key("last_seen", aggregate(Date, "Last seen"))
    }
}

impl KeyRegistry for StaticKeyRegistry {
    fn lookup(&self, name: &str) -> Option<KeyDescriptor> {
        self.keys.get(name).cloned()
    }

    fn validate(&self) -> Result<(), RegistryError> {
        for (name, descriptor) in &self.keys {
            if !key_name_regex().is_match(name) {
                return Err(RegistryError::InvalidKeyName { name: name.clone() });
            }

            if let Some(allowed) = &descriptor.allowed_values {
                if descriptor.kind != ValueKind::Text {
                    return Err(RegistryError::AllowedValuesOnNonText {
                        name: name.clone(),
                        kind: descriptor.kind,
                    });
                }
                if allowed.is_empty() {
                    return Err(RegistryError::EmptyAllowedValues { name: name.clone() });
                }
            }

            if descriptor.allow_list == Some(true) && !descriptor.kind.supports_list() {
                return Err(RegistryError::ListsUnsupported {
                    name: name.clone(),
                    kind: descriptor.kind,
                });
            }
        }
        Ok(())
    }
}

/// Treatment of simple keys missing from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeyPolicy {
    /// Text filter with a warning
    #[default]
    Warn,
    Invalid,
    /// Text filter, no annotation
    Allow,
}

/// Syntax features a search bar accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub unknown_keys: UnknownKeyPolicy,
    pub allow_boolean: bool,
    pub allow_parens: bool,
    pub allow_negation: bool,
    pub allow_wildcard: bool,
    pub allow_free_text: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            unknown_keys: UnknownKeyPolicy::Warn,
            allow_boolean: true,
            allow_parens: true,
            allow_negation: true,
            allow_wildcard: true,
            allow_free_text: true,
        }
    }
}

/// On-disk form of a [`SearchConfig`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub options: SearchOptions,
    /// Start from the built-in issue search keys before adding `keys`
    pub include_builtin: bool,
    pub keys: StaticKeyRegistry,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub registry: Arc<dyn KeyRegistry + Send + Sync>,
    pub options: SearchOptions,
}

impl SearchConfig {
    pub fn new(registry: impl KeyRegistry + Send + Sync + 'static) -> Self {
        SearchConfig {
            registry: Arc::new(registry),
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, SearchError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        Self::from_config_file(file)
    }

    pub fn from_file(path: &Path) -> Result<Self, SearchError> {
        let json = std::fs::read_to_string(path).map_err(|source| SearchError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn from_config_file(file: ConfigFile) -> Result<Self, SearchError> {
        let mut registry = if file.include_builtin {
            StaticKeyRegistry::issue_search()
        } else {
            StaticKeyRegistry::new()
        };
        registry.extend(file.keys);
        registry.validate()?;

        Ok(SearchConfig::new(registry).with_options(file.options))
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig::new(StaticKeyRegistry::issue_search())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_search_is_valid() {
        let registry = StaticKeyRegistry::issue_search();
        registry.validate().unwrap();
        assert_eq!(registry.lookup("duration").unwrap().kind, ValueKind::Duration);
        assert!(registry.lookup("p95").unwrap().aggregate);
        assert!(registry.lookup("nope").is_none());
    }

    #[test]
    fn test_list_support_defaults_to_kind() {
        assert!(KeyDescriptor::new(ValueKind::Text).allows_list());
        assert!(KeyDescriptor::new(ValueKind::Number).allows_list());
        assert!(!KeyDescriptor::new(ValueKind::Duration).allows_list());
        assert!(!KeyDescriptor::new(ValueKind::Text).without_lists().allows_list());
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let registry =
            StaticKeyRegistry::new().with_key("has space", KeyDescriptor::new(ValueKind::Text));
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::InvalidKeyName { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_allowed_values_on_numbers() {
        let registry = StaticKeyRegistry::new().with_key(
            "count",
            KeyDescriptor::new(ValueKind::Number).with_allowed_values(["1"]),
        );
        assert_eq!(
            registry.validate(),
            Err(RegistryError::AllowedValuesOnNonText {
                name: "count".to_string(),
                kind: ValueKind::Number,
            })
        );
    }

    #[test]
    fn test_validate_rejects_empty_allowed_values() {
        let registry = StaticKeyRegistry::new().with_key(
            "level",
            KeyDescriptor::new(ValueKind::Text).with_allowed_values(Vec::<String>::new()),
        );
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::EmptyAllowedValues { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duration_lists() {
        let mut descriptor = KeyDescriptor::new(ValueKind::Duration);
        descriptor.allow_list = Some(true);
        let registry = StaticKeyRegistry::new().with_key("duration", descriptor);
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::ListsUnsupported { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = SearchConfig::from_json_str(
            r#"{
                "options": {"unknown_keys": "invalid", "allow_parens": false},
                "keys": {
                    "status": {"kind": "text", "allowed_values": ["open", "closed"]},
                    "latency": {"kind": "duration"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.options.unknown_keys, UnknownKeyPolicy::Invalid);
        assert!(!config.options.allow_parens);
        assert!(config.options.allow_boolean);
        assert_eq!(
            config.registry.lookup("latency").unwrap().kind,
            ValueKind::Duration
        );
        assert!(config.registry.lookup("is").is_none());
    }

    #[test]
    fn test_config_include_builtin() {
        let config = SearchConfig::from_json_str(
            r#"{"include_builtin": true, "keys": {"team": {"kind": "text"}}}"#,
        )
        .unwrap();
        assert!(config.registry.lookup("team").is_some());
        assert!(config.registry.lookup("is").is_some());
    }

    #[test]
    fn test_config_invalid_registry() {
        let err = SearchConfig::from_json_str(r#"{"keys": {"bad key": {"kind": "text"}}}"#)
            .unwrap_err();
        assert!(matches!(err, SearchError::Registry(_)));
    }

    #[test]
    fn test_config_bad_json() {
        let err = SearchConfig::from_json_str(r#"{"keys": {"a": {"kind": "colour"}}}"#)
            .unwrap_err();
        assert!(matches!(err, SearchError::ConfigJson(_)));
    }
}
