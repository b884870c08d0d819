//! Tokenizer, parser and evaluator for issue-search filter strings such as
//! `is:unresolved duration:>1h`.
//!
//! Parsing never fails on user input: problems are attached to the
//! offending tokens as `invalid` or `warning` annotations and the rest of
//! the query keeps working.

pub mod config;
pub mod error;
pub mod expr;
pub mod flatten;
pub mod parser;
pub mod token;
pub mod value;

use slog::{debug, o, warn, Discard, Logger};

pub use config::{KeyDescriptor, KeyRegistry, SearchConfig, SearchOptions, StaticKeyRegistry};
pub use error::{QueryReport, RegistryError, SearchError};
pub use token::{ParseResult, Token};
pub use value::ValueKind;

use crate::parser::{RawParser, TokenBuilder};

/// Parser bound to one key registry and set of options
#[derive(Debug, Clone)]
pub struct SearchParser {
    config: SearchConfig,
    logger: Logger,
}

impl SearchParser {
    /// # Errors
    /// Returns `SearchError::Registry` when the registry is misconfigured.
    pub fn new(logger: Logger, config: SearchConfig) -> Result<Self, SearchError> {
        config.registry.validate()?;
        Ok(SearchParser { config, logger })
    }

    /// Parse a query, returning `None` for empty input
    pub fn parse(&self, query: &str) -> Option<ParseResult> {
        match self.try_parse(query) {
            Ok(result) => Some(result),
            Err(SearchError::Empty) => None,
            Err(e) => {
                warn!(self.logger, "search query could not be tokenized"; "error" => %e);
                None
            }
        }
    }

    /// # Errors
    /// `SearchError::Empty` for an empty query; any other error is a grammar bug.
    pub fn try_parse(&self, query: &str) -> Result<ParseResult, SearchError> {
        parse_with(&self.config, &self.logger, query)
    }
}

/// One-off parse without logging
pub fn parse_search(query: &str, config: &SearchConfig) -> Option<ParseResult> {
    parse_with(config, &Logger::root(Discard, o!()), query).ok()
}

fn parse_with(
    config: &SearchConfig,
    logger: &Logger,
    query: &str,
) -> Result<ParseResult, SearchError> {
    if query.is_empty() {
        return Err(SearchError::Empty);
    }

    let logger = logger.new(o!("query" => query.to_string()));
    let raw = RawParser::parse_raw_tokens(query)?;
    let tokens = TokenBuilder::new(config, logger.clone()).build(raw);
    let result = ParseResult::new(query.to_string(), tokens);

    debug!(logger, "parsed search query";
        "tokens" => result.tokens().len(),
        "invalid" => result.has_invalid());

    Ok(result)
}
