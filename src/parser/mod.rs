pub mod ast;
pub mod builder;
pub mod raw;

// Re-exports for clean API
pub use ast::{test_utils, RawFilter, RawKey, RawToken, RawValue};
pub use builder::TokenBuilder;
pub use raw::{RawParser, Rule, MAX_GROUP_DEPTH};
