//! Policy document
//!
//! The declarative access policy: a hand-written parser and serializer for
//! the gitosis text format, and the document model with typed accessors.
//!
//! Documents are loaded once per invocation and treated as read-only
//! afterwards. Tokenized lists and compiled regexes are cached on the
//! document instance itself, never in process-wide state.

pub mod document;
pub mod parser;
pub mod patterns;
pub mod tokenizer;

pub use document::{GLOBAL_SECTION, OptionValue, PolicyDocument, parse_bool};
pub use parser::{parse, serialize};
pub use tokenizer::{join_words, split_words};

use crate::error::{AppError, ConfigError};
use std::path::Path;
use tracing::debug;

/// Read and parse a policy file
pub fn load_policy(path: &Path) -> Result<PolicyDocument, AppError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Load(format!("cannot read policy file {}: {e}", path.display()))
    })?;
    debug!(path = %path.display(), bytes = text.len(), "Loaded policy text");
    Ok(parse(&text)?)
}
