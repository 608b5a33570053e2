//! Pattern matching for policy regexes
//!
//! Policy regexes (`path_regex`, `R_regex`, `RW+_regex`) match from the
//! start of the candidate but need not consume all of it. Compiled forms are
//! cached per document; they are derived state and never authoritative.

use crate::error::{PolicyError, PolicyResult};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

/// Compile a pattern so that it only matches at the start of the input.
pub fn compile_anchored(section: &str, pattern: &str) -> PolicyResult<Regex> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| PolicyError::InvalidPattern {
        section: section.to_string(),
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// A compiled `path_regex` and the section it selects
#[derive(Debug)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    section: String,
}

impl PathPattern {
    pub fn new(section: &str, pattern: &str) -> PolicyResult<Self> {
        Ok(Self {
            source: pattern.to_string(),
            regex: compile_anchored(section, pattern)?,
            section: section.to_string(),
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn section(&self) -> &str {
        &self.section
    }
}

/// Lazily compiled regexes keyed by their source text
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: RefCell<HashMap<String, Regex>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the first pattern that matches `candidate`, compiling on first use
    pub fn find_match<'p>(
        &self,
        section: &str,
        patterns: &'p [String],
        candidate: &str,
    ) -> PolicyResult<Option<&'p str>> {
        let mut compiled = self.compiled.borrow_mut();

        for pattern in patterns {
            if !compiled.contains_key(pattern) {
                let regex = compile_anchored(section, pattern)?;
                compiled.insert(pattern.clone(), regex);
            }
            if compiled
                .get(pattern)
                .is_some_and(|regex| regex.is_match(candidate))
            {
                return Ok(Some(pattern.as_str()));
            }
        }

        Ok(None)
    }

    /// Number of compiled patterns held
    pub fn len(&self) -> usize {
        self.compiled.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.borrow().is_empty()
    }

    pub fn clear(&mut self) {
        self.compiled.get_mut().clear();
    }
}
