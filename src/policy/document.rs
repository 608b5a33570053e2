//! In-memory policy document and its typed accessors
//!
//! A document is built once per process from a text snapshot and then only
//! read. List-typed values are stored as written and tokenized on first
//! access; the tokenized form replaces the raw text in place.

use crate::access_control::ALL_GROUP;
use crate::error::{PolicyError, PolicyResult};
use crate::policy::patterns::{PathPattern, PatternCache};
use crate::policy::tokenizer::{join_words, split_words};
use std::cell::{OnceCell, RefCell};
use std::fmt;

/// Name of the implicit global section
pub const GLOBAL_SECTION: &str = "gitosis";

/// Option names whose values are whitespace separated word lists
const LIST_OPTIONS: &[&str] = &["R", "RW+", "R_regex", "RW+_regex"];

/// Option names whose values are regular expressions
const REGEX_LIST_OPTIONS: &[&str] = &["R_regex", "RW+_regex"];

/// Option naming a regex that selects a section by repository path
pub const PATH_REGEX_OPTION: &str = "path_regex";

/// Whether `option` holds a word list rather than a single string
pub fn is_list_option(option: &str) -> bool {
    LIST_OPTIONS.contains(&option) || is_map_directive(option)
}

/// Whether `option` is a `map <mode> <path>` directive
pub fn is_map_directive(option: &str) -> bool {
    option
        .strip_prefix("map")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Normalize an option key, collapsing whitespace inside map directives
pub fn normalize_key(key: &str) -> String {
    if is_map_directive(key) {
        key.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        key.to_string()
    }
}

/// An option value: written text, or its tokenized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Scalar(String),
    List(Vec<String>),
}

impl OptionValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            OptionValue::Scalar(s) => Some(s),
            OptionValue::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(words) => Some(words),
            OptionValue::Scalar(_) => None,
        }
    }

    /// Render the value as it appears after `=` in the text format
    pub fn to_line(&self) -> String {
        match self {
            OptionValue::Scalar(s) => s.clone(),
            OptionValue::List(words) => join_words(words),
        }
    }

    /// Coerce to a list, tokenizing a scalar
    pub fn into_list(self) -> PolicyResult<Vec<String>> {
        match self {
            OptionValue::List(words) => Ok(words),
            OptionValue::Scalar(raw) => split_words(&raw),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Scalar(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Scalar(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// Name-keyed entries that remember insertion order
#[derive(Debug)]
pub(crate) struct Ordered<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Ordered<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Ordered<T> {
    pub(crate) fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace, keeping the original position on replace
    pub(crate) fn insert(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Options of one `repo` section
#[derive(Debug, Default)]
pub struct Section {
    pub(crate) options: Ordered<RefCell<OptionValue>>,
}

impl Section {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&mut self, option: impl Into<String>, value: OptionValue) {
        self.options.insert(option, RefCell::new(value));
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tokenize a cell's scalar in place and return the list
fn memoized_list(cell: &RefCell<OptionValue>) -> PolicyResult<Vec<String>> {
    let mut value = cell.borrow_mut();
    if let OptionValue::Scalar(raw) = &*value {
        let words = split_words(raw)?;
        *value = OptionValue::List(words);
    }
    Ok(value.as_list().map(<[String]>::to_vec).unwrap_or_default())
}

/// Parse the boolean spellings accepted in policy options
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// The policy document: global options, group definitions and repo sections
pub struct PolicyDocument {
    pub(crate) global: Ordered<String>,
    pub(crate) groups: Ordered<RefCell<OptionValue>>,
    pub(crate) repos: Ordered<Section>,
    patterns: PatternCache,
    path_patterns: OnceCell<Vec<PathPattern>>,
}

impl fmt::Debug for PolicyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDocument")
            .field("global", &self.global)
            .field("groups", &self.groups.len())
            .field("repos", &self.repos.len())
            .finish()
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        let mut global = Ordered::default();
        global.insert("loglevel", "INFO".to_string());
        global.insert("decodeID", "no".to_string());
        Self::with_global(global)
    }
}

impl PolicyDocument {
    /// A document with only the default global options
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_global(global: Ordered<String>) -> Self {
        Self {
            global,
            groups: Ordered::default(),
            repos: Ordered::default(),
            patterns: PatternCache::new(),
            path_patterns: OnceCell::new(),
        }
    }

    // ----------------------------------------------------------------------
    // Global section
    // ----------------------------------------------------------------------

    pub fn global_get(&self, option: &str) -> Option<&str> {
        self.global.get(option).map(String::as_str)
    }

    /// Read a global option as a boolean
    pub fn global_bool(&self, option: &str) -> PolicyResult<Option<bool>> {
        self.global_get(option)
            .map(|value| {
                parse_bool(value).ok_or_else(|| PolicyError::InvalidBoolean {
                    section: GLOBAL_SECTION.to_string(),
                    option: option.to_string(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }

    pub fn set_global(&mut self, option: &str, value: impl Into<String>) -> PolicyResult<()> {
        let value = value.into();
        check_option_name(GLOBAL_SECTION, option)?;
        check_text(GLOBAL_SECTION, "value", &value)?;
        self.global.insert(option, value);
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Groups
    // ----------------------------------------------------------------------

    /// Group names in declaration order
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys()
    }

    /// Members of a group, tokenized on first access
    pub fn group_members(&self, name: &str) -> PolicyResult<Option<Vec<String>>> {
        self.groups.get(name).map(memoized_list).transpose()
    }

    pub fn set_group_members(&mut self, name: &str, members: Vec<String>) -> PolicyResult<()> {
        validate_group_name(name)?;
        for member in &members {
            check_text(name, "member", member)?;
        }
        self.groups
            .insert(name, RefCell::new(OptionValue::List(members)));
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Repo sections
    // ----------------------------------------------------------------------

    /// Section names in declaration order
    pub fn repos(&self) -> impl Iterator<Item = &str> {
        self.repos.keys()
    }

    pub fn has_repo(&self, section: &str) -> bool {
        self.repos.get(section).is_some()
    }

    /// Read an option, with list-typed options always returned as lists
    pub fn repo_option(&self, section: &str, option: &str) -> PolicyResult<Option<OptionValue>> {
        let Some(cell) = self
            .repos
            .get(section)
            .and_then(|s| s.options.get(option))
        else {
            return Ok(None);
        };

        if is_list_option(option) {
            memoized_list(cell).map(|words| Some(OptionValue::List(words)))
        } else {
            Ok(Some(cell.borrow().clone()))
        }
    }

    /// Read an option as a word list, whatever its declared type
    pub fn repo_list(&self, section: &str, option: &str) -> PolicyResult<Option<Vec<String>>> {
        self.repo_option(section, option)?
            .map(OptionValue::into_list)
            .transpose()
    }

    /// Read an option as text; lists are rendered back to their line form
    pub fn repo_scalar(&self, section: &str, option: &str) -> PolicyResult<Option<String>> {
        Ok(self
            .repo_option(section, option)?
            .map(|value| match value {
                OptionValue::Scalar(s) => s,
                OptionValue::List(words) => join_words(&words),
            }))
    }

    /// Read an option as a boolean
    pub fn repo_bool(&self, section: &str, option: &str) -> PolicyResult<Option<bool>> {
        self.repo_scalar(section, option)?
            .map(|value| {
                parse_bool(&value).ok_or_else(|| PolicyError::InvalidBoolean {
                    section: section.to_string(),
                    option: option.to_string(),
                    value,
                })
            })
            .transpose()
    }

    /// Set an option, validating list and regex values immediately
    pub fn set_repo_option(
        &mut self,
        section: &str,
        option: &str,
        value: OptionValue,
    ) -> PolicyResult<()> {
        if section.is_empty() || section.trim() != section {
            return Err(invalid_text(section, "section name", section));
        }
        check_text(section, "section name", section)?;
        check_option_name(section, option)?;
        match &value {
            OptionValue::Scalar(text) => check_text(section, "value", text)?,
            OptionValue::List(words) => {
                for word in words {
                    check_text(section, "value", word)?;
                }
            }
        }

        let option = normalize_key(option);
        validate_option(section, &option, &value)?;

        match self.repos.get_mut(section) {
            Some(existing) => existing.set(option, value),
            None => {
                let mut created = Section::new();
                created.set(option, value);
                self.repos.insert(section, created);
            }
        }

        // Derived state follows the document
        self.path_patterns = OnceCell::new();
        self.patterns.clear();
        Ok(())
    }

    /// Find the section that governs a repository path.
    ///
    /// An exact section name wins; otherwise the first section, in
    /// declaration order, whose `path_regex` matches the start of `path`.
    pub fn lookup_repo_by_path(&self, path: &str) -> PolicyResult<Option<&str>> {
        if let Some((name, _)) = self.repos.iter().find(|(name, _)| *name == path) {
            return Ok(Some(name));
        }

        if self.path_patterns.get().is_none() {
            let built = self.build_path_patterns()?;
            let _ = self.path_patterns.set(built);
        }

        Ok(self
            .path_patterns
            .get()
            .and_then(|patterns| patterns.iter().find(|p| p.matches(path)))
            .map(PathPattern::section))
    }

    fn build_path_patterns(&self) -> PolicyResult<Vec<PathPattern>> {
        let mut patterns = Vec::new();
        for (name, section) in self.repos.iter() {
            if let Some(cell) = section.options.get(PATH_REGEX_OPTION) {
                let source = cell.borrow().to_line();
                if !source.is_empty() {
                    patterns.push(PathPattern::new(name, &source)?);
                }
            }
        }
        Ok(patterns)
    }

    /// First pattern in `patterns` matching the start of `candidate`
    pub fn find_pattern<'p>(
        &self,
        section: &str,
        patterns: &'p [String],
        candidate: &str,
    ) -> PolicyResult<Option<&'p str>> {
        self.patterns.find_match(section, patterns, candidate)
    }
}

fn invalid_text(section: &str, what: &'static str, text: &str) -> PolicyError {
    PolicyError::InvalidText {
        section: section.to_string(),
        what,
        text: text.to_string(),
    }
}

/// Text must stay on one line when written out
fn check_text(section: &str, what: &'static str, text: &str) -> PolicyResult<()> {
    if text.chars().any(|c| c.is_control() && c != '\t') {
        return Err(invalid_text(section, what, text));
    }
    Ok(())
}

/// An option name must read back as an option line, not a header, group or
/// comment
fn check_option_name(section: &str, option: &str) -> PolicyResult<()> {
    let ambiguous = option.is_empty()
        || option.trim() != option
        || option.contains('=')
        || option.starts_with(['@', '#'])
        || matches!(option.split_whitespace().next(), Some(GLOBAL_SECTION | "repo"));
    if ambiguous {
        return Err(invalid_text(section, "option name", option));
    }
    check_text(section, "option name", option)
}

/// Group names start with `@`; `@all` is implicit and never declared
pub(crate) fn validate_group_name(name: &str) -> PolicyResult<()> {
    let valid = name.len() > 1
        && name.starts_with('@')
        && name != ALL_GROUP
        && name.trim() == name
        && !name.contains('=')
        && !name.chars().any(|c| c.is_control() && c != '\t');
    if valid {
        Ok(())
    } else {
        Err(PolicyError::InvalidGroupName(name.to_string()))
    }
}

/// Check that a value is well formed for its option name
pub(crate) fn validate_option(
    section: &str,
    option: &str,
    value: &OptionValue,
) -> PolicyResult<()> {
    if option == PATH_REGEX_OPTION {
        PathPattern::new(section, &value.to_line())?;
        return Ok(());
    }

    if !is_list_option(option) {
        return Ok(());
    }

    let words = value.clone().into_list()?;

    if REGEX_LIST_OPTIONS.contains(&option) {
        for pattern in &words {
            crate::policy::patterns::compile_anchored(section, pattern)?;
        }
    }

    if is_map_directive(option) && words.len() != 1 {
        return Err(PolicyError::InvalidMapping {
            section: section.to_string(),
            key: option.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_repo(section: &str, option: &str, value: &str) -> PolicyDocument {
        let mut doc = PolicyDocument::new();
        doc.set_repo_option(section, option, value.into()).unwrap();
        doc
    }

    #[test]
    fn test_defaults() {
        let doc = PolicyDocument::new();
        assert_eq!(doc.global_get("loglevel"), Some("INFO"));
        assert_eq!(doc.global_bool("decodeID").unwrap(), Some(false));
        assert_eq!(doc.global_get("repositories"), None);
    }

    #[test]
    fn test_list_options_are_tokenized() {
        let doc = doc_with_repo("@dev", "R", "alpha 'beta gamma'");
        assert_eq!(
            doc.repo_option("@dev", "R").unwrap(),
            Some(OptionValue::List(vec![
                "alpha".to_string(),
                "beta gamma".to_string()
            ]))
        );
    }

    #[test]
    fn test_scalar_options_stay_scalar() {
        let doc = doc_with_repo("proj", "description", "My  project");
        assert_eq!(
            doc.repo_option("proj", "description").unwrap(),
            Some(OptionValue::Scalar("My  project".to_string()))
        );
    }

    #[test]
    fn test_tokenized_form_is_memoized() {
        let doc = doc_with_repo("@dev", "RW+", "a b");
        doc.repo_option("@dev", "RW+").unwrap();

        let cell = doc.repos.get("@dev").unwrap().options.get("RW+").unwrap();
        assert!(matches!(&*cell.borrow(), OptionValue::List(_)));
    }

    #[test]
    fn test_missing_lookups() {
        let doc = PolicyDocument::new();
        assert_eq!(doc.repo_option("nope", "R").unwrap(), None);
        assert_eq!(doc.group_members("@nope").unwrap(), None);
    }

    #[test]
    fn test_group_name_must_start_with_at() {
        let mut doc = PolicyDocument::new();
        assert!(matches!(
            doc.set_group_members("dev", vec![]),
            Err(PolicyError::InvalidGroupName(_))
        ));
    }

    #[test]
    fn test_all_group_is_implicit() {
        let mut doc = PolicyDocument::new();
        assert!(matches!(
            doc.set_group_members("@all", vec!["alice".into()]),
            Err(PolicyError::InvalidGroupName(_))
        ));
        assert!(doc.set_group_members("@", vec![]).is_err());
    }

    #[test]
    fn test_mutators_reject_line_breaks() {
        let mut doc = PolicyDocument::new();
        assert!(matches!(
            doc.set_group_members("@dev", vec!["a\nb".into()]),
            Err(PolicyError::InvalidText { .. })
        ));
        assert!(doc.set_global("loglevel", "INFO\r").is_err());
        assert!(
            doc.set_repo_option("x", "description", "one\ntwo".into())
                .is_err()
        );
        assert!(
            doc.set_repo_option("x", "R", vec!["a\u{0}".to_string()].into())
                .is_err()
        );
        assert!(doc.set_repo_option("x", "description", "tab\tok".into()).is_ok());
    }

    #[rstest::rstest]
    #[case::empty("")]
    #[case::group("@dev")]
    #[case::comment("#note")]
    #[case::header("repo y")]
    #[case::global_header("gitosis")]
    #[case::equals("a=b")]
    #[case::padded(" R")]
    fn test_ambiguous_option_names(#[case] option: &str) {
        let mut doc = PolicyDocument::new();
        assert!(matches!(
            doc.set_repo_option("x", option, "v".into()),
            Err(PolicyError::InvalidText { .. })
        ));
        assert!(doc.set_global(option, "v").is_err());
    }

    #[test]
    fn test_section_name_must_survive_reload() {
        let mut doc = PolicyDocument::new();
        assert!(doc.set_repo_option("", "R", "a".into()).is_err());
        assert!(doc.set_repo_option(" x", "R", "a".into()).is_err());
        assert!(doc.set_repo_option("a\nb", "R", "a".into()).is_err());
        assert!(doc.set_repo_option("@dev", "R", "a".into()).is_ok());
    }

    #[test]
    fn test_map_key_is_normalized() {
        let doc = doc_with_repo("@dev", "map   R\tfoo", "bar");
        assert_eq!(
            doc.repo_list("@dev", "map R foo").unwrap(),
            Some(vec!["bar".to_string()])
        );
    }

    #[test]
    fn test_map_requires_single_target() {
        let mut doc = PolicyDocument::new();
        let err = doc
            .set_repo_option("@dev", "map R foo", "bar baz".into())
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidMapping { .. }));
    }

    #[test]
    fn test_bad_regex_rejected_on_set() {
        let mut doc = PolicyDocument::new();
        assert!(
            doc.set_repo_option("@dev", "R_regex", "ok [bad".into())
                .is_err()
        );
        assert!(
            doc.set_repo_option("x", "path_regex", "(".into())
                .is_err()
        );
    }

    #[test]
    fn test_lookup_exact_then_regex() {
        let mut doc = PolicyDocument::new();
        doc.set_repo_option("mirrors", "path_regex", "mirror/".into())
            .unwrap();
        doc.set_repo_option("everything", "path_regex", ".*".into())
            .unwrap();
        doc.set_repo_option("mirror/exact", "description", "x".into())
            .unwrap();

        assert_eq!(
            doc.lookup_repo_by_path("mirror/exact").unwrap(),
            Some("mirror/exact")
        );
        assert_eq!(
            doc.lookup_repo_by_path("mirror/linux").unwrap(),
            Some("mirrors")
        );
        assert_eq!(
            doc.lookup_repo_by_path("other").unwrap(),
            Some("everything")
        );
    }

    #[test]
    fn test_lookup_none_without_patterns() {
        let doc = doc_with_repo("proj", "description", "x");
        assert_eq!(doc.lookup_repo_by_path("other").unwrap(), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_repo_bool_rejects_garbage() {
        let doc = doc_with_repo("proj", "daemon", "perhaps");
        assert!(matches!(
            doc.repo_bool("proj", "daemon"),
            Err(PolicyError::InvalidBoolean { .. })
        ));
    }
}
