//! Reader and writer for the policy text format
//!
//! ```text
//! gitosis
//!     repositories = repositories
//!     decodeID = no
//!
//! @admins = alice 'bob smith'
//! @dev = carol @admins
//!
//! repo @dev
//!     R = docs
//!     RW+ = website
//!     RW+_regex = ^proj-.*
//!     map R legacy = archive/legacy
//! ```
//!
//! Blank lines and `#` comments are ignored. A `gitosis` or `repo <name>`
//! line opens a section that stays open until the next header; `key = value`
//! lines belong to the open section.

use crate::error::{PolicyError, PolicyResult};
use crate::policy::document::{
    GLOBAL_SECTION, OptionValue, Ordered, PolicyDocument, Section, normalize_key,
    validate_group_name, validate_option,
};
use crate::policy::tokenizer::split_words;
use std::cell::RefCell;
use std::fmt::Write;
use std::str::FromStr;
use tracing::trace;

enum OpenSection {
    Global(Ordered<String>),
    Repo { name: String, section: Section },
}

/// Recognize a section header line, returning its keyword and remainder
fn section_header(line: &str) -> Option<(&str, &str)> {
    ["gitosis", "repo"].into_iter().find_map(|keyword| {
        let rest = line.strip_prefix(keyword)?;
        (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some((keyword, rest))
    })
}

/// Parse policy text into a document.
///
/// Fails on the first malformed line; a partially read policy is never
/// returned.
pub fn parse(text: &str) -> PolicyResult<PolicyDocument> {
    let mut doc = PolicyDocument::new();
    let mut open: Option<OpenSection> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('@') {
            let Some((name, members)) = line.split_once('=') else {
                return Err(PolicyError::syntax(
                    line_no,
                    format!(
                        "'@' keyword should follow group_name = member1 member2 ..., but got '{line}'"
                    ),
                ));
            };
            let (name, members) = (name.trim(), members.trim());
            validate_group_name(name).map_err(|e| e.at_line(line_no))?;
            split_words(members).map_err(|e| e.at_line(line_no))?;

            trace!(group = name, line = line_no, "group definition");
            doc.groups
                .insert(name, RefCell::new(OptionValue::Scalar(members.to_string())));
        } else if let Some((keyword, rest)) = section_header(line) {
            if let Some(section) = open.take() {
                commit(&mut doc, section);
            }

            open = Some(if keyword == GLOBAL_SECTION {
                OpenSection::Global(Ordered::default())
            } else {
                let name = rest.trim();
                if name.is_empty() {
                    return Err(PolicyError::syntax(
                        line_no,
                        format!("'repo' keyword requires a name in '{line}'"),
                    ));
                }
                OpenSection::Repo {
                    name: name.to_string(),
                    section: Section::new(),
                }
            });
        } else if let Some(section) = open.as_mut() {
            let (key, value) = match line.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => (key.trim(), value.trim()),
                _ => {
                    return Err(PolicyError::syntax(
                        line_no,
                        format!("expect form like 'key = value', but got '{line}'"),
                    ));
                }
            };

            match section {
                OpenSection::Global(options) => options.insert(key, value.to_string()),
                OpenSection::Repo { name, section } => {
                    let key = normalize_key(key);
                    let value = OptionValue::Scalar(value.to_string());
                    validate_option(name, &key, &value).map_err(|e| e.at_line(line_no))?;
                    section.set(key, value);
                }
            }
        } else {
            return Err(PolicyError::syntax(
                line_no,
                format!("invalid syntax in '{line}'"),
            ));
        }
    }

    if let Some(section) = open.take() {
        commit(&mut doc, section);
    }

    Ok(doc)
}

/// A later section with the same name replaces the earlier one
fn commit(doc: &mut PolicyDocument, section: OpenSection) {
    match section {
        OpenSection::Global(options) => doc.global = options,
        OpenSection::Repo { name, section } => doc.repos.insert(name, section),
    }
}

fn write_section<'a>(
    out: &mut String,
    header: &str,
    options: impl Iterator<Item = (&'a str, String)>,
) {
    let _ = writeln!(out, "{header}");
    for (key, value) in options {
        let _ = writeln!(out, "\t{key}\t = {value}");
    }
}

/// Render a document back to policy text.
pub fn serialize(doc: &PolicyDocument) -> String {
    let mut out = String::new();

    write_section(
        &mut out,
        GLOBAL_SECTION,
        doc.global.iter().map(|(k, v)| (k, v.clone())),
    );
    out.push('\n');

    for (name, members) in doc.groups.iter() {
        let _ = writeln!(out, "{name}\t = {}", members.borrow().to_line());
    }
    out.push('\n');

    for (name, section) in doc.repos.iter() {
        write_section(
            &mut out,
            &format!("repo {name}"),
            section
                .options
                .iter()
                .map(|(k, v)| (k, v.borrow().to_line())),
        );
    }

    out
}

impl FromStr for PolicyDocument {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl std::fmt::Display for PolicyDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serialize(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_header() {
        assert_eq!(section_header("gitosis"), Some(("gitosis", "")));
        assert_eq!(section_header("repo foo"), Some(("repo", " foo")));
        assert_eq!(section_header("repository = x"), None);
        assert_eq!(section_header("gitosisx"), None);
    }

    #[test]
    fn test_parse_sections_and_groups() {
        let doc = parse(
            "# comment\n\
             gitosis\n\
             \trepositories = repos\n\
             \n\
             @dev = alice 'bob smith'\n\
             repo @dev\n\
             \tR = docs\n",
        )
        .unwrap();

        assert_eq!(doc.global_get("repositories"), Some("repos"));
        // A parsed global section replaces the defaults
        assert_eq!(doc.global_get("loglevel"), None);
        assert_eq!(
            doc.group_members("@dev").unwrap(),
            Some(vec!["alice".to_string(), "bob smith".to_string()])
        );
        assert_eq!(
            doc.repo_list("@dev", "R").unwrap(),
            Some(vec!["docs".to_string()])
        );
    }

    #[test]
    fn test_group_lines_allowed_inside_sections() {
        let doc = parse("repo x\n  R = a\n@g = u\n  RW+ = b\n").unwrap();
        assert!(doc.group_members("@g").unwrap().is_some());
        assert_eq!(
            doc.repo_list("x", "RW+").unwrap(),
            Some(vec!["b".to_string()])
        );
    }

    #[test]
    fn test_option_outside_section() {
        let err = parse("\n\nkey = value\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_repo_requires_name() {
        let err = parse("repo\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_group_without_equals() {
        let err = parse("@dev alice\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_option_without_equals() {
        let err = parse("repo x\n  just words\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_unterminated_quote_in_list_option_is_fatal() {
        let err = parse("repo x\n  R = 'open\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_scalar_option_quotes_are_not_checked() {
        let doc = parse("repo x\n  description = it's 'quoted\n").unwrap();
        assert_eq!(
            doc.repo_scalar("x", "description").unwrap(),
            Some("it's 'quoted".to_string())
        );
    }

    #[test]
    fn test_invalid_path_regex_is_fatal() {
        let err = parse("repo x\n  path_regex = (unclosed\n").unwrap_err();
        assert!(matches!(err, PolicyError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_explicit_all_group_rejected() {
        let err = parse("@dev = bob\n@all = alice\n").unwrap_err();
        match err {
            PolicyError::Syntax { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("@all"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_section_replaces() {
        let doc = parse("repo x\n  R = a\nrepo x\n  RW+ = b\n").unwrap();
        assert_eq!(doc.repo_option("x", "R").unwrap(), None);
        assert_eq!(doc.repos().count(), 1);
    }

    #[test]
    fn test_serialize_layout() {
        let mut doc = PolicyDocument::new();
        doc.set_group_members("@dev", vec!["alice".into(), "bob smith".into()])
            .unwrap();
        doc.set_repo_option("@dev", "R", vec!["docs".to_string()].into())
            .unwrap();

        let text = serialize(&doc);
        assert_eq!(
            text,
            "gitosis\n\
             \tloglevel\t = INFO\n\
             \tdecodeID\t = no\n\
             \n\
             @dev\t = alice 'bob smith'\n\
             \n\
             repo @dev\n\
             \tR\t = docs\n"
        );
    }

    #[test]
    fn test_from_str_and_display() {
        let doc: PolicyDocument = "repo a\n R = b\n".parse().unwrap();
        let again: PolicyDocument = doc.to_string().parse().unwrap();
        assert_eq!(
            again.repo_list("a", "R").unwrap(),
            Some(vec!["b".to_string()])
        );
    }
}
