//! Access control types
//!
//! Core types used by the access control system.

use std::fmt;
use std::str::FromStr;

/// Default storage prefix, relative to the serving account's home
pub const DEFAULT_REPOSITORIES: &str = "repositories";

/// Pseudo-group every identity belongs to
pub const ALL_GROUP: &str = "@all";

/// Access class requested for a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Read-only (`R`)
    Read,
    /// Read-write including forced updates (`RW+`)
    Write,
}

impl Mode {
    /// Option name carrying the exact-match list for this mode
    pub const fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "R",
            Mode::Write => "RW+",
        }
    }

    /// Option name carrying the regex list for this mode
    pub const fn regex_option(&self) -> &'static str {
        match self {
            Mode::Read => "R_regex",
            Mode::Write => "RW+_regex",
        }
    }

    /// Option name of the mapping directive for `path` in this mode
    pub fn map_option(&self, path: &str) -> String {
        format!("map {} {}", self.as_str(), path)
    }

    pub fn try_parse(s: &str) -> Option<Self> {
        match s {
            "R" => Some(Mode::Read),
            "RW+" => Some(Mode::Write),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_parse(s).ok_or_else(|| format!("unknown access mode '{s}'"))
    }
}

/// Which rule granted access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// The path is listed verbatim under the mode option
    Exact,
    /// A `map <mode> <path>` directive names the physical path
    Mapping,
    /// A `<mode>_regex` pattern matched the start of the path
    Regex,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Mapping => "mapping",
            MatchStrategy::Regex => "regex",
        })
    }
}

/// A granted request: where the repository lives and why access was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Directory holding the repositories, relative to home unless absolute
    pub prefix: String,
    /// Extension-less path of the repository below `prefix`
    pub path: String,
    /// Group whose rule matched
    pub group: String,
    pub strategy: MatchStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_roundtrip() {
        for mode in [Mode::Read, Mode::Write] {
            assert_eq!(Mode::try_parse(mode.as_str()), Some(mode));
        }
        assert!("W".parse::<Mode>().is_err());
    }

    #[test]
    fn test_option_names() {
        assert_eq!(Mode::Write.regex_option(), "RW+_regex");
        assert_eq!(Mode::Read.map_option("foo/bar"), "map R foo/bar");
    }
}
