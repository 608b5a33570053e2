//! Quoting-aware word splitting for policy values
//!
//! Group member lists and multi-valued options are whitespace separated
//! words. A word may be wrapped in `'` or `"` to carry whitespace; inside
//! quotes a backslash escapes only `'`, `"` and `\`.

use crate::error::{PolicyError, PolicyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between words, or inside an unquoted word
    Bare,
    /// Inside a quoted word opened by the given character
    Quoted(char),
    /// Just saw a backslash inside a quoted word
    Escape(char),
    /// A quoted word closed; only whitespace may follow
    Closed,
}

/// Split a line into words, honoring quotes.
pub fn split_words(line: &str) -> PolicyResult<Vec<String>> {
    let line = line.trim();

    if !line.contains(['\'', '"']) {
        return Ok(line.split_whitespace().map(str::to_string).collect());
    }

    let mut words = Vec::new();
    let mut word = String::new();
    // A quoted empty word still counts as a word
    let mut started = false;
    let mut state = State::Bare;

    for c in line.chars() {
        state = match state {
            State::Closed => {
                if !c.is_whitespace() {
                    return Err(PolicyError::Tokenize {
                        message: format!("Word is closed, but extra chars follow in '{line}'"),
                    });
                }
                words.push(std::mem::take(&mut word));
                started = false;
                State::Bare
            }
            State::Escape(quote) => {
                if !matches!(c, '\'' | '"' | '\\') {
                    // Not an escape sequence, keep the backslash
                    word.push('\\');
                }
                word.push(c);
                State::Quoted(quote)
            }
            State::Quoted(quote) => {
                if c == quote {
                    State::Closed
                } else if c == '\\' {
                    State::Escape(quote)
                } else {
                    word.push(c);
                    State::Quoted(quote)
                }
            }
            State::Bare => {
                if c.is_whitespace() {
                    if started {
                        words.push(std::mem::take(&mut word));
                        started = false;
                    }
                    State::Bare
                } else if matches!(c, '\'' | '"') && !started {
                    started = true;
                    State::Quoted(c)
                } else {
                    started = true;
                    word.push(c);
                    State::Bare
                }
            }
        };
    }

    match state {
        State::Quoted(_) => Err(PolicyError::Tokenize {
            message: format!("Open quotation mark not closed! In '{line}'."),
        }),
        State::Escape(_) => Err(PolicyError::Tokenize {
            message: format!("Trailing '\\' is not allowed! In '{line}'."),
        }),
        State::Closed | State::Bare => {
            if started {
                words.push(word);
            }
            Ok(words)
        }
    }
}

/// Join words back into a line that [`split_words`] reads identically.
pub fn join_words<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(|w| quote_word(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn needs_quoting(word: &str) -> bool {
    word.is_empty() || word.starts_with(['\'', '"']) || word.contains(char::is_whitespace)
}

fn quote_word(word: &str) -> String {
    if !needs_quoting(word) {
        return word.to_string();
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if matches!(c, '\'' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}
