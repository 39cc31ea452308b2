//! Shell-style glob patterns compiled to anchored path matchers.
//!
//! Rules:
//! - Without a leading separator, any number of leading directories is allowed
//! - `?` is one non-separator character, `*` is any run of them
//! - `**` at the end matches everything, `**/` matches zero or more directories
//! - `[...]` is a character class, `[!...]` its negation
//! - `/` and `\` are interchangeable
//! - A pattern not ending in a separator or `*` also matches with a trailing
//!   separator (file or directory)

use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

/// Any character except a path separator.
const NOT_SEP: &str = r"[^/\\]";
/// Either path separator.
const SEP: &str = r"[/\\]";
/// Zero or more whole path segments, each with its trailing separator.
const ANY_SEGMENTS: &str = r"(?:[^/\\]*[/\\])*";

#[derive(Error, Debug)]
pub enum GlobError {
    #[error("Invalid glob pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled glob. Immutable; cheap to clone.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a case-sensitive pattern.
    pub fn compile(pattern: &str) -> Result<Self, GlobError> {
        Self::compile_with(pattern, false)
    }

    /// Compile a pattern, optionally ignoring case.
    pub fn compile_with(pattern: &str, case_insensitive: bool) -> Result<Self, GlobError> {
        let regex = RegexBuilder::new(&glob_to_regex(pattern))
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|source| GlobError::Invalid {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The generated regular expression.
    pub fn regex_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Translate a glob into regex source.
pub fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut rx = String::with_capacity(glob.len() * 4 + 32);
    rx.push('^');

    if !matches!(chars.first(), Some('/' | '\\')) {
        rx.push_str(ANY_SEGMENTS);
    }

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '?' => {
                let mut run = 1;
                while chars.get(i + run) == Some(&'?') {
                    run += 1;
                }
                rx.push_str(NOT_SEP);
                if run > 1 {
                    rx.push_str(&format!("{{{run}}}"));
                }
                i += run;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    if i + 2 == chars.len() {
                        rx.push_str(".*");
                        i += 2;
                        continue;
                    }
                    if matches!(chars.get(i + 2), Some('/' | '\\')) {
                        // The separator belongs to the segment group
                        rx.push_str(ANY_SEGMENTS);
                        i += 3;
                        continue;
                    }
                }
                rx.push_str(NOT_SEP);
                rx.push('*');
                i += 1;
            }
            '[' => {
                i = push_class(&chars, i + 1, &mut rx);
            }
            '/' | '\\' => {
                rx.push_str(SEP);
                i += 1;
            }
            ch => {
                let mut buf = [0u8; 4];
                rx.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
                i += 1;
            }
        }
    }

    let open_ended = matches!(chars.last(), Some('/' | '\\' | '*'));
    if !open_ended {
        rx.push_str(SEP);
        rx.push('?');
    }

    rx.push('$');
    rx
}

/// Copy a character class starting just after its `[`. Returns the index
/// after the closing `]`, or the end of input when the class is unterminated.
fn push_class(chars: &[char], mut i: usize, rx: &mut String) -> usize {
    rx.push('[');
    if chars.get(i) == Some(&'!') {
        rx.push('^');
        i += 1;
    }

    while i < chars.len() && chars[i] != ']' {
        let ch = chars[i];
        if ch == '\\' {
            // Escapes pass through as written; a dangling one is dropped
            if let Some(&next) = chars.get(i + 1) {
                rx.push('\\');
                rx.push(next);
            }
            i += 2;
            continue;
        }
        // Nested classes and doubled set operators are not glob syntax
        let doubled = matches!(ch, '&' | '~' | '-') && chars.get(i + 1) == Some(&ch);
        if ch == '[' || doubled {
            rx.push('\\');
        }
        rx.push(ch);
        i += 1;
    }

    rx.push(']');
    // Skip the closing bracket if there was one
    (i + 1).min(chars.len())
}
