//! Ordered include/exclude rules built from glob patterns.
//!
//! A leading `!` turns a rule into a re-include. The last rule that matches
//! a path decides; a path no rule matches is included.

use crate::glob::{GlobError, GlobPattern};
use std::borrow::Cow;
use std::path::Path;

const FOLD_BACKSLASHES: bool = cfg!(windows);

#[derive(Debug, Clone)]
struct Rule {
    pattern: GlobPattern,
    negated: bool,
}

/// Compiled exclude rule set. Built once per indexing run.
#[derive(Debug, Clone, Default)]
pub struct ExcludeRules {
    rules: Vec<Rule>,
}

impl ExcludeRules {
    pub fn build<S: AsRef<str>>(patterns: &[S], case_insensitive: bool) -> Result<Self, GlobError> {
        let rules = patterns
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                let (negated, body) = match raw.strip_prefix('!') {
                    Some(rest) => (true, rest),
                    None => (false, raw),
                };
                let body = fold(body);
                Ok(Rule {
                    pattern: GlobPattern::compile_with(&body, case_insensitive)?,
                    negated,
                })
            })
            .collect::<Result<Vec<_>, GlobError>>()?;

        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if the path should be skipped.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let mut path = fold(path);
        if !path.starts_with('/') && !Path::new(path.as_ref()).is_absolute() {
            path = Cow::Owned(format!("/{path}"));
        }

        self.rules
            .iter()
            .rev()
            .find(|rule| rule.pattern.is_match(&path))
            .is_some_and(|rule| !rule.negated)
    }
}

fn fold(s: &str) -> Cow<'_, str> {
    if FOLD_BACKSLASHES && s.contains('\\') {
        Cow::Owned(s.replace('\\', "/"))
    } else {
        Cow::Borrowed(s)
    }
}
