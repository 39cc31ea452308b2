//! User-facing errors for CLI commands
//!
//! Printed as an `ERROR:` line, an optional `CONTEXT:` line, and `TRY:`
//! hints.

use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub struct HelpfulError {
    message: String,
    context: Option<String>,
    tries: Vec<String>,
}

impl HelpfulError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            tries: Vec::new(),
        }
    }

    fn because(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn try_these<const N: usize>(mut self, tries: [String; N]) -> Self {
        self.tries.extend(tries);
        self
    }

    pub fn file_not_found(path: &Path) -> Self {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Self::new(format!("File not found: {}", path.display()))
            .because("Nothing to fingerprint at that path")
            .try_these([
                format!("ls -la {}", path.display()),
                format!("ls {}", dir.display()),
            ])
    }

    pub fn invalid_remap(spec: &str) -> Self {
        Self::new(format!("Invalid remap: '{spec}'"))
            .because("A remap needs exactly one ':' between two non-empty directories")
            .try_these([
                "hashdex index --remap /old/photos:/new/photos".to_string(),
                "Quote the value if a directory contains spaces".to_string(),
            ])
    }

    pub fn import_failed(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot import index: {}", path.display()))
            .because(reason)
            .try_these([
                format!("ls -la {}", path.display()),
                "Make sure the file is a hashdex index (it needs a 'files' table)".to_string(),
                "Nothing was imported; fix the source and run the import again".to_string(),
            ])
    }

    pub fn invalid_pattern(pattern: &str, details: &str) -> Self {
        Self::new(format!("Invalid pattern: '{pattern}'"))
            .because(details)
            .try_these([
                "Close character classes, e.g. 'file[0-9].txt'".to_string(),
                "Use '**/' to match any number of directories".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;
        if let Some(context) = &self.context {
            writeln!(f, "CONTEXT: {context}")?;
        }
        if !self.tries.is_empty() {
            writeln!(f)?;
            for hint in &self.tries {
                writeln!(f, "  TRY: {hint}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

impl From<hashdex::IndexError> for HelpfulError {
    fn from(err: hashdex::IndexError) -> Self {
        use hashdex::IndexError;

        match err {
            IndexError::ImportFailure { path, reason } => Self::import_failed(&path, &reason),
            IndexError::Pattern(hashdex::GlobError::Invalid { pattern, source }) => {
                Self::invalid_pattern(&pattern, &source.to_string())
            }
            IndexError::FileAccess { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::file_not_found(&path)
            }
            other => Self::new(other.to_string()),
        }
    }
}
