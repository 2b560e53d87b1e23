use regex::Regex;

use crate::models::{ConfigError, Document};
use crate::store::TaggedFileStore;

#[derive(Debug, Clone)]
enum Rule {
    /// Pattern without `*`: exact file name or a whole path segment.
    Plain(String),
    /// Pattern with `*`, compiled once.
    Wildcard(Regex),
}

/// Compiled exclusion patterns.
///
/// Matching is case-insensitive. A plain pattern excludes a document whose
/// basename or file name equals it, or whose path contains it as a whole
/// folder segment. A wildcard pattern (`*` matches anything) must match the
/// whole path, a trailing part of it starting at a `/`, or a part enclosed
/// by `/` on both sides.
///
/// # Examples
///
/// ```
/// use vellum::batch::ExclusionMatcher;
/// use vellum::models::Document;
///
/// let matcher = ExclusionMatcher::new(&["templates/*".to_string()]).unwrap();
/// assert!(matcher.is_excluded(&Document::new("templates/a.md", 0)));
/// assert!(matcher.is_excluded(&Document::new("notes/templates/b.md", 0)));
/// assert!(!matcher.is_excluded(&Document::new("my-templates-folder/c.md", 0)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    rules: Vec<Rule>,
}

impl ExclusionMatcher {
    /// Compiles `patterns`. Blank patterns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if a wildcard pattern does not
    /// compile.
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let rules = patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                if !pattern.contains('*') {
                    return Ok(Rule::Plain(pattern));
                }
                let body = regex::escape(&pattern).replace(r"\*", ".*");
                Regex::new(&format!("^(?:{body})$|/(?:{body})$|/(?:{body})/"))
                    .map(Rule::Wildcard)
                    .map_err(|source| ConfigError::InvalidPattern { pattern, source })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns `true` if any pattern matches the document.
    pub fn is_excluded(&self, document: &Document) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let path = document.path.to_lowercase();
        let rooted = format!("/{path}");
        let file_name = document.file_name().to_lowercase();
        let basename = document.basename().to_lowercase();

        self.rules.iter().any(|rule| match rule {
            Rule::Plain(pattern) => {
                basename == *pattern
                    || file_name == *pattern
                    || rooted.contains(&format!("/{pattern}/"))
            }
            Rule::Wildcard(regex) => regex.is_match(&path),
        })
    }
}

/// Returns `true` if the document needs processing: it was never annotated,
/// or it was modified strictly after its last annotation.
pub fn is_stale(document: &Document, ledger: &dyn TaggedFileStore) -> bool {
    ledger
        .last_tagged(&document.path)
        .is_none_or(|tagged_at| document.modified_ms > tagged_at)
}
