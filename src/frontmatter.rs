//! Leading metadata block ("frontmatter") handling.
//!
//! Only the constrained block at the very start of a document is understood:
//! an opening `---` line, `key: value` lines, and a closing `---` line.
//! Everything after the closing delimiter is the body and is never touched.
//!
//! Three keys are owned by this crate (see [`SYSTEM_KEYS`]); every other key
//! is preserved verbatim and in order.

mod codec;
mod scanner;

pub use codec::{Block, detect, format_timestamp, insert, split_block, strip};
pub use scanner::{LineState, ScanError, remove_system_keys};

/// Delimiter line that opens and closes a metadata block.
pub const DELIMITER: &str = "---";

/// Key holding the bracketed tag list.
pub const TAGS_KEY: &str = "tags";

/// Key holding the annotation timestamp. Its presence marks a document as annotated.
pub const TAGGED_KEY: &str = "LLM-tagged";

/// Key holding the quoted summary.
pub const SUMMARY_KEY: &str = "LLM-summary";

/// All keys written and owned by the annotator.
pub const SYSTEM_KEYS: [&str; 3] = [TAGS_KEY, TAGGED_KEY, SUMMARY_KEY];

/// Returns the system key a frontmatter line starts with, if any.
///
/// The key must start at column 0 and be followed directly by `:`, so
/// `tagsets: x` is not mistaken for `tags:` and keys nested under another
/// key (`  tags: x`) are never system keys.
pub(crate) fn system_key_of(line: &str) -> Option<&'static str> {
    SYSTEM_KEYS.into_iter().find(|key| {
        line.strip_prefix(key)
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_key_detection_requires_colon() {
        assert_eq!(system_key_of("tags: [a]"), Some(TAGS_KEY));
        assert_eq!(system_key_of("LLM-tagged: 2024"), Some(TAGGED_KEY));
        assert_eq!(system_key_of("LLM-summary: \"x\""), Some(SUMMARY_KEY));
        assert_eq!(system_key_of("tagsets: [a]"), None);
        assert_eq!(system_key_of("title: tags:"), None);
    }

    #[test]
    fn nested_keys_are_not_system_keys() {
        assert_eq!(system_key_of("  tags: [mine]"), None);
        assert_eq!(system_key_of("\tLLM-tagged: 2024"), None);
        assert_eq!(system_key_of(" LLM-summary: \"x\""), None);
    }
}
