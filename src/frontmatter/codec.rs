//! Detection, insertion and removal of the annotator's frontmatter keys.

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use super::scanner::{LineState, remove_system_keys};
use super::{DELIMITER, SUMMARY_KEY, TAGGED_KEY, TAGS_KEY, system_key_of};

/// A well-formed metadata block split out of a document.
///
/// Borrowed slices point into the original content, so reserialising
/// `body` reproduces the original bytes exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// Lines between the delimiters, without line terminators.
    pub lines: Vec<&'a str>,
    /// Everything after the closing delimiter line.
    pub body: &'a str,
    /// Whether the closing delimiter was followed by a newline.
    pub closed_with_newline: bool,
}

impl Block<'_> {
    /// True if the block carries the annotation timestamp key.
    pub fn is_tagged(&self) -> bool {
        self.lines
            .iter()
            .any(|line| system_key_of(line) == Some(TAGGED_KEY))
    }

    fn render(&self, lines: &[&str]) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(DELIMITER);
        out.push('\n');
        for line in lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(DELIMITER);
        if self.closed_with_newline {
            out.push('\n');
        }
        out.push_str(self.body);
        out
    }
}

/// Splits a leading metadata block from `content`.
///
/// Returns `None` when the content does not open with a `---` line or the
/// block is never closed; such content is treated as having no block.
pub fn split_block(content: &str) -> Option<Block<'_>> {
    let rest = content.strip_prefix(DELIMITER)?.strip_prefix('\n')?;

    let mut lines = Vec::new();
    let mut state = LineState::InBlock;
    let mut remaining = rest;
    let mut body = "";
    let mut closed_with_newline = false;

    while state == LineState::InBlock {
        let (line, next) = match remaining.split_once('\n') {
            Some((line, next)) => (line, Some(next)),
            None => (remaining, None),
        };

        if line == DELIMITER {
            state = LineState::Body;
            closed_with_newline = next.is_some();
            body = next.unwrap_or_default();
            continue;
        }

        // Unterminated block.
        let next = next?;
        lines.push(line);
        remaining = next;
    }

    Some(Block {
        lines,
        body,
        closed_with_newline,
    })
}

/// Returns `true` if `content` carries an annotator-written metadata block.
///
/// This is the idempotence guard: a document that passes `detect` is never
/// sent to the model again.
///
/// # Examples
///
/// ```
/// use vellum::frontmatter::detect;
///
/// assert!(detect("---\nLLM-tagged: 2024-01-01T00:00:00.000Z\n---\nBody"));
/// assert!(!detect("---\ntags: [mine]\n---\nBody"));
/// assert!(!detect("# No block"));
/// ```
pub fn detect(content: &str) -> bool {
    split_block(content).is_some_and(|block| block.is_tagged())
}

/// Writes `tags`, the timestamp and `summary` into the document's metadata block.
///
/// Existing system keys are replaced, other keys keep their order after the
/// three new lines, and the body is left byte-identical. Content without a
/// block gets a new block followed by one blank line.
///
/// Content whose block holds an unterminated system-owned list or quote is
/// returned unchanged.
pub fn insert(content: &str, tags: &[String], summary: &str, tagged_at: OffsetDateTime) -> String {
    let tags_line = format!("{TAGS_KEY}: [{}]", tags.join(", "));
    let tagged_line = format!("{TAGGED_KEY}: {}", format_timestamp(tagged_at));
    let summary_line = format!("{SUMMARY_KEY}: \"{}\"", escape_summary(summary));
    let fields = [
        tags_line.as_str(),
        tagged_line.as_str(),
        summary_line.as_str(),
    ];

    let Some(block) = split_block(content) else {
        return format!(
            "{DELIMITER}\n{}\n{DELIMITER}\n\n{content}",
            fields.join("\n")
        );
    };

    let Ok(others) = remove_system_keys(&block.lines) else {
        tracing::debug!("metadata block has an unterminated system key; leaving content as is");
        return content.to_string();
    };

    let lines: Vec<&str> = fields.iter().copied().chain(others).collect();
    block.render(&lines)
}

/// Removes the annotator's keys from `content`.
///
/// Content without a tagged block, or with a block that cannot be scanned
/// safely, is returned unchanged. If no non-blank keys remain, the whole
/// block goes, along with the blank separator line `insert` adds.
pub fn strip(content: &str) -> String {
    let Some(block) = split_block(content) else {
        return content.to_string();
    };
    if !block.is_tagged() {
        return content.to_string();
    }

    let others = match remove_system_keys(&block.lines) {
        Ok(others) => others,
        Err(e) => {
            tracing::debug!(error = %e, "refusing to strip metadata block");
            return content.to_string();
        }
    };

    if others.iter().all(|line| line.trim().is_empty()) {
        return block
            .body
            .strip_prefix('\n')
            .unwrap_or(block.body)
            .to_string();
    }

    block.render(&others)
}

/// Formats an instant as ISO-8601 UTC with millisecond precision.
///
/// # Examples
///
/// ```
/// use time::macros::datetime;
/// use vellum::frontmatter::format_timestamp;
///
/// let ts = format_timestamp(datetime!(2024-03-05 07:08:09.123 UTC));
/// assert_eq!(ts, "2024-03-05T07:08:09.123Z");
/// ```
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    let utc = at.to_offset(UtcOffset::UTC);
    utc.format(format)
        .unwrap_or_else(|_| utc.unix_timestamp().to_string())
}

/// Escapes backslashes and quotes and folds line breaks, so the summary stays
/// a one-line quoted value.
fn escape_summary(summary: &str) -> String {
    summary
        .replace(['\r', '\n'], " ")
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
}
