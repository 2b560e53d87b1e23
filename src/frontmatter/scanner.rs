//! Line-state scanner that removes system-owned keys from a metadata block.
//!
//! A system key may span several lines:
//!
//! - a bracketed list opened on the key line and closed later (`tags: [a,` / `b]`)
//! - a quoted value opened on the key line and closed later
//! - an empty value followed by indented or `- ` prefixed continuation lines
//!
//! The scanner walks the block one line at a time and never guesses: a list or
//! quote that is still open when the block ends is reported as
//! [`ScanError::Unterminated`] so callers can leave the document alone.

use thiserror::Error;

use super::system_key_of;

/// Scanner state while walking the lines of a metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// At key level inside the block.
    InBlock,
    /// Skipping the continuation of a system-owned list.
    ///
    /// `bracketed` lists end at the line holding `]`; unbracketed ones end at
    /// the first line that is neither indented nor a `- ` item.
    InMultilineList { bracketed: bool },
    /// Skipping the continuation of a system-owned quoted value.
    InMultilineQuote,
    /// Past the last line of the block.
    Body,
}

/// Errors raised when a metadata block cannot be scanned safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// A system-owned list or quote was still open at the end of the block.
    #[error("unterminated {kind} for key '{key}' in metadata block")]
    Unterminated {
        key: &'static str,
        kind: &'static str,
    },
}

/// Removes every system-owned key (including continuation lines) from `lines`.
///
/// Returns the remaining lines in their original order.
///
/// # Errors
///
/// Returns [`ScanError::Unterminated`] if a multi-line list or quote belonging
/// to a system key never closes.
///
/// # Examples
///
/// ```
/// use vellum::frontmatter::remove_system_keys;
///
/// let lines = ["title: Note", "tags: [a,", "  b]", "LLM-tagged: 2024-01-01T00:00:00.000Z"];
/// assert_eq!(remove_system_keys(&lines).unwrap(), vec!["title: Note"]);
/// ```
pub fn remove_system_keys<'a>(lines: &[&'a str]) -> Result<Vec<&'a str>, ScanError> {
    let mut kept = Vec::with_capacity(lines.len());
    let mut state = LineState::InBlock;
    let mut open_key: &'static str = "";

    for &line in lines {
        match state {
            LineState::InMultilineList { bracketed: true } => {
                if line.contains(']') {
                    state = LineState::InBlock;
                }
                continue;
            }
            LineState::InMultilineQuote => {
                if closes_quote(line) {
                    state = LineState::InBlock;
                }
                continue;
            }
            LineState::InMultilineList { bracketed: false } => {
                if is_continuation(line) {
                    continue;
                }
                state = LineState::InBlock;
            }
            LineState::InBlock | LineState::Body => {}
        }

        let Some(key) = system_key_of(line) else {
            kept.push(line);
            continue;
        };

        open_key = key;
        state = state_after_key_line(line);
    }

    match state {
        LineState::InMultilineList { bracketed: true } => Err(ScanError::Unterminated {
            key: open_key,
            kind: "list",
        }),
        LineState::InMultilineQuote => Err(ScanError::Unterminated {
            key: open_key,
            kind: "quoted value",
        }),
        _ => Ok(kept),
    }
}

/// Decides what follows a line that starts a system key.
fn state_after_key_line(line: &str) -> LineState {
    let value = line
        .split_once(':')
        .map(|(_, value)| value.trim())
        .unwrap_or_default();

    if value.is_empty() {
        return LineState::InMultilineList { bracketed: false };
    }
    if value.starts_with('[') && !value.contains(']') {
        return LineState::InMultilineList { bracketed: true };
    }
    if let Some(quoted) = value.strip_prefix('"')
        && !closes_quote(quoted)
    {
        return LineState::InMultilineQuote;
    }
    LineState::InBlock
}

/// True if `text` contains a `"` not preceded by an escaping backslash.
fn closes_quote(text: &str) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return true,
            _ => escaped = false,
        }
    }
    false
}

/// Continuation lines of an empty-valued key: indented lines and `- ` items.
fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t']) || line.starts_with("- ") || line == "-"
}
