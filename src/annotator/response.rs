//! Parsing of raw model output into a summary and a bounded tag list.
//!
//! Parsing never fails. Whatever the model returns, the result is a best-effort
//! summary and a tag list that only contains vocabulary members, holds no
//! duplicates, keeps the model's order, and never exceeds the configured maximum.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{AnnotationConfig, is_literary_genre};

static SUMMARY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Summary:\s*(.+)").expect("valid summary regex"));

static TAGS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Suggested tags:\s*(.+)").expect("valid tags regex"));

static PARENTHESIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("valid parenthesis regex"));

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[^\]]*\]").expect("valid bracket regex"));

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid think regex"));

/// Summary and tags extracted from one model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    pub summary: String,
    pub tags: Vec<String>,
}

/// Parses a raw model response.
///
/// - Summary: the text after a `Summary:` label (case-insensitive), or the
///   first line of the response if there is no label.
/// - Tags: the comma-separated list after `Suggested tags:`, cleaned with
///   [`clean_tag`], filtered to `vocabulary` (plus the literary genres when
///   genre detection is on), de-duplicated, and cut to
///   [`AnnotationConfig::effective_max`].
///
/// Reasoning sections wrapped in `<think>` tags are ignored.
///
/// # Examples
///
/// ```
/// use vellum::annotator::parse_response;
/// use vellum::models::AnnotationConfig;
///
/// let vocabulary = vec!["work".to_string(), "personal".to_string()];
/// let config = AnnotationConfig::new("m", vocabulary.clone()).with_tag_bounds(1, 2);
///
/// let parsed = parse_response(
///     "Summary: Greeting.\nSuggested tags: work, personal, extra",
///     &vocabulary,
///     &config,
/// );
/// assert_eq!(parsed.summary, "Greeting.");
/// assert_eq!(parsed.tags, vec!["work", "personal"]);
/// ```
pub fn parse_response(
    raw: &str,
    vocabulary: &[String],
    config: &AnnotationConfig,
) -> ParsedResponse {
    let text = THINK_BLOCK.replace_all(raw, "");
    let text = text.trim();

    let summary = match SUMMARY_LINE.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.lines().next().unwrap_or_default().trim().to_string(),
    };

    let Some(caps) = TAGS_LINE.captures(text) else {
        return ParsedResponse {
            summary,
            tags: Vec::new(),
        };
    };

    let accepts = |tag: &str| {
        vocabulary.iter().any(|v| v == tag)
            || (config.detect_literary_genre && is_literary_genre(tag))
    };

    let mut seen = HashSet::new();
    let tags = unwrap_list(caps[1].trim())
        .split(',')
        .map(clean_tag)
        .filter(|tag| !tag.is_empty() && accepts(tag.as_str()) && seen.insert(tag.clone()))
        .take(config.effective_max())
        .collect();

    ParsedResponse { summary, tags }
}

/// Cleans one tag candidate.
///
/// Removes a leading `#`, parenthesised or bracketed annotations, markdown
/// emphasis or quotes around the tag, and surrounding whitespace. Case is
/// preserved because vocabulary matching is case-sensitive.
///
/// # Examples
///
/// ```
/// use vellum::annotator::clean_tag;
///
/// assert_eq!(clean_tag(" #work "), "work");
/// assert_eq!(clean_tag("travel (mentions a trip)"), "travel");
/// assert_eq!(clean_tag("poesia [genre]"), "poesia");
/// assert_eq!(clean_tag("**personal**"), "personal");
/// ```
pub fn clean_tag(candidate: &str) -> String {
    let tag = candidate.trim();
    let tag = tag.strip_prefix('#').unwrap_or(tag);
    let tag = PARENTHESIZED.replace_all(tag, "");
    let tag = BRACKETED.replace_all(&tag, "");
    tag.trim()
        .trim_matches(|c: char| matches!(c, '*' | '`' | '"' | '\''))
        .trim()
        .to_string()
}

/// Strips one pair of brackets around the whole list (`[a, b]` -> `a, b`).
fn unwrap_list(list: &str) -> &str {
    list.strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(list)
}
