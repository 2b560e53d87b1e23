//! Prompt construction for document annotation.
//!
//! The prompt is a pure function of the configuration, the vocabulary and the
//! document content. It spells out the exact output shape the response parser
//! expects (`Summary:` line, then `Suggested tags:` line) and the mistakes the
//! parser cleans up anyway.

use crate::models::{AnnotationConfig, LITERARY_GENRES};

/// Opening rules. `{min}` and `{max}` are the thematic tag bounds.
const RULES_TEMPLATE: &str = r#"You are an expert at analyzing and tagging markdown documents.

CRITICAL RULES:
- You MUST select between {min} and {max} THEMATIC tags
- Select ONLY the MOST IMPORTANT themes
- Do NOT list every tag that could apply
- Do NOT add explanations or justifications after tags
- Do NOT use parentheses or brackets with tags
- Do NOT invent tags that are not in the available list
- Think: "What are the {min}-{max} CORE topics of this text?""#;

/// Genre block, included only when genre detection is on.
const GENRE_TEMPLATE: &str = r#"

LITERARY GENRE DETECTION (REQUIRED):
First, determine the literary genre of this text from these options:
{genres}

The genre tag is SEPARATE from the {min}-{max} thematic tags.
You should return: 1 genre tag + {min}-{max} thematic tags."#;

const GENRE_TASK_TEMPLATE: &str = r#"
1. First, identify the literary genre (REQUIRED - pick the closest match)
2. Then, select {min}-{max} THEMATIC tags (not counting the genre)
3. Write a brief 1-2 sentence summary in {language}
4. Return the genre tag FIRST, then the thematic tags"#;

const THEMATIC_TASK_TEMPLATE: &str = r#"
1. Read the content carefully
2. Identify the {min}-{max} MOST IMPORTANT themes
3. Write a brief 1-2 sentence summary in {language}
4. Return ONLY the tag names without any explanations"#;

const FORMAT_TEMPLATE: &str = r#"

IMPORTANT: Return tags EXACTLY as they appear in the available tags list.
Do NOT add explanations like "tag (because reason)" or "tag [justification]".

Format your response EXACTLY like this:
Summary: [your summary here]
Suggested tags: {genre_slot}tag1, tag2, tag3"#;

const CONTENT_TEMPLATE: &str = r#"

Content to analyze:
{content}

Provide your response in this format:
Summary: [your summary here]
Suggested tags: [tag1, tag2, tag3]"#;

/// Builds the instruction text sent to the model for one document.
///
/// `vocabulary` is listed verbatim in the order given. Custom instructions,
/// when present, are placed after the format rules and before the content.
///
/// # Examples
///
/// ```
/// use vellum::annotator::build_prompt;
/// use vellum::models::AnnotationConfig;
///
/// let vocabulary = vec!["work".to_string(), "personal".to_string()];
/// let config = AnnotationConfig::new("gemma3:4b", vocabulary.clone()).with_tag_bounds(1, 2);
/// let prompt = build_prompt(&config, &vocabulary, "# Hello");
///
/// assert!(prompt.contains("between 1 and 2 THEMATIC tags"));
/// assert!(prompt.contains("Available thematic tags: work, personal"));
/// assert!(prompt.ends_with("Suggested tags: [tag1, tag2, tag3]"));
/// ```
pub fn build_prompt(config: &AnnotationConfig, vocabulary: &[String], content: &str) -> String {
    let genre = config.detect_literary_genre;
    let fill = |template: &str| {
        template
            .replace("{min}", &config.min_tags.to_string())
            .replace("{max}", &config.max_tags.to_string())
            .replace("{language}", &config.language)
    };

    let mut prompt = fill(RULES_TEMPLATE);

    if genre {
        prompt.push_str(&fill(GENRE_TEMPLATE).replace("{genres}", &LITERARY_GENRES.join(", ")));
    }

    prompt.push_str("\n\nAvailable thematic tags: ");
    prompt.push_str(&vocabulary.join(", "));
    prompt.push_str("\n\nYour task:");
    prompt.push_str(&fill(if genre {
        GENRE_TASK_TEMPLATE
    } else {
        THEMATIC_TASK_TEMPLATE
    }));

    prompt.push_str(&FORMAT_TEMPLATE.replace("{genre_slot}", if genre { "genre_tag, " } else { "" }));

    let custom = config.custom_instructions.trim();
    if !custom.is_empty() {
        prompt.push_str("\n\nAdditional Custom Instructions:\n");
        prompt.push_str(custom);
    }

    // Content goes last so placeholders inside it are never substituted.
    prompt.push_str(&CONTENT_TEMPLATE.replace("{content}", content));
    prompt
}
