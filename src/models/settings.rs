use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper limit accepted for the configured tag bounds.
pub const MAX_TAG_BOUND: usize = 10;

/// Configuration problems detected before any document is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no model selected; set `selected_model` or OLLAMA_MODEL")]
    NoModelSelected,

    #[error("tag vocabulary is empty; configure at least one tag")]
    EmptyVocabulary,

    #[error("invalid tag bounds: min {min}, max {max} (need 1 <= min <= max <= 10)")]
    InvalidTagBounds { min: usize, max: usize },

    #[error("invalid exclusion pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Persisted settings, stored as JSON.
///
/// Missing fields take their default values, so older or hand-written
/// settings files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Model used for annotation.
    pub selected_model: Option<String>,
    /// Thematic tag vocabulary the model must choose from.
    pub vocabulary: Vec<String>,
    /// Annotate created/modified documents automatically (`vellum watch`).
    pub auto_tag: bool,
    /// Vault-relative path to Unix milliseconds of the last successful annotation.
    pub tagged_files: BTreeMap<String, i64>,
    /// File or folder patterns excluded from annotation.
    pub exclude_patterns: Vec<String>,
    /// Language the summary is written in.
    pub language: String,
    /// Free-text instructions appended to the prompt.
    pub custom_instructions: String,
    pub min_tags: usize,
    pub max_tags: usize,
    /// Ask the model for one extra literary-genre tag.
    pub detect_literary_genre: bool,
    /// Per-request timeout for the model service.
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            selected_model: None,
            vocabulary: Vec::new(),
            auto_tag: false,
            tagged_files: BTreeMap::new(),
            exclude_patterns: Vec::new(),
            language: "English".to_string(),
            custom_instructions: String::new(),
            min_tags: 3,
            max_tags: 5,
            detect_literary_genre: false,
            request_timeout_secs: 120,
        }
    }
}

impl Settings {
    /// Builds the validated, read-only configuration the annotator runs with.
    ///
    /// Vocabulary entries are trimmed and blank entries dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if no model is selected, the vocabulary is
    /// empty, or the tag bounds are out of range.
    pub fn annotation_config(&self) -> Result<AnnotationConfig, ConfigError> {
        let model = self
            .selected_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or(ConfigError::NoModelSelected)?;

        let config = AnnotationConfig {
            model: model.to_string(),
            vocabulary: self
                .vocabulary
                .iter()
                .map(|tag| tag.trim())
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect(),
            min_tags: self.min_tags,
            max_tags: self.max_tags,
            detect_literary_genre: self.detect_literary_genre,
            language: self.language.clone(),
            custom_instructions: self.custom_instructions.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Everything the annotation engine needs to know about one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationConfig {
    pub model: String,
    pub vocabulary: Vec<String>,
    pub min_tags: usize,
    pub max_tags: usize,
    pub detect_literary_genre: bool,
    pub language: String,
    pub custom_instructions: String,
}

impl AnnotationConfig {
    /// Creates a configuration with the default bounds (3..=5), English
    /// summaries and genre detection off.
    pub fn new(model: impl Into<String>, vocabulary: Vec<String>) -> Self {
        Self {
            model: model.into(),
            vocabulary,
            min_tags: 3,
            max_tags: 5,
            detect_literary_genre: false,
            language: "English".to_string(),
            custom_instructions: String::new(),
        }
    }

    pub fn with_tag_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_tags = min;
        self.max_tags = max;
        self
    }

    pub fn with_genre_detection(mut self, enabled: bool) -> Self {
        self.detect_literary_genre = enabled;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = instructions.into();
        self
    }

    /// Checks the invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an empty model, an empty vocabulary, or
    /// bounds outside `1 <= min <= max <= 10`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::NoModelSelected);
        }
        if self.vocabulary.iter().all(|tag| tag.trim().is_empty()) {
            return Err(ConfigError::EmptyVocabulary);
        }
        if self.min_tags < 1 || self.min_tags > self.max_tags || self.max_tags > MAX_TAG_BOUND {
            return Err(ConfigError::InvalidTagBounds {
                min: self.min_tags,
                max: self.max_tags,
            });
        }
        Ok(())
    }

    /// Maximum number of tags kept from a response: one more than `max_tags`
    /// when genre detection is on.
    pub fn effective_max(&self) -> usize {
        if self.detect_literary_genre {
            self.max_tags + 1
        } else {
            self.max_tags
        }
    }
}
