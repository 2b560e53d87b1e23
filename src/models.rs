mod document;
mod genre;
mod outcome;
mod settings;

pub use document::Document;
pub use genre::{LITERARY_GENRES, is_literary_genre};
pub use outcome::{AnnotationOutcome, BatchReport, SkipReason, StripOutcome};
pub use settings::{AnnotationConfig, ConfigError, MAX_TAG_BOUND, Settings};
