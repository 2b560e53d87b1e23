//! LLM-driven frontmatter annotation for markdown vaults.
//!
//! A local Ollama model reads each document and proposes a short summary plus
//! tags drawn from a configured vocabulary. The results are written into the
//! document's leading metadata block and can be stripped again without
//! disturbing anything else in the file.

pub mod annotator;
pub mod batch;
pub mod frontmatter;
pub mod models;
pub mod ollama;
pub mod queue;
pub mod store;
pub mod utils;
pub mod vault;

pub use annotator::{AnnotateError, DocumentAnnotator};
pub use batch::{BatchController, CancellationFlag, ExclusionMatcher};
pub use models::{AnnotationConfig, AnnotationOutcome, BatchReport, Document, Settings};
pub use store::{SettingsFile, TaggedFileStore};
pub use vault::{DocumentStore, FsVault};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_accessible_from_crate_root() {
        let settings = Settings::default();
        assert!(settings.annotation_config().is_err());

        let config = AnnotationConfig::new("m", vec!["work".to_string()]);
        assert!(config.validate().is_ok());

        let report = BatchReport::default();
        assert_eq!(report.to_string(), "0 modified, 0 skipped, 0 failed (0 of 0 processed)");

        let document = Document::new("notes/a.md", 0);
        assert!(!ExclusionMatcher::default().is_excluded(&document));
        assert!(!CancellationFlag::new().is_cancelled());
    }
}
