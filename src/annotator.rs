//! The annotation engine for single documents.
//!
//! - [`build_prompt`] turns the configuration and a document into the
//!   instruction text sent to the model.
//! - [`parse_response`] turns the model's free-text answer into a summary and
//!   a validated, bounded tag list.
//! - [`DocumentAnnotator`] ties both to the frontmatter codec, with the
//!   already-tagged guard and the concurrent-edit check.

mod document;
mod prompt;
mod response;

pub use document::{AnnotateError, DocumentAnnotator, untag};
pub use prompt::build_prompt;
pub use response::{ParsedResponse, clean_tag, parse_response};
