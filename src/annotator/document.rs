//! Single-document annotation and stripping.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::batch::CancellationFlag;
use crate::frontmatter;
use crate::models::{AnnotationConfig, AnnotationOutcome, SkipReason, StripOutcome};
use crate::ollama::{OllamaClientTrait, OllamaError};
use crate::store::{StoreError, TaggedFileStore};
use crate::utils::unix_millis;
use crate::vault::DocumentStore;

use super::prompt::build_prompt;
use super::response::parse_response;

/// Why annotating or stripping a document failed.
///
/// The document is never modified when one of these is returned, except for
/// [`AnnotateError::Store`], which is raised after the write succeeded.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("model request failed")]
    Model(#[from] OllamaError),

    #[error("failed to access document {path}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to record tagging state")]
    Store(#[from] StoreError),
}

/// Annotates documents one at a time through a language model.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use vellum::annotator::DocumentAnnotator;
/// use vellum::batch::CancellationFlag;
/// use vellum::models::AnnotationConfig;
/// use vellum::ollama::OllamaClientBuilder;
/// use vellum::store::MemoryStore;
/// use vellum::vault::FsVault;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClientBuilder::new().build()?;
/// let config = AnnotationConfig::new("gemma3:4b", vec!["work".into(), "personal".into()]);
/// let annotator = DocumentAnnotator::new(Arc::new(client), config);
///
/// let vault = FsVault::open("./notes")?;
/// let mut ledger = MemoryStore::new();
/// let outcome = annotator.annotate(&vault, &mut ledger, "inbox.md", &CancellationFlag::new())?;
/// println!("{outcome:?}");
/// # Ok(())
/// # }
/// ```
pub struct DocumentAnnotator {
    client: Arc<dyn OllamaClientTrait>,
    config: AnnotationConfig,
    clock: fn() -> OffsetDateTime,
}

impl DocumentAnnotator {
    pub fn new(client: Arc<dyn OllamaClientTrait>, config: AnnotationConfig) -> Self {
        Self {
            client,
            config,
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Replaces the clock used for annotation timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AnnotationConfig {
        &self.config
    }

    /// Annotates the document at `path`.
    ///
    /// Already-annotated and blank documents are skipped without a model
    /// call. Otherwise the content is snapshotted, the model is asked for a
    /// summary and tags, and the document is re-read: if it changed during the
    /// call, or cancellation was requested meanwhile, nothing is written. On
    /// success the new metadata block is written and the ledger records the
    /// current instant for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError`] if the model call, the document I/O, or the
    /// ledger update fails.
    pub fn annotate(
        &self,
        vault: &dyn DocumentStore,
        ledger: &mut dyn TaggedFileStore,
        path: &str,
        cancel: &CancellationFlag,
    ) -> Result<AnnotationOutcome, AnnotateError> {
        let snapshot = read(vault, path)?;

        if frontmatter::detect(&snapshot) {
            return Ok(skip(path, SkipReason::AlreadyTagged));
        }
        if snapshot.trim().is_empty() {
            return Ok(skip(path, SkipReason::EmptyDocument));
        }

        let prompt = build_prompt(&self.config, &self.config.vocabulary, &snapshot);
        debug!(path, model = %self.config.model, "requesting annotation");
        let raw = self.client.generate(&self.config.model, &prompt)?;
        let parsed = parse_response(&raw, &self.config.vocabulary, &self.config);

        if cancel.is_cancelled() {
            return Ok(skip(path, SkipReason::Cancelled));
        }
        if read(vault, path)? != snapshot {
            return Ok(skip(path, SkipReason::ContentChanged));
        }
        if parsed.tags.is_empty() {
            return Ok(skip(path, SkipReason::NoTags));
        }

        let updated = frontmatter::insert(
            &snapshot,
            &parsed.tags,
            &parsed.summary,
            (self.clock)(),
        );
        if updated == snapshot {
            return Ok(skip(path, SkipReason::NoChange));
        }

        write(vault, path, &updated)?;
        ledger.mark_tagged(path, unix_millis((self.clock)()));
        ledger.persist()?;

        info!(path, tags = ?parsed.tags, "annotated");
        Ok(AnnotationOutcome::Annotated {
            tags: parsed.tags,
            summary: parsed.summary,
        })
    }
}

/// Removes the annotator's keys from the document at `path`.
///
/// Other metadata keys survive; a block left with no keys is removed
/// entirely. The ledger entry for `path` is dropped on success. No model is
/// involved.
///
/// # Errors
///
/// Returns [`AnnotateError`] if the document I/O or the ledger update fails.
pub fn untag(
    vault: &dyn DocumentStore,
    ledger: &mut dyn TaggedFileStore,
    path: &str,
) -> Result<StripOutcome, AnnotateError> {
    let content = read(vault, path)?;
    if !frontmatter::detect(&content) {
        debug!(path, "no annotation to strip");
        return Ok(StripOutcome::NoOp);
    }

    let stripped = frontmatter::strip(&content);
    if stripped == content {
        debug!(path, "annotation could not be stripped safely");
        return Ok(StripOutcome::NoOp);
    }

    write(vault, path, &stripped)?;
    ledger.forget(path);
    ledger.persist()?;

    info!(path, "stripped annotation");
    Ok(StripOutcome::Stripped)
}

fn skip(path: &str, reason: SkipReason) -> AnnotationOutcome {
    debug!(path, %reason, "skipped");
    AnnotationOutcome::Skipped(reason)
}

fn read(vault: &dyn DocumentStore, path: &str) -> Result<String, AnnotateError> {
    vault.read(path).map_err(|source| AnnotateError::Io {
        path: path.to_string(),
        source,
    })
}

fn write(vault: &dyn DocumentStore, path: &str, content: &str) -> Result<(), AnnotateError> {
    vault.write(path, content).map_err(|source| AnnotateError::Io {
        path: path.to_string(),
        source,
    })
}
