use tracing::{debug, info, warn};

use crate::annotator::{self, AnnotateError, DocumentAnnotator};
use crate::models::{AnnotationOutcome, BatchReport, Document, SkipReason, StripOutcome};
use crate::store::TaggedFileStore;
use crate::vault::DocumentStore;

use super::cancel::CancellationFlag;
use super::exclusion::{ExclusionMatcher, is_stale};

/// Running state reported after each document.
#[derive(Debug)]
pub struct BatchProgress<'a> {
    pub processed: usize,
    pub total: usize,
    /// Basename of the document just handled.
    pub current: &'a str,
    pub modified: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Set when the document just handled failed.
    pub error: Option<&'a AnnotateError>,
}

/// Annotates or strips a sequence of documents.
///
/// A failing document is counted and reported but never stops the batch.
/// Cancellation is checked before each document; a document whose model call
/// was in flight when cancellation was requested is counted as skipped.
pub struct BatchController {
    exclusion: ExclusionMatcher,
    cancel: CancellationFlag,
}

enum Step {
    Modified,
    Skipped,
}

impl BatchController {
    pub fn new(exclusion: ExclusionMatcher) -> Self {
        Self {
            exclusion,
            cancel: CancellationFlag::new(),
        }
    }

    /// Uses `cancel` instead of a private flag, so another thread can stop the batch.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn exclusion(&self) -> &ExclusionMatcher {
        &self.exclusion
    }

    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancel
    }

    /// Annotates `documents` in order.
    ///
    /// Excluded documents and documents not modified since their last
    /// annotation are skipped without reading them.
    pub fn run_annotate(
        &self,
        annotator: &DocumentAnnotator,
        vault: &dyn DocumentStore,
        ledger: &mut dyn TaggedFileStore,
        documents: &[Document],
        progress: impl FnMut(&BatchProgress<'_>),
    ) -> BatchReport {
        let report = self.run(documents, progress, |document| {
            let outcome = self.annotate_document(annotator, vault, &mut *ledger, document)?;
            Ok(if outcome.is_annotated() {
                Step::Modified
            } else {
                Step::Skipped
            })
        });
        info!(%report, "annotation batch finished");
        report
    }

    /// Annotates one document, applying the exclusion and staleness checks
    /// a batch applies.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError`] if the annotator fails.
    pub fn annotate_document(
        &self,
        annotator: &DocumentAnnotator,
        vault: &dyn DocumentStore,
        ledger: &mut dyn TaggedFileStore,
        document: &Document,
    ) -> Result<AnnotationOutcome, AnnotateError> {
        let reason = if self.exclusion.is_excluded(document) {
            SkipReason::Excluded
        } else if !is_stale(document, &*ledger) {
            SkipReason::NotModified
        } else {
            return annotator.annotate(vault, ledger, &document.path, &self.cancel);
        };
        debug!(path = %document.path, %reason, "skipped");
        Ok(AnnotationOutcome::Skipped(reason))
    }

    /// Strips the annotator's keys from `documents` in order.
    ///
    /// Exclusion patterns apply; staleness does not.
    pub fn run_untag(
        &self,
        vault: &dyn DocumentStore,
        ledger: &mut dyn TaggedFileStore,
        documents: &[Document],
        progress: impl FnMut(&BatchProgress<'_>),
    ) -> BatchReport {
        let report = self.run(documents, progress, |document| {
            if self.exclusion.is_excluded(document) {
                debug!(path = %document.path, reason = %SkipReason::Excluded, "skipped");
                return Ok(Step::Skipped);
            }
            Ok(match annotator::untag(vault, &mut *ledger, &document.path)? {
                StripOutcome::Stripped => Step::Modified,
                StripOutcome::NoOp => Step::Skipped,
            })
        });
        info!(%report, "strip batch finished");
        report
    }

    fn run(
        &self,
        documents: &[Document],
        mut progress: impl FnMut(&BatchProgress<'_>),
        mut step: impl FnMut(&Document) -> Result<Step, AnnotateError>,
    ) -> BatchReport {
        let mut report = BatchReport {
            total: documents.len(),
            ..BatchReport::default()
        };

        for document in documents {
            if self.cancel.is_cancelled() {
                info!(processed = report.processed, total = report.total, "batch cancelled");
                report.cancelled = true;
                break;
            }

            let result = step(document);
            report.processed += 1;
            let error = match &result {
                Ok(Step::Modified) => {
                    report.modified += 1;
                    None
                }
                Ok(Step::Skipped) => {
                    report.skipped += 1;
                    None
                }
                Err(e) => {
                    warn!(path = %document.path, error = %e, "document failed");
                    report.failed += 1;
                    Some(e)
                }
            };

            progress(&BatchProgress {
                processed: report.processed,
                total: report.total,
                current: document.basename(),
                modified: report.modified,
                skipped: report.skipped,
                failed: report.failed,
                error,
            });
        }

        report
    }
}

/// Documents whose parent folder is exactly `folder` (`""` is the vault root).
pub fn in_folder<'a>(
    documents: &'a [Document],
    folder: &'a str,
) -> impl Iterator<Item = &'a Document> {
    let folder = folder.trim_matches('/');
    documents.iter().filter(move |d| d.parent() == folder)
}
