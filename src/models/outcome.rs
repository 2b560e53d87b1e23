use std::fmt;

/// Why a document was left untouched.
///
/// Skips are not failures: they are the normal result of the idempotence,
/// staleness, exclusion and race checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The document already carries an annotation timestamp.
    AlreadyTagged,
    /// The document has no non-whitespace content.
    EmptyDocument,
    /// The document changed while the model request was outstanding.
    ContentChanged,
    /// The model returned no valid tags.
    NoTags,
    /// Rewriting the metadata block would not change the document.
    NoChange,
    /// Cancellation was requested while the model request was outstanding.
    Cancelled,
    /// The document matches an exclusion pattern.
    Excluded,
    /// The document has not been modified since it was last annotated.
    NotModified,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyTagged => write!(f, "already tagged"),
            Self::EmptyDocument => write!(f, "empty document"),
            Self::ContentChanged => write!(f, "content changed during tagging"),
            Self::NoTags => write!(f, "no valid tags returned"),
            Self::NoChange => write!(f, "no changes to write"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Excluded => write!(f, "excluded by pattern"),
            Self::NotModified => write!(f, "not modified since last tagging"),
        }
    }
}

/// Terminal state of annotating one document.
///
/// Failures are reported through `Err(AnnotateError)` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationOutcome {
    /// The metadata block was written.
    Annotated { tags: Vec<String>, summary: String },
    /// Nothing was written.
    Skipped(SkipReason),
}

impl AnnotationOutcome {
    /// Returns `true` if the document was rewritten.
    pub fn is_annotated(&self) -> bool {
        matches!(self, Self::Annotated { .. })
    }
}

/// Terminal state of stripping one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripOutcome {
    /// The annotator's keys were removed.
    Stripped,
    /// The document carried no annotator keys, or could not be stripped safely.
    NoOp,
}

/// Running totals of a batch run.
///
/// `processed == modified + skipped + failed` holds at every progress report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub total: usize,
    pub processed: usize,
    pub modified: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} modified, {} skipped, {} failed ({} of {} processed)",
            self.modified, self.skipped, self.failed, self.processed, self.total
        )?;
        if self.cancelled {
            write!(f, ", cancelled")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_display_is_human_readable() {
        assert_eq!(SkipReason::AlreadyTagged.to_string(), "already tagged");
        assert_eq!(
            SkipReason::ContentChanged.to_string(),
            "content changed during tagging"
        );
    }

    #[test]
    fn batch_report_display_mentions_cancellation() {
        let report = BatchReport {
            total: 10,
            processed: 3,
            modified: 1,
            skipped: 2,
            failed: 0,
            cancelled: true,
        };
        assert_eq!(
            report.to_string(),
            "1 modified, 2 skipped, 0 failed (3 of 10 processed), cancelled"
        );
    }
}
