//! Annotating and stripping many documents in one run.
//!
//! Documents are processed strictly one after another, with exclusion and
//! staleness filtering, progress reporting and cooperative cancellation.

mod cancel;
mod controller;
mod exclusion;

pub use cancel::CancellationFlag;
pub use controller::{BatchController, BatchProgress, in_folder};
pub use exclusion::{ExclusionMatcher, is_stale};
