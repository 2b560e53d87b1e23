//! Auto-annotation task queue.
//!
//! File creations and modifications become [`AutoTagTask`]s on a single-consumer
//! queue. A task becomes ready once its path has been quiet for the debounce
//! interval; repeated events for the same path push its ready time back instead
//! of queueing a second task. At most one task per path is in flight at a time.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::models::Document;

/// Quiet period before a changed document is annotated.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// A pending request to annotate one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoTagTask {
    pub path: String,
    pub ready_at: Instant,
}

#[derive(Debug)]
pub struct TaskQueue {
    debounce: Duration,
    pending: Vec<AutoTagTask>,
    in_flight: HashSet<String>,
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl TaskQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: Vec::new(),
            in_flight: HashSet::new(),
        }
    }

    /// Records a change to `path` observed at `now`.
    pub fn enqueue(&mut self, path: &str, now: Instant) {
        let ready_at = now + self.debounce;
        match self.pending.iter_mut().find(|task| task.path == path) {
            Some(task) => task.ready_at = ready_at,
            None => self.pending.push(AutoTagTask {
                path: path.to_string(),
                ready_at,
            }),
        }
    }

    /// Takes the oldest task that is ready at `now` and not already in flight.
    ///
    /// The path stays in flight until [`TaskQueue::complete`] is called.
    pub fn next_ready(&mut self, now: Instant) -> Option<AutoTagTask> {
        let index = self
            .pending
            .iter()
            .position(|task| task.ready_at <= now && !self.in_flight.contains(&task.path))?;
        let task = self.pending.remove(index);
        self.in_flight.insert(task.path.clone());
        Some(task)
    }

    /// Marks the task for `path` as finished.
    pub fn complete(&mut self, path: &str) {
        self.in_flight.remove(path);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

/// Turns successive vault listings into change events.
///
/// The first listing only establishes the baseline; later listings report
/// documents that are new or whose modification time moved.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    seen: Option<HashMap<String, i64>>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the paths created or modified since the previous call.
    pub fn changes(&mut self, documents: &[Document]) -> Vec<String> {
        let current: HashMap<String, i64> = documents
            .iter()
            .map(|d| (d.path.clone(), d.modified_ms))
            .collect();

        let changed = match &self.seen {
            None => Vec::new(),
            Some(seen) => documents
                .iter()
                .filter(|d| seen.get(&d.path) != Some(&d.modified_ms))
                .map(|d| d.path.clone())
                .collect(),
        };

        self.seen = Some(current);
        changed
    }
}
