//! Observable state of a single cache key.

use std::sync::Arc;

/// Lifecycle of a cache key.
///
/// `Empty -> Loading -> Settled | Error`. An explicit revalidation moves a
/// `Settled` or `Error` key back to `Loading`; a local write always lands in
/// `Settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    Empty,
    Loading,
    Settled,
    Error,
}

/// Point-in-time view of a cache key, as published to subscribers.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// Last value written, kept through later loads and failures.
    pub data: Option<T>,
    pub status: CacheStatus,
    /// Message of the most recent failed fetch, cleared by the next success.
    pub error: Option<Arc<str>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            status: CacheStatus::Empty,
            error: None,
        }
    }
}

impl<T> Snapshot<T> {
    /// Returns true while a fetch for this key is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == CacheStatus::Loading
    }

    /// Returns true once the latest fetch or local write has completed.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self.status, CacheStatus::Settled | CacheStatus::Error)
    }
}
