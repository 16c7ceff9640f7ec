//! Per-day poem cache with single-flight population.
//!
//! The first caller for a date runs the fetch; callers that arrive while it
//! is in flight wait on the same cell and get the same result. Failures are
//! stored too, so a broken upstream is asked at most once per day. Entries
//! live for the process lifetime; one accumulates per calendar day.

use crate::error::PipelineError;
use crate::models::PoemRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

/// A cached fetch outcome: the poem, or the sticky failure for that date.
pub type CacheEntry = Result<Arc<PoemRecord>, PipelineError>;

#[derive(Debug, Default)]
pub struct DailyCache {
    slots: Mutex<HashMap<NaiveDate, Arc<OnceCell<CacheEntry>>>>,
}

impl DailyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `date`, running `fetch_fn` only if no caller has
    /// populated it yet.
    ///
    /// `fetch_fn` runs at most once per date for the life of the cache, even
    /// with concurrent callers. A stored failure is returned as-is; use
    /// [`DailyCache::invalidate`] to force a new attempt.
    pub async fn get_or_fetch<F, Fut>(&self, date: NaiveDate, fetch_fn: F) -> CacheEntry
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PoemRecord, PipelineError>>,
    {
        let cell = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(date).or_default())
        };

        if let Some(entry) = cell.get() {
            debug!(%date, ok = entry.is_ok(), "Cache hit");
            return entry.clone();
        }

        cell.get_or_init(|| async {
            info!(%date, "Cache miss; fetching poem");
            fetch_fn().await.map(Arc::new)
        })
        .await
        .clone()
    }

    /// Drop the entry for `date` so the next request fetches again.
    ///
    /// Returns `true` if an entry was present.
    pub async fn invalidate(&self, date: NaiveDate) -> bool {
        let removed = self.slots.lock().await.remove(&date).is_some();
        if removed {
            info!(%date, "Cache entry invalidated");
        }
        removed
    }

    /// Number of dates with an entry or an in-flight fetch.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
