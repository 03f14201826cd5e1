//! Resolution cache using moka
//!
//! Enforces resolve-at-most-once per distinct request under one published
//! profile. The key carries the profile generation, so a re-published
//! profile misses naturally and old entries age out.

use crate::builder::BuildOutcome;
use amp_types::{EncodingHints, MediaRequest, PlaceholderStrategy, RequestKey, ResolvedMedia};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identity of one resolution
///
/// The request identity plus every other request field that changes a
/// locator, and the profile generation it was resolved under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    request: RequestKey,
    hints: EncodingHints,
    placeholder: PlaceholderStrategy,
    width: Option<u32>,
    generation: u64,
}

impl ResolutionKey {
    /// Key for `request` under profile `generation`
    #[must_use]
    pub fn new(request: &MediaRequest, generation: u64) -> Self {
        Self {
            request: request.key(),
            hints: request.hints,
            placeholder: request.placeholder.clone(),
            width: request.width,
            generation,
        }
    }

    /// Profile generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A completed resolution pass
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Output handed to the consumer (metrics not yet measured)
    pub resolved: ResolvedMedia,
    /// Policy decisions behind `resolved.primary_url`
    pub primary: BuildOutcome,
    /// Profile generation used
    pub generation: u64,
}

/// Memoized resolutions
#[derive(Debug, Clone)]
pub struct ResolutionCache {
    inner: Cache<ResolutionKey, Arc<Resolution>>,
    builds: Arc<AtomicU64>,
}

impl ResolutionCache {
    /// Create cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
            builds: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached resolution for `key`, running `resolve` on a miss
    ///
    /// Concurrent misses on the same key run `resolve` once.
    pub async fn get_or_resolve<F>(&self, key: ResolutionKey, resolve: F) -> Arc<Resolution>
    where
        F: FnOnce() -> Resolution,
    {
        let builds = Arc::clone(&self.builds);
        self.inner
            .get_with(key, async move {
                builds.fetch_add(1, Ordering::SeqCst);
                Arc::new(resolve())
            })
            .await
    }

    /// Drop the entry for `key`
    #[inline]
    pub async fn invalidate(&self, key: &ResolutionKey) {
        self.inner.invalidate(key).await;
    }

    /// Check if `key` is cached
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &ResolutionKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of resolution passes actually run
    #[inline]
    #[must_use]
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::SeqCst)
    }
}

impl Default for ResolutionCache {
    /// Create cache with default capacity (1,024 entries)
    fn default() -> Self {
        Self::new(1_024)
    }
}
