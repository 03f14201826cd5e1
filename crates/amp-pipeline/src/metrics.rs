//! Metrics collection
//!
//! Measures how long a resolved locator took to load and estimates what the
//! transformation saved. Only the load time is measured. Byte counts are
//! estimates from decoded pixel dimensions:
//!
//! - original: uncompressed 24-bit pixels
//! - optimized: pixels × base bits-per-pixel of the format × quality / 100
//!
//! Passthrough sources are estimated as JPEG at the request's quality.

use crate::error::LoadError;
use amp_types::{
    BandwidthClass, CapabilityProfile, Dimensions, ImageFormat, MediaMetrics, Quality,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

/// Fetches a locator and reports its decoded dimensions
#[async_trait]
pub trait MediaLoader: Send + Sync {
    /// Load `url` to completion
    ///
    /// # Errors
    /// Returns a [`LoadError`] describing why the resource did not load.
    async fn load(&self, url: &str) -> Result<Dimensions, LoadError>;
}

/// Inputs needed to turn a load into [`MediaMetrics`]
#[derive(Debug, Clone)]
pub struct MeasureContext {
    /// Format requested from the backend; `None` for passthrough
    pub format: Option<ImageFormat>,
    /// Quality used in the locator
    pub quality: Quality,
    /// Profile at measurement time
    pub profile: CapabilityProfile,
}

/// Base cost at quality 100, in thousandths of a bit per pixel
fn base_millibits_per_pixel(format: ImageFormat) -> u128 {
    match format {
        ImageFormat::Avif => 1_200,
        ImageFormat::Webp => 1_800,
        ImageFormat::Jpeg => 2_400,
        ImageFormat::Png => 8_000,
    }
}

/// Estimate `(original, optimized)` byte sizes
#[must_use]
pub fn estimate_sizes(
    dimensions: Dimensions,
    format: Option<ImageFormat>,
    quality: Quality,
) -> (u64, u64) {
    let pixels = dimensions.pixels();
    let original = pixels.saturating_mul(3);

    let millibits = u128::from(pixels)
        * base_millibits_per_pixel(format.unwrap_or(ImageFormat::LEGACY_FALLBACK))
        * u128::from(quality.value());
    // millibits / (1000 * 8 * 100), rounded up
    let optimized = u64::try_from(millibits.div_ceil(800_000)).unwrap_or(u64::MAX);
    (original, optimized.min(original))
}

/// `(1 - optimized / original) * 100`, or `0.0` for an empty image
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compression_ratio(original: u64, optimized: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (1.0 - optimized as f64 / original as f64) * 100.0
}

/// Turns loads into metrics
#[derive(Clone)]
pub struct MetricsCollector {
    loader: Arc<dyn MediaLoader>,
    fast_threshold_mbps: f64,
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("fast_threshold_mbps", &self.fast_threshold_mbps)
            .finish_non_exhaustive()
    }
}

impl MetricsCollector {
    /// Create collector
    #[inline]
    #[must_use]
    pub fn new(loader: Arc<dyn MediaLoader>, fast_threshold_mbps: f64) -> Self {
        Self {
            loader,
            fast_threshold_mbps,
        }
    }

    /// Load `url` and describe the outcome
    ///
    /// `started` is when resolution began; the load time covers everything
    /// from there to load completion.
    ///
    /// # Errors
    /// Propagates the loader's [`LoadError`].
    pub async fn measure(
        &self,
        url: &str,
        started: Instant,
        context: &MeasureContext,
    ) -> Result<MediaMetrics, LoadError> {
        let dimensions = self.loader.load(url).await?;
        let load_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (original, optimized) = estimate_sizes(dimensions, context.format, context.quality);
        let metrics = MediaMetrics {
            estimated_original_bytes: original,
            estimated_optimized_bytes: optimized,
            compression_ratio_percent: compression_ratio(original, optimized),
            load_time_ms,
            resolved_format: context.format,
            dimensions,
            bandwidth_class: BandwidthClass::classify(
                context.profile.downlink_mbps,
                context.profile.connection_tier,
                self.fast_threshold_mbps,
            ),
            device_pixel_ratio: context.profile.device_pixel_ratio,
        };

        tracing::debug!(
            url,
            load_time_ms,
            estimated_optimized_bytes = optimized,
            "measured load"
        );
        Ok(metrics)
    }
}

/// Shared record of completed measurements, keyed by consumer
///
/// Only live consumers write here; a load that completes after its consumer
/// unmounted is dropped before reaching the ledger, and unmounting forgets
/// whatever the consumer had recorded.
#[derive(Debug, Clone, Default)]
pub struct MetricsLedger {
    entries: Arc<DashMap<Uuid, Vec<MediaMetrics>>>,
}

impl MetricsLedger {
    /// Create empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement for `consumer`
    pub fn record(&self, consumer: Uuid, metrics: MediaMetrics) {
        self.entries.entry(consumer).or_default().push(metrics);
    }

    /// Drop every measurement for `consumer`, returning how many there were
    pub fn forget(&self, consumer: Uuid) -> usize {
        self.entries
            .remove(&consumer)
            .map_or(0, |(_, measurements)| measurements.len())
    }

    /// Measurements recorded for `consumer`
    #[must_use]
    pub fn for_consumer(&self, consumer: Uuid) -> Vec<MediaMetrics> {
        self.entries
            .get(&consumer)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Total number of measurements
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }

    /// Check if nothing has been recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mean estimated compression ratio over all measurements
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_compression_ratio(&self) -> Option<f64> {
        let (sum, count) = self.entries.iter().fold((0.0, 0usize), |acc, entry| {
            entry.value().iter().fold(acc, |(sum, count), m| {
                (sum + m.compression_ratio_percent, count + 1)
            })
        });
        (count > 0).then(|| sum / count as f64)
    }
}
