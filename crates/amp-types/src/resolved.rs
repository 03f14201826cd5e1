//! Pipeline output types

use crate::format::ImageFormat;
use crate::network::BandwidthClass;
use serde::{Deserialize, Serialize};

/// One `(url, width)` pair of a responsive set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SrcSetEntry {
    /// Variant locator
    pub url: String,
    /// Width descriptor in pixels
    pub width: u32,
}

/// Result of resolving one [`MediaRequest`](crate::MediaRequest)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    /// Locator for the default rendering
    pub primary_url: String,
    /// Responsive variants, strictly increasing by width
    pub src_set: Vec<SrcSetEntry>,
    /// Pass-through of the request's `sizes` hint
    pub sizes_attribute: String,
    /// Preview locator; empty when the strategy is `none`
    pub placeholder_url: String,
    /// Outcome of loading `primary_url`; `None` until measured
    pub metrics: Option<MediaMetrics>,
}

impl ResolvedMedia {
    /// Render `src_set` as an HTML `srcset` attribute value
    #[must_use]
    pub fn srcset_attribute(&self) -> String {
        self.src_set
            .iter()
            .map(|entry| format!("{} {}w", entry.url, entry.width))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Check if a placeholder is available
    #[inline]
    #[must_use]
    pub fn has_placeholder(&self) -> bool {
        !self.placeholder_url.is_empty()
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    /// Create dimensions
    #[inline]
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count
    #[inline]
    #[must_use]
    pub fn pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Measured and estimated outcome of a resolved load
///
/// Byte counts are **estimates** computed from decoded dimensions and the
/// quality used for the request. Transferred and original sizes are not
/// observable from the client, so these fields must never be reported as
/// measured network bytes. Only `load_time_ms` is measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetrics {
    /// Estimated size of the untransformed original
    pub estimated_original_bytes: u64,
    /// Estimated size of the delivered variant
    pub estimated_optimized_bytes: u64,
    /// `(1 - optimized / original) * 100`, from the estimates above
    pub compression_ratio_percent: f64,
    /// Elapsed time from resolution start to load completion
    pub load_time_ms: u64,
    /// Format requested from the backend; `None` for passthrough sources
    pub resolved_format: Option<ImageFormat>,
    /// Decoded dimensions
    pub dimensions: Dimensions,
    /// Bandwidth bucket at measurement time
    pub bandwidth_class: BandwidthClass,
    /// Device pixel ratio at measurement time
    pub device_pixel_ratio: f64,
}
