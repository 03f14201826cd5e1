//! Client capability profile
//!
//! Derived once per session by the capability detector and re-published only
//! when the network tier changes. Everything downstream treats it as read-only.

use crate::format::ImageFormat;
use crate::network::ConnectionTier;
use serde::{Deserialize, Serialize};

/// Viewport size in device-independent pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels
    pub width: u32,
    /// Height in CSS pixels
    pub height: u32,
}

impl Viewport {
    /// Create viewport
    #[inline]
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

/// What the current client can decode and how constrained its network is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    /// Decodable formats, most preferred first
    pub supported_formats: Vec<ImageFormat>,
    /// Current connection tier
    pub connection_tier: ConnectionTier,
    /// Reduced data usage requested
    pub save_data: bool,
    /// Device pixel ratio (always positive)
    pub device_pixel_ratio: f64,
    /// Viewport size
    pub viewport: Viewport,
    /// Downlink estimate in Mbps, if reported
    pub downlink_mbps: Option<f64>,
}

impl CapabilityProfile {
    /// Most conservative profile: legacy format only, unthrottled `4g`
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            supported_formats: vec![ImageFormat::LEGACY_FALLBACK],
            connection_tier: ConnectionTier::G4,
            save_data: false,
            device_pixel_ratio: 1.0,
            viewport: Viewport::default(),
            downlink_mbps: None,
        }
    }

    /// With supported formats (most preferred first)
    #[inline]
    #[must_use]
    pub fn with_formats(mut self, formats: Vec<ImageFormat>) -> Self {
        self.supported_formats = formats;
        self
    }

    /// With connection tier
    #[inline]
    #[must_use]
    pub fn with_tier(mut self, tier: ConnectionTier) -> Self {
        self.connection_tier = tier;
        self
    }

    /// With save-data mode
    #[inline]
    #[must_use]
    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }

    /// With device pixel ratio; non-positive or non-finite values fall back to 1.0
    #[inline]
    #[must_use]
    pub fn with_device_pixel_ratio(mut self, dpr: f64) -> Self {
        self.device_pixel_ratio = sanitize_dpr(dpr);
        self
    }

    /// With viewport
    #[inline]
    #[must_use]
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// With downlink estimate
    #[inline]
    #[must_use]
    pub fn with_downlink(mut self, mbps: Option<f64>) -> Self {
        self.downlink_mbps = mbps.filter(|m| m.is_finite() && *m >= 0.0);
        self
    }

    /// Check if the client decodes `format`
    #[inline]
    #[must_use]
    pub fn supports(&self, format: ImageFormat) -> bool {
        self.supported_formats.contains(&format)
    }

    /// Physical pixel width needed to fill the viewport
    #[must_use]
    pub fn physical_viewport_width(&self) -> u32 {
        let physical = f64::from(self.viewport.width) * self.device_pixel_ratio;
        // Bounded by u32 viewport times a sane DPR; saturate rather than wrap.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = physical.ceil().min(f64::from(u32::MAX)) as u32;
        width
    }
}

impl Default for CapabilityProfile {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Clamp a device pixel ratio to a positive finite value
#[inline]
#[must_use]
pub fn sanitize_dpr(dpr: f64) -> f64 {
    if dpr.is_finite() && dpr > 0.0 {
        dpr
    } else {
        1.0
    }
}
