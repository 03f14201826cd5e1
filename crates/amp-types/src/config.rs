//! Pipeline configuration
//!
//! Loadable from TOML; every field has a default so a config file only needs
//! to name what it changes:
//!
//! ```toml
//! quality_floor = 45
//! probe_timeout_ms = 150
//!
//! [backend]
//! host = "images.example.com"
//!
//! [[breakpoints]]
//! width = 480
//!
//! [[breakpoints]]
//! width = 1200
//! quality_override = 70
//! ```

use crate::breakpoint::BreakpointSpec;
use crate::error::TypeError;
use crate::format::ImageFormat;
use crate::request::Quality;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Addressing scheme of the remote transformation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Host that serves transformable resources
    pub host: String,
    /// Path segment after which transformation directives are inserted
    pub delivery_segment: String,
    /// Formats the backend can emit
    pub producible_formats: Vec<ImageFormat>,
}

impl BackendConfig {
    /// Backend at `host` with the default delivery segment
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Check if the backend can emit `format`
    #[inline]
    #[must_use]
    pub fn can_produce(&self, format: ImageFormat) -> bool {
        self.producible_formats.contains(&format)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "res.cloudinary.com".to_string(),
            delivery_segment: "/image/upload/".to_string(),
            producible_formats: ImageFormat::ALL.to_vec(),
        }
    }
}

/// Tunables for the whole pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Transformation backend
    pub backend: BackendConfig,
    /// Responsive breakpoint table
    pub breakpoints: BreakpointSpec,
    /// Lowest quality network markdown may reach
    pub quality_floor: Quality,
    /// Bounded wait for one format probe
    pub probe_timeout_ms: u64,
    /// Candidate formats to probe, newest first
    pub probe_formats: Vec<ImageFormat>,
    /// Placeholder width in pixels
    pub placeholder_width: u32,
    /// Placeholder quality
    pub placeholder_quality: Quality,
    /// Downlink above which a client counts as fast
    pub fast_bandwidth_mbps: f64,
    /// Intersection ratio at which a lazy consumer activates
    pub visibility_threshold: f64,
    /// Maximum memoized resolutions
    pub cache_capacity: u64,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns `TypeError::InvalidConfig` on syntax errors, unknown values,
    /// or settings that would break placeholder cheapness.
    pub fn from_toml_str(source: &str) -> Result<Self, TypeError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// IO errors plus everything [`PipelineConfig::from_toml_str`] rejects.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TypeError> {
        let path = path.as_ref();
        let source =
            std::fs::read_to_string(path).map_err(|e| TypeError::io_error(path, e))?;
        Self::from_toml_str(&source)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    /// Returns `TypeError::InvalidConfig` describing the first violation.
    pub fn validate(&self) -> Result<(), TypeError> {
        let narrowest = self.breakpoints.entries()[0].width;
        if self.placeholder_width == 0 || self.placeholder_width >= narrowest {
            return Err(TypeError::InvalidConfig(format!(
                "placeholder_width {} must be in 1..{narrowest}",
                self.placeholder_width
            )));
        }
        if self.placeholder_quality >= self.quality_floor {
            return Err(TypeError::InvalidConfig(format!(
                "placeholder_quality {} must be below quality_floor {}",
                self.placeholder_quality, self.quality_floor
            )));
        }
        if self.backend.host.is_empty() || self.backend.delivery_segment.is_empty() {
            return Err(TypeError::InvalidConfig(
                "backend host and delivery_segment must be non-empty".to_string(),
            ));
        }
        if !self.backend.can_produce(ImageFormat::LEGACY_FALLBACK) {
            return Err(TypeError::InvalidConfig(format!(
                "backend must produce the legacy fallback format ({})",
                ImageFormat::LEGACY_FALLBACK
            )));
        }
        if !(self.fast_bandwidth_mbps.is_finite() && self.fast_bandwidth_mbps > 0.0) {
            return Err(TypeError::InvalidConfig(
                "fast_bandwidth_mbps must be positive".to_string(),
            ));
        }
        if !(self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0) {
            return Err(TypeError::InvalidConfig(
                "visibility_threshold must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Probe timeout as a [`Duration`]
    #[inline]
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// With backend
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// With breakpoint table
    #[inline]
    #[must_use]
    pub fn with_breakpoints(mut self, breakpoints: BreakpointSpec) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    /// With probe timeout
    #[inline]
    #[must_use]
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            breakpoints: BreakpointSpec::default(),
            quality_floor: Quality::clamped(40),
            probe_timeout_ms: 250,
            probe_formats: vec![ImageFormat::Avif, ImageFormat::Webp],
            placeholder_width: 20,
            placeholder_quality: Quality::clamped(10),
            fast_bandwidth_mbps: 1.5,
            visibility_threshold: 0.01,
            cache_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_validates() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_toml_is_default() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn toml_overrides() {
        let config = PipelineConfig::from_toml_str(
            r#"
            quality_floor = 45
            probe_timeout_ms = 100

            [backend]
            host = "images.example.com"

            [[breakpoints]]
            width = 480

            [[breakpoints]]
            width = 1200
            quality_override = 70
            format_override = "webp"
            "#,
        )
        .unwrap();

        assert_eq!(config.quality_floor.value(), 45);
        assert_eq!(config.backend.host, "images.example.com");
        assert_eq!(config.backend.delivery_segment, "/image/upload/");
        assert_eq!(config.breakpoints.len(), 2);
        let wide = config.breakpoints.entries()[1];
        assert_eq!(wide.quality_override.map(|q| q.value()), Some(70));
        assert_eq!(wide.format_override, Some(ImageFormat::Webp));
        assert_eq!(config.probe_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_unordered_breakpoints() {
        let result = PipelineConfig::from_toml_str(
            r"
            [[breakpoints]]
            width = 1200

            [[breakpoints]]
            width = 480
            ",
        );
        assert!(matches!(result, Err(TypeError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_expensive_placeholder() {
        let result = PipelineConfig::from_toml_str("placeholder_width = 640");
        assert!(matches!(result, Err(TypeError::InvalidConfig(_))));

        let result = PipelineConfig::from_toml_str("placeholder_quality = 40");
        assert!(matches!(result, Err(TypeError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(PipelineConfig::from_toml_str("visibility_threshold = 0.0").is_err());
        assert!(PipelineConfig::from_toml_str("visibility_threshold = 1.5").is_err());
        assert!(PipelineConfig::from_toml_str("visibility_threshold = 0.5").is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = PipelineConfig::from_path("/definitely/not/here.toml");
        assert!(matches!(result, Err(TypeError::Io { .. })));
    }
}
