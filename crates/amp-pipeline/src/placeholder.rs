//! Placeholder generation
//!
//! A blur placeholder is the same source at a tiny width and very low
//! quality, built independently of the main request's quality and format.

use crate::builder::{BuildOutcome, Transform, TransformBuilder};
use amp_types::{
    CapabilityProfile, EncodingHints, FormatPreference, PipelineConfig, PlaceholderStrategy,
    Quality,
};

/// Produces preview locators
#[derive(Debug, Clone)]
pub struct PlaceholderGenerator {
    builder: TransformBuilder,
    width: u32,
    quality: Quality,
}

impl PlaceholderGenerator {
    /// Create generator with a fixed preview width and quality
    #[inline]
    #[must_use]
    pub fn new(builder: TransformBuilder, width: u32, quality: Quality) -> Self {
        Self {
            builder,
            width: width.max(1),
            quality,
        }
    }

    /// Create generator from pipeline configuration
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            TransformBuilder::from_config(config),
            config.placeholder_width,
            config.placeholder_quality,
        )
    }

    /// Preview locator for `source`, or an empty string
    ///
    /// - `None` yields `""`
    /// - `Inline` is returned unchanged
    /// - `Blur` builds a tiny variant; foreign sources have no cheap variant
    ///   and yield `""`
    #[must_use]
    pub fn generate(
        &self,
        source: &str,
        strategy: &PlaceholderStrategy,
        profile: &CapabilityProfile,
    ) -> String {
        self.generate_within(source, strategy, profile, self.width, self.quality)
    }

    /// Like [`generate`](Self::generate), but kept strictly below `primary`
    ///
    /// The configured width and quality are reduced when the primary variant
    /// is itself smaller than the preview would be. A blur preview of a
    /// primary at width 1 or quality 1 cannot be cheaper and yields `""`.
    #[must_use]
    pub fn generate_below(
        &self,
        source: &str,
        strategy: &PlaceholderStrategy,
        profile: &CapabilityProfile,
        primary: &BuildOutcome,
    ) -> String {
        let width = match primary.width() {
            Some(w) if w <= 1 => return String::new(),
            Some(w) => self.width.min(w - 1),
            None => self.width,
        };
        let quality = match primary.quality() {
            Some(q) if q.value() <= 1 => return String::new(),
            Some(q) => self
                .quality
                .min(Quality::clamped(u32::from(q.value()) - 1)),
            None => self.quality,
        };
        self.generate_within(source, strategy, profile, width, quality)
    }

    fn generate_within(
        &self,
        source: &str,
        strategy: &PlaceholderStrategy,
        profile: &CapabilityProfile,
        width: u32,
        quality: Quality,
    ) -> String {
        match strategy {
            PlaceholderStrategy::None => String::new(),
            PlaceholderStrategy::Inline(preview) => preview.clone(),
            PlaceholderStrategy::Blur => {
                let transform = Transform {
                    width: Some(width),
                    quality,
                    format: FormatPreference::Auto,
                    hints: EncodingHints::none(),
                };
                match self.builder.build_outcome(source, profile, &transform) {
                    BuildOutcome::Transformed { url, .. } => url,
                    BuildOutcome::Passthrough { .. } => String::new(),
                }
            }
        }
    }
}
