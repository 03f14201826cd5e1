//! Transformation URL builder
//!
//! Turns a source reference plus a [`CapabilityProfile`] into one concrete
//! backend locator by inserting a comma-separated directive segment after the
//! backend's delivery segment:
//!
//! ```text
//! https://res.cloudinary.com/demo/image/upload/sample.jpg
//! https://res.cloudinary.com/demo/image/upload/w_1080,q_70,f_avif,fl_progressive/sample.jpg
//! ```
//!
//! Sources outside the backend namespace pass through untouched. Building is
//! pure: identical inputs always yield the identical locator.

use amp_types::{
    BackendConfig, CapabilityProfile, EncodingHints, FormatPreference, ImageFormat,
    MediaRequest, PipelineConfig, Quality,
};
use url::Url;

/// Quality points removed when the client asks to save data
pub const SAVE_DATA_MARKDOWN: u8 = 30;

/// Variant parameters before capability policy is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transform {
    /// Target width; `None` leaves the width directive out
    pub width: Option<u32>,
    /// Nominal quality, only ever lowered by policy
    pub quality: Quality,
    /// Requested format
    pub format: FormatPreference,
    /// Independent encoding flags
    pub hints: EncodingHints,
}

impl Transform {
    /// Transform carrying a request's quality, format and hints
    #[must_use]
    pub fn for_request(request: &MediaRequest, width: Option<u32>) -> Self {
        Self {
            width,
            quality: request.quality,
            format: request.format,
            hints: request.hints,
        }
    }
}

/// What the builder did with a source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BuildOutcome {
    /// Source rewritten to a backend variant
    Transformed {
        /// Variant locator
        url: String,
        /// Width directive, if any
        width: Option<u32>,
        /// Quality after markdown
        quality: Quality,
        /// Negotiated format
        format: ImageFormat,
    },
    /// Source outside the backend namespace, returned unchanged
    Passthrough {
        /// The original source
        url: String,
    },
}

impl BuildOutcome {
    /// The locator
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Transformed { url, .. } | Self::Passthrough { url } => url,
        }
    }

    /// Consume into the locator
    #[inline]
    #[must_use]
    pub fn into_url(self) -> String {
        match self {
            Self::Transformed { url, .. } | Self::Passthrough { url } => url,
        }
    }

    /// Negotiated format (`None` for passthrough)
    #[inline]
    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        match self {
            Self::Transformed { format, .. } => Some(*format),
            Self::Passthrough { .. } => None,
        }
    }

    /// Quality used (`None` for passthrough)
    #[inline]
    #[must_use]
    pub fn quality(&self) -> Option<Quality> {
        match self {
            Self::Transformed { quality, .. } => Some(*quality),
            Self::Passthrough { .. } => None,
        }
    }

    /// Width directive (`None` for passthrough or unsized variants)
    #[inline]
    #[must_use]
    pub fn width(&self) -> Option<u32> {
        match self {
            Self::Transformed { width, .. } => *width,
            Self::Passthrough { .. } => None,
        }
    }

    /// Check if the source was left untouched
    #[inline]
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough { .. })
    }
}

/// Apply network markdown to a nominal quality
///
/// Markdowns are cumulative: save-data removes [`SAVE_DATA_MARKDOWN`] points
/// and the connection tier removes its own. The result is floored at
/// `min(floor, nominal)`, so it never exceeds `nominal`.
#[must_use]
pub fn adjust_quality(nominal: Quality, profile: &CapabilityProfile, floor: Quality) -> Quality {
    let mut markdown = u32::from(profile.connection_tier.quality_markdown());
    if profile.save_data {
        markdown += u32::from(SAVE_DATA_MARKDOWN);
    }

    let floor = u32::from(floor.min(nominal).value());
    let adjusted = u32::from(nominal.value()).saturating_sub(markdown).max(floor);
    Quality::clamped(adjusted)
}

/// Builds backend locators
#[derive(Debug, Clone)]
pub struct TransformBuilder {
    backend: BackendConfig,
    quality_floor: Quality,
}

impl TransformBuilder {
    /// Create builder
    #[inline]
    #[must_use]
    pub fn new(backend: BackendConfig, quality_floor: Quality) -> Self {
        Self {
            backend,
            quality_floor,
        }
    }

    /// Create builder from pipeline configuration
    #[inline]
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.backend.clone(), config.quality_floor)
    }

    /// Backend configuration
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Check if `source` belongs to the backend namespace
    #[must_use]
    pub fn is_transformable(&self, source: &str) -> bool {
        self.directive_insertion_point(source).is_some()
    }

    /// Build the locator for `source`
    #[must_use]
    pub fn build(&self, source: &str, profile: &CapabilityProfile, transform: &Transform) -> String {
        self.build_outcome(source, profile, transform).into_url()
    }

    /// Build the locator and report the policy decisions taken
    #[must_use]
    pub fn build_outcome(
        &self,
        source: &str,
        profile: &CapabilityProfile,
        transform: &Transform,
    ) -> BuildOutcome {
        let Some(insert_at) = self.directive_insertion_point(source) else {
            tracing::trace!(source, "foreign resource; passing through");
            return BuildOutcome::Passthrough {
                url: source.to_string(),
            };
        };

        let format = self.negotiate_format(profile, transform.format);
        let quality = adjust_quality(transform.quality, profile, self.quality_floor);
        let directives = directives(transform.width, quality, format, transform.hints);

        let (head, tail) = source.split_at(insert_at);
        let url = format!("{head}{directives}/{tail}");

        BuildOutcome::Transformed {
            url,
            width: transform.width,
            quality,
            format,
        }
    }

    /// Pick the output format
    ///
    /// In order: save-data forces the legacy fallback; an explicit preference
    /// is honoured; otherwise the first supported format the backend can
    /// produce, else the legacy fallback.
    #[must_use]
    pub fn negotiate_format(
        &self,
        profile: &CapabilityProfile,
        preference: FormatPreference,
    ) -> ImageFormat {
        if profile.save_data {
            return ImageFormat::LEGACY_FALLBACK;
        }
        if let Some(explicit) = preference.explicit() {
            return explicit;
        }
        profile
            .supported_formats
            .iter()
            .copied()
            .find(|format| self.backend.can_produce(*format))
            .unwrap_or(ImageFormat::LEGACY_FALLBACK)
    }

    /// Byte offset just past the delivery segment, if `source` is transformable
    fn directive_insertion_point(&self, source: &str) -> Option<usize> {
        let parsed = Url::parse(source).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if !parsed
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(&self.backend.host))
        {
            return None;
        }

        let segment = self.backend.delivery_segment.as_str();
        // Search after the authority so a segment-like query string cannot match.
        let path_start = source.find("://").map_or(0, |i| i + 3);
        let path_offset = source[path_start..].find('/')? + path_start;
        let found = source[path_offset..].find(segment)? + path_offset;
        let insert_at = found + segment.len();

        // Nothing after the segment means there is no asset to transform.
        if source[insert_at..].is_empty() {
            return None;
        }
        Some(insert_at)
    }
}

/// Render the directive segment: width, quality, format, then flags
fn directives(
    width: Option<u32>,
    quality: Quality,
    format: ImageFormat,
    hints: EncodingHints,
) -> String {
    let mut parts = Vec::with_capacity(6);
    if let Some(width) = width {
        parts.push(format!("w_{width}"));
    }
    parts.push(format!("q_{}", quality.value()));
    parts.push(format!("f_{}", format.directive_name()));
    if hints.progressive {
        parts.push("fl_progressive".to_string());
    }
    if hints.lossless_preferred {
        parts.push("fl_lossless".to_string());
    }
    if hints.strip_metadata {
        parts.push("fl_strip_profile".to_string());
    }
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_types::ConnectionTier;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SAMPLE: &str = "https://res.cloudinary.com/demo/image/upload/v1712/hero/sample.jpg";

    fn builder() -> TransformBuilder {
        TransformBuilder::from_config(&PipelineConfig::default())
    }

    fn modern() -> CapabilityProfile {
        CapabilityProfile::conservative().with_formats(vec![
            ImageFormat::Avif,
            ImageFormat::Webp,
            ImageFormat::Jpeg,
        ])
    }

    fn transform(quality: u32) -> Transform {
        Transform {
            width: Some(1080),
            quality: Quality::new(quality).unwrap(),
            format: FormatPreference::Auto,
            hints: EncodingHints::none(),
        }
    }

    fn q(value: u32) -> Quality {
        Quality::new(value).unwrap()
    }

    #[test]
    fn inserts_directives_after_delivery_segment() {
        let url = builder().build(SAMPLE, &modern(), &transform(80));
        assert_eq!(
            url,
            "https://res.cloudinary.com/demo/image/upload/w_1080,q_80,f_avif/v1712/hero/sample.jpg"
        );
    }

    #[test]
    fn flags_are_appended_independently() {
        let mut t = transform(80);
        t.hints = EncodingHints {
            progressive: true,
            lossless_preferred: true,
            strip_metadata: true,
        };
        let outcome = builder().build_outcome(SAMPLE, &modern(), &t);
        assert!(outcome
            .url()
            .contains("/w_1080,q_80,f_avif,fl_progressive,fl_lossless,fl_strip_profile/"));
        // Flags do not touch the format or quality policy.
        assert_eq!(outcome.format(), Some(ImageFormat::Avif));
        assert_eq!(outcome.quality(), Some(q(80)));
    }

    #[test]
    fn width_directive_is_optional() {
        let mut t = transform(75);
        t.width = None;
        let url = builder().build(SAMPLE, &CapabilityProfile::conservative(), &t);
        assert!(url.contains("/upload/q_75,f_jpg/v1712"));
    }

    #[test]
    fn foreign_sources_pass_through() {
        let b = builder();
        for source in [
            "https://example.org/photo.jpg",
            "/static/logo.png",
            "data:image/png;base64,iVBORw0KGgo=",
            "https://res.cloudinary.com/demo/video/upload/clip.mp4",
            "https://example.org/?next=https://res.cloudinary.com/demo/image/upload/x.jpg",
            "https://res.cloudinary.com/demo/image/upload/",
            "ftp://res.cloudinary.com/demo/image/upload/x.jpg",
        ] {
            let outcome = b.build_outcome(source, &modern(), &transform(80));
            assert!(outcome.is_passthrough(), "{source}");
            assert_eq!(outcome.url(), source);
        }
    }

    #[test]
    fn save_data_forces_legacy_format() {
        let profile = modern().with_save_data(true);
        let b = builder();
        assert_eq!(b.negotiate_format(&profile, FormatPreference::Auto), ImageFormat::Jpeg);
        assert_eq!(
            b.negotiate_format(&profile, FormatPreference::Explicit(ImageFormat::Webp)),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn explicit_format_is_honoured() {
        let b = builder();
        let format = b.negotiate_format(
            &CapabilityProfile::conservative(),
            FormatPreference::Explicit(ImageFormat::Png),
        );
        assert_eq!(format, ImageFormat::Png);
    }

    #[test]
    fn auto_skips_formats_the_backend_cannot_produce() {
        let backend = BackendConfig {
            producible_formats: vec![ImageFormat::Webp, ImageFormat::Jpeg],
            ..BackendConfig::default()
        };
        let b = TransformBuilder::new(backend, q(40));
        assert_eq!(b.negotiate_format(&modern(), FormatPreference::Auto), ImageFormat::Webp);

        let avif_only = CapabilityProfile::conservative().with_formats(vec![ImageFormat::Avif]);
        assert_eq!(b.negotiate_format(&avif_only, FormatPreference::Auto), ImageFormat::Jpeg);
    }

    #[test]
    fn markdown_table() {
        let floor = q(40);
        let base = CapabilityProfile::conservative();
        assert_eq!(adjust_quality(q(80), &base, floor), q(80));
        assert_eq!(adjust_quality(q(80), &base.clone().with_tier(ConnectionTier::G3), floor), q(70));
        assert_eq!(adjust_quality(q(80), &base.clone().with_tier(ConnectionTier::G2), floor), q(60));
        assert_eq!(
            adjust_quality(q(80), &base.clone().with_tier(ConnectionTier::Slow2g), floor),
            q(60)
        );
        assert_eq!(adjust_quality(q(80), &base.clone().with_save_data(true), floor), q(50));
    }

    #[test]
    fn slow_network_with_save_data_hits_floor() {
        let profile = modern().with_save_data(true).with_tier(ConnectionTier::G2);
        let outcome = builder().build_outcome(SAMPLE, &profile, &transform(90));
        assert_eq!(outcome.quality(), Some(q(40)));
        assert_eq!(outcome.format(), Some(ImageFormat::LEGACY_FALLBACK));
    }

    #[test]
    fn floor_never_raises_low_nominal_quality() {
        let profile = CapabilityProfile::conservative().with_tier(ConnectionTier::G2);
        assert_eq!(adjust_quality(q(25), &profile, q(40)), q(25));
    }

    fn tier_strategy() -> impl Strategy<Value = ConnectionTier> {
        prop_oneof![
            Just(ConnectionTier::Offline),
            Just(ConnectionTier::Slow2g),
            Just(ConnectionTier::G2),
            Just(ConnectionTier::G3),
            Just(ConnectionTier::G4),
            Just(ConnectionTier::Unknown),
        ]
    }

    proptest! {
        #[test]
        fn prop_build_is_deterministic(
            quality in 1u32..=100,
            width in proptest::option::of(1u32..5000),
            tier in tier_strategy(),
            save_data in any::<bool>(),
        ) {
            let profile = modern().with_tier(tier).with_save_data(save_data);
            let t = Transform { width, ..transform(quality) };
            let b = builder();
            prop_assert_eq!(b.build(SAMPLE, &profile, &t), b.build(SAMPLE, &profile, &t));
        }

        #[test]
        fn prop_quality_never_exceeds_nominal(
            quality in 1u32..=100,
            tier in tier_strategy(),
            save_data in any::<bool>(),
        ) {
            let profile = modern().with_tier(tier).with_save_data(save_data);
            let adjusted = adjust_quality(q(quality), &profile, q(40));
            prop_assert!(adjusted <= q(quality));
        }

        #[test]
        fn prop_degradation_is_monotonic(quality in 1u32..=100, save_data in any::<bool>()) {
            let ordered = [
                ConnectionTier::G4,
                ConnectionTier::G3,
                ConnectionTier::G2,
                ConnectionTier::Slow2g,
            ];
            let qualities: Vec<Quality> = ordered
                .iter()
                .map(|tier| {
                    let profile = modern().with_tier(*tier).with_save_data(save_data);
                    adjust_quality(q(quality), &profile, q(40))
                })
                .collect();
            prop_assert!(qualities.windows(2).all(|w| w[1] <= w[0]));
        }

        #[test]
        fn prop_foreign_sources_are_untouched(
            path in "[a-z0-9/]{1,24}\\.(jpg|png|webp)",
            quality in 1u32..=100,
            save_data in any::<bool>(),
        ) {
            let source = format!("https://example.org/{path}");
            let profile = modern().with_save_data(save_data);
            prop_assert_eq!(builder().build(&source, &profile, &transform(quality)), source);
        }
    }
}
