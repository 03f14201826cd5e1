//! Consumer-facing media requests
//!
//! A [`MediaRequest`] is created when a consumer mounts and is immutable
//! afterwards; changes go through [`MediaRequestPatch`], which produces a new
//! request and triggers a fresh resolution pass.

use crate::error::TypeError;
use crate::format::FormatPreference;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Compression quality in `1..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quality(u8);

impl Quality {
    /// Default nominal quality
    pub const DEFAULT: Self = Self(80);
    /// Lowest accepted quality
    pub const MIN: Self = Self(1);
    /// Highest accepted quality
    pub const MAX: Self = Self(100);

    /// Create a quality value
    ///
    /// # Errors
    /// Returns [`TypeError::InvalidQuality`] outside `1..=100`.
    pub fn new(value: u32) -> Result<Self, TypeError> {
        match u8::try_from(value) {
            Ok(v @ 1..=100) => Ok(Self(v)),
            _ => Err(TypeError::InvalidQuality(value)),
        }
    }

    /// Create a quality value, clamping into `1..=100`
    #[inline]
    #[must_use]
    pub fn clamped(value: u32) -> Self {
        // Clamped into 1..=100, so the narrowing cast cannot truncate.
        #[allow(clippy::cast_possible_truncation)]
        Self(value.clamp(1, 100) as u8)
    }

    /// Numeric value
    #[inline]
    #[must_use]
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Quality {
    type Error = TypeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(value: Quality) -> Self {
        u32::from(value.0)
    }
}

/// How to produce the low-fidelity preview
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderStrategy {
    /// Tiny, low-quality variant of the same source
    #[default]
    Blur,
    /// No placeholder
    None,
    /// Caller-supplied renderable locator (e.g. a `data:` URI)
    Inline(String),
}

/// Encoding hints forwarded to the backend as independent flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingHints {
    /// Request progressive (interlaced) encoding
    pub progressive: bool,
    /// Prefer lossless compression
    pub lossless_preferred: bool,
    /// Strip EXIF/ICC metadata
    pub strip_metadata: bool,
}

impl EncodingHints {
    /// No hints
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Check if any flag is set
    #[inline]
    #[must_use]
    pub fn any(&self) -> bool {
        self.progressive || self.lossless_preferred || self.strip_metadata
    }
}

/// Description of what a consumer wants rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRequest {
    /// Opaque reference to the original image
    pub source: String,
    /// Nominal quality before any network markdown
    #[serde(default)]
    pub quality: Quality,
    /// Requested format (`auto` negotiates)
    #[serde(default)]
    pub format: FormatPreference,
    /// `sizes` hint passed through to the rendering surface
    #[serde(default = "default_layout_sizes")]
    pub layout_sizes: String,
    /// Placeholder strategy
    #[serde(default)]
    pub placeholder: PlaceholderStrategy,
    /// Exempt from lazy deferral and preload eagerly
    #[serde(default)]
    pub priority: bool,
    /// Wait for visibility before resolving
    #[serde(default = "default_lazy")]
    pub lazy: bool,
    /// Encoding hints
    #[serde(default)]
    pub hints: EncodingHints,
    /// Intrinsic width, if known
    #[serde(default)]
    pub width: Option<u32>,
    /// Intrinsic height, if known
    #[serde(default)]
    pub height: Option<u32>,
}

fn default_layout_sizes() -> String {
    "100vw".to_string()
}

fn default_lazy() -> bool {
    true
}

impl MediaRequest {
    /// Create a request for `source` with default settings
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            quality: Quality::DEFAULT,
            format: FormatPreference::Auto,
            layout_sizes: default_layout_sizes(),
            placeholder: PlaceholderStrategy::default(),
            priority: false,
            lazy: true,
            hints: EncodingHints::none(),
            width: None,
            height: None,
        }
    }

    /// With nominal quality
    #[inline]
    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// With format preference
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: impl Into<FormatPreference>) -> Self {
        self.format = format.into();
        self
    }

    /// With `sizes` hint
    #[inline]
    #[must_use]
    pub fn with_layout_sizes(mut self, sizes: impl Into<String>) -> Self {
        self.layout_sizes = sizes.into();
        self
    }

    /// With placeholder strategy
    #[inline]
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: PlaceholderStrategy) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Mark as high priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: bool) -> Self {
        self.priority = priority;
        self
    }

    /// Enable or disable lazy activation
    #[inline]
    #[must_use]
    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// With encoding hints
    #[inline]
    #[must_use]
    pub fn with_hints(mut self, hints: EncodingHints) -> Self {
        self.hints = hints;
        self
    }

    /// With intrinsic dimensions; a zero dimension is treated as unknown
    #[inline]
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = (width > 0).then_some(width);
        self.height = (height > 0).then_some(height);
        self
    }

    /// Whether resolution waits for a visibility trigger
    ///
    /// Priority always wins over `lazy`.
    #[inline]
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.lazy && !self.priority
    }

    /// Identity of this request for resolve-once bookkeeping
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey {
            source: self.source.clone(),
            quality: self.quality,
            format: self.format,
            layout_sizes: self.layout_sizes.clone(),
        }
    }

    /// Apply a partial update, producing a new request
    #[must_use]
    pub fn merged(&self, patch: &MediaRequestPatch) -> Self {
        let mut next = self.clone();
        if let Some(source) = &patch.source {
            next.source.clone_from(source);
        }
        if let Some(quality) = patch.quality {
            next.quality = quality;
        }
        if let Some(format) = patch.format {
            next.format = format;
        }
        if let Some(sizes) = &patch.layout_sizes {
            next.layout_sizes.clone_from(sizes);
        }
        if let Some(placeholder) = &patch.placeholder {
            next.placeholder = placeholder.clone();
        }
        if let Some(priority) = patch.priority {
            next.priority = priority;
        }
        if let Some(lazy) = patch.lazy {
            next.lazy = lazy;
        }
        if let Some(hints) = patch.hints {
            next.hints = hints;
        }
        if let Some(width) = patch.width {
            next.width = (width > 0).then_some(width);
        }
        if let Some(height) = patch.height {
            next.height = (height > 0).then_some(height);
        }
        next
    }
}

/// Fields that identify a distinct resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// Source reference
    pub source: String,
    /// Nominal quality
    pub quality: Quality,
    /// Format preference
    pub format: FormatPreference,
    /// `sizes` hint
    pub layout_sizes: String,
}

/// Partial update to a [`MediaRequest`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaRequestPatch {
    /// New source
    pub source: Option<String>,
    /// New nominal quality
    pub quality: Option<Quality>,
    /// New format preference
    pub format: Option<FormatPreference>,
    /// New `sizes` hint
    pub layout_sizes: Option<String>,
    /// New placeholder strategy
    pub placeholder: Option<PlaceholderStrategy>,
    /// New priority flag
    pub priority: Option<bool>,
    /// New lazy flag
    pub lazy: Option<bool>,
    /// New encoding hints
    pub hints: Option<EncodingHints>,
    /// New intrinsic width
    pub width: Option<u32>,
    /// New intrinsic height
    pub height: Option<u32>,
}

impl MediaRequestPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Change quality
    #[inline]
    #[must_use]
    pub fn quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Change format
    #[inline]
    #[must_use]
    pub fn format(mut self, format: impl Into<FormatPreference>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Change source
    #[inline]
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Change `sizes` hint
    #[inline]
    #[must_use]
    pub fn layout_sizes(mut self, sizes: impl Into<String>) -> Self {
        self.layout_sizes = Some(sizes.into());
        self
    }

    /// Check if the patch changes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;
    use pretty_assertions::assert_eq;

    #[test]
    fn quality_bounds() {
        assert!(Quality::new(0).is_err());
        assert!(Quality::new(101).is_err());
        assert_eq!(Quality::new(1).unwrap().value(), 1);
        assert_eq!(Quality::new(100).unwrap().value(), 100);
        assert_eq!(Quality::clamped(250).value(), 100);
        assert_eq!(Quality::clamped(0).value(), 1);
    }

    #[test]
    fn request_defaults() {
        let request = MediaRequest::new("cat.jpg");
        assert_eq!(request.quality, Quality::DEFAULT);
        assert_eq!(request.format, FormatPreference::Auto);
        assert!(request.lazy);
        assert!(!request.priority);
        assert!(request.is_deferred());
    }

    #[test]
    fn priority_overrides_lazy() {
        let request = MediaRequest::new("hero.jpg").with_priority(true).with_lazy(true);
        assert!(!request.is_deferred());
    }

    #[test]
    fn patch_merges_only_present_fields() {
        let request = MediaRequest::new("a.jpg")
            .with_quality(Quality::new(70).unwrap())
            .with_layout_sizes("50vw");
        let patch = MediaRequestPatch::new().format(ImageFormat::Png);

        let merged = request.merged(&patch);
        assert_eq!(merged.format, FormatPreference::Explicit(ImageFormat::Png));
        assert_eq!(merged.quality.value(), 70);
        assert_eq!(merged.layout_sizes, "50vw");
        assert_eq!(merged.source, "a.jpg");
    }

    #[test]
    fn key_ignores_non_identity_fields() {
        let a = MediaRequest::new("a.jpg");
        let b = MediaRequest::new("a.jpg").with_priority(true).with_lazy(false);
        assert_eq!(a.key(), b.key());

        let c = a.merged(&MediaRequestPatch::new().layout_sizes("33vw"));
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: MediaRequest =
            serde_json::from_str(r#"{"source": "x.jpg", "quality": 65}"#).unwrap();
        assert_eq!(request.quality.value(), 65);
        assert_eq!(request.layout_sizes, "100vw");
        assert!(request.lazy);
        assert_eq!(request.placeholder, PlaceholderStrategy::Blur);

        let bad = serde_json::from_str::<MediaRequest>(r#"{"source": "x.jpg", "quality": 0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn zero_dimensions_are_unknown() {
        let request = MediaRequest::new("a.jpg").with_dimensions(0, 0);
        assert_eq!(request.width, None);
        assert_eq!(request.height, None);

        let sized = MediaRequest::new("a.jpg").with_dimensions(640, 0);
        assert_eq!(sized.width, Some(640));
        assert_eq!(sized.height, None);

        let patch = MediaRequestPatch {
            width: Some(0),
            ..MediaRequestPatch::default()
        };
        assert_eq!(sized.merged(&patch).width, None);
    }
}
