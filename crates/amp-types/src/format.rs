//! Image encoding formats and format preferences
//!
//! [`ImageFormat`] names an encoding the transformation backend can emit.
//! [`FormatPreference`] is what a consumer asks for: a concrete format, or
//! `auto` to defer to negotiation against the client's capabilities.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Encoding format of an image variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// AV1 image format (next-gen)
    Avif,
    /// WebP (next-gen)
    Webp,
    /// Baseline JPEG (legacy, universally decodable)
    Jpeg,
    /// PNG (legacy, lossless)
    Png,
}

impl ImageFormat {
    /// The most broadly compatible format; used whenever negotiation degrades.
    pub const LEGACY_FALLBACK: Self = Self::Jpeg;

    /// All formats, newest first
    pub const ALL: [Self; 4] = [Self::Avif, Self::Webp, Self::Jpeg, Self::Png];

    /// Canonical lowercase name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// Name used in the backend's `f_<name>` directive
    #[inline]
    #[must_use]
    pub fn directive_name(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            other => other.as_str(),
        }
    }

    /// MIME type as advertised in `Accept` headers
    #[inline]
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Whether this is a next-generation format that older clients cannot decode
    #[inline]
    #[must_use]
    pub fn is_next_gen(&self) -> bool {
        matches!(self, Self::Avif | Self::Webp)
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avif" => Ok(Self::Avif),
            "webp" => Ok(Self::Webp),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(TypeError::UnknownFormat(other.to_string())),
        }
    }
}

/// Requested output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FormatPreference {
    /// Defer to capability negotiation
    #[default]
    Auto,
    /// Use this format unless save-data forces the legacy fallback
    Explicit(ImageFormat),
}

impl FormatPreference {
    /// Explicit format, if any
    #[inline]
    #[must_use]
    pub fn explicit(&self) -> Option<ImageFormat> {
        match self {
            Self::Auto => None,
            Self::Explicit(format) => Some(*format),
        }
    }
}

impl From<ImageFormat> for FormatPreference {
    fn from(format: ImageFormat) -> Self {
        Self::Explicit(format)
    }
}

impl Display for FormatPreference {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Explicit(format) => Display::fmt(format, f),
        }
    }
}

impl FromStr for FormatPreference {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Ok(Self::Auto)
        } else {
            s.parse().map(Self::Explicit)
        }
    }
}

impl TryFrom<String> for FormatPreference {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormatPreference> for String {
    fn from(value: FormatPreference) -> Self {
        value.to_string()
    }
}
