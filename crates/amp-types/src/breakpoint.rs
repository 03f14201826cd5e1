//! Static breakpoint policy
//!
//! [`BreakpointSpec`] is the ordered width table the responsive set generator
//! fans a source out across. Widths are validated strictly increasing at
//! construction, so every consumer can rely on the ordering without re-sorting.

use crate::error::TypeError;
use crate::format::ImageFormat;
use crate::request::Quality;
use serde::{Deserialize, Serialize};

/// Device widths generated when no table is configured
pub const DEFAULT_WIDTHS: [u32; 8] = [640, 750, 828, 1080, 1200, 1920, 2048, 3840];

/// One target rendering width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Rendering width in physical pixels
    pub width: u32,
    /// Replaces the request's nominal quality for this width
    #[serde(default)]
    pub quality_override: Option<Quality>,
    /// Replaces the request's format preference for this width
    #[serde(default)]
    pub format_override: Option<ImageFormat>,
}

impl Breakpoint {
    /// Breakpoint with no overrides
    #[inline]
    #[must_use]
    pub fn new(width: u32) -> Self {
        Self {
            width,
            quality_override: None,
            format_override: None,
        }
    }

    /// With quality override
    #[inline]
    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality_override = Some(quality);
        self
    }

    /// With format override
    #[inline]
    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format_override = Some(format);
        self
    }
}

/// Ordered, strictly increasing breakpoint table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Breakpoint>", into = "Vec<Breakpoint>")]
pub struct BreakpointSpec(Vec<Breakpoint>);

impl BreakpointSpec {
    /// Validate and wrap a breakpoint list
    ///
    /// # Errors
    /// - `TypeError::EmptyBreakpoints` for an empty list
    /// - `TypeError::ZeroBreakpointWidth` if any width is zero
    /// - `TypeError::NonIncreasingBreakpoints` if any width is not greater
    ///   than its predecessor
    pub fn new(entries: Vec<Breakpoint>) -> Result<Self, TypeError> {
        if entries.is_empty() {
            return Err(TypeError::EmptyBreakpoints);
        }
        if entries.iter().any(|b| b.width == 0) {
            return Err(TypeError::ZeroBreakpointWidth);
        }
        if let Some(pair) = entries.windows(2).find(|w| w[1].width <= w[0].width) {
            return Err(TypeError::NonIncreasingBreakpoints {
                previous: pair[0].width,
                next: pair[1].width,
            });
        }
        Ok(Self(entries))
    }

    /// Build from plain widths
    ///
    /// # Errors
    /// Same as [`BreakpointSpec::new`].
    pub fn from_widths(widths: &[u32]) -> Result<Self, TypeError> {
        Self::new(widths.iter().copied().map(Breakpoint::new).collect())
    }

    /// Entries in ascending width order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Breakpoint] {
        &self.0
    }

    /// Number of entries (never zero)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterator over widths
    #[inline]
    pub fn widths(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().map(|b| b.width)
    }

    /// Smallest breakpoint at least `width` wide, else the widest
    #[must_use]
    pub fn covering(&self, width: u32) -> &Breakpoint {
        self.0
            .iter()
            .find(|b| b.width >= width)
            .unwrap_or_else(|| self.widest())
    }

    /// Widest breakpoint
    #[inline]
    #[must_use]
    pub fn widest(&self) -> &Breakpoint {
        // Construction rejects empty tables.
        &self.0[self.0.len() - 1]
    }
}

impl Default for BreakpointSpec {
    fn default() -> Self {
        Self(DEFAULT_WIDTHS.iter().copied().map(Breakpoint::new).collect())
    }
}

impl TryFrom<Vec<Breakpoint>> for BreakpointSpec {
    type Error = TypeError;

    fn try_from(value: Vec<Breakpoint>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BreakpointSpec> for Vec<Breakpoint> {
    fn from(value: BreakpointSpec) -> Self {
        value.0
    }
}
