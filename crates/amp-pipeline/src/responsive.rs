//! Responsive set generation
//!
//! Fans one source out across the breakpoint table. Output order is the
//! table's order (strictly increasing width) and is never re-sorted.

use crate::builder::{Transform, TransformBuilder};
use amp_types::{BreakpointSpec, CapabilityProfile, FormatPreference, MediaRequest, SrcSetEntry};

/// Produces `srcset` entries from a [`BreakpointSpec`]
#[derive(Debug, Clone)]
pub struct ResponsiveSetGenerator {
    builder: TransformBuilder,
    breakpoints: BreakpointSpec,
}

impl ResponsiveSetGenerator {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new(builder: TransformBuilder, breakpoints: BreakpointSpec) -> Self {
        Self {
            builder,
            breakpoints,
        }
    }

    /// Breakpoint table
    #[inline]
    #[must_use]
    pub fn breakpoints(&self) -> &BreakpointSpec {
        &self.breakpoints
    }

    /// One entry per breakpoint, or none for foreign sources
    ///
    /// A breakpoint's quality override replaces the request's nominal
    /// quality but is capped at it; a format override replaces the request's
    /// preference and still goes through negotiation.
    #[must_use]
    pub fn generate_set(
        &self,
        request: &MediaRequest,
        profile: &CapabilityProfile,
    ) -> Vec<SrcSetEntry> {
        if !self.builder.is_transformable(&request.source) {
            return Vec::new();
        }

        self.breakpoints
            .entries()
            .iter()
            .map(|breakpoint| {
                let quality = breakpoint
                    .quality_override
                    .map_or(request.quality, |q| q.min(request.quality));
                let format = breakpoint
                    .format_override
                    .map_or(request.format, FormatPreference::Explicit);
                let transform = Transform {
                    width: Some(breakpoint.width),
                    quality,
                    format,
                    hints: request.hints,
                };
                SrcSetEntry {
                    url: self.builder.build(&request.source, profile, &transform),
                    width: breakpoint.width,
                }
            })
            .collect()
    }

    /// Width for the default rendering
    ///
    /// The request's intrinsic width when given, otherwise the breakpoint
    /// covering the physical viewport.
    #[must_use]
    pub fn primary_width(&self, request: &MediaRequest, profile: &CapabilityProfile) -> u32 {
        request.width.filter(|w| *w > 0).unwrap_or_else(|| {
            self.breakpoints
                .covering(profile.physical_viewport_width())
                .width
        })
    }
}
