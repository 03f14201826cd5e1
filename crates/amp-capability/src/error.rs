//! Capability detection errors
//!
//! None of these reach a consumer. The detector logs them and degrades to the
//! conservative choice for the affected capability.

use amp_types::ImageFormat;
use std::time::Duration;

/// Failures while establishing client capabilities
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// Decode probe reported an error
    #[error("decode probe for {format} failed: {reason}")]
    ProbeFailed { format: ImageFormat, reason: String },

    /// Decode probe did not settle within the bounded wait
    #[error("decode probe for {format} did not settle within {}ms", .waited.as_millis())]
    ProbeTimeout { format: ImageFormat, waited: Duration },
}

impl CapabilityError {
    /// Create probe failure
    pub fn probe_failed(format: ImageFormat, reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            format,
            reason: reason.into(),
        }
    }

    /// Format the failed probe was for
    #[inline]
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        match self {
            Self::ProbeFailed { format, .. } | Self::ProbeTimeout { format, .. } => *format,
        }
    }
}
