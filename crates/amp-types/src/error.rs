//! Error types for the media data model
//!
//! Covers construction-time validation only:
//! - Quality values outside `1..=100`
//! - Unknown format or connection tier names
//! - Breakpoint tables that are empty, contain a zero width, or are not
//!   strictly increasing
//! - Configuration that fails to parse or validate

use std::path::PathBuf;

/// Validation errors for media types
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// Quality outside the accepted range
    #[error("quality {0} out of range (expected 1..=100)")]
    InvalidQuality(u32),

    /// Format name not recognised
    #[error("unknown image format: '{0}'")]
    UnknownFormat(String),

    /// Connection tier name not recognised
    #[error("unknown connection tier: '{0}'")]
    UnknownTier(String),

    /// Breakpoint table has no entries
    #[error("breakpoint table is empty")]
    EmptyBreakpoints,

    /// Breakpoint with a width of zero
    #[error("breakpoint width must be positive")]
    ZeroBreakpointWidth,

    /// Breakpoint widths are not strictly increasing
    #[error("breakpoint widths must be strictly increasing: {previous} followed by {next}")]
    NonIncreasingBreakpoints { previous: u32, next: u32 },

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error while reading configuration
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TypeError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<toml::de::Error> for TypeError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TypeError::InvalidQuality(140);
        assert!(err.to_string().contains("140"));

        let err = TypeError::NonIncreasingBreakpoints {
            previous: 1080,
            next: 828,
        };
        assert!(err.to_string().contains("1080 followed by 828"));
    }

    #[test]
    fn toml_error_converts() {
        let parse: Result<toml::Value, _> = toml::from_str("not = [valid");
        let err: TypeError = parse.unwrap_err().into();
        assert!(matches!(err, TypeError::InvalidConfig(_)));
    }
}
