//! AMP Types - data model for the adaptive media pipeline
//!
//! Everything the pipeline passes between its stages:
//! - [`MediaRequest`]: what a consumer wants rendered
//! - [`CapabilityProfile`]: what the client can decode and how fast it is
//! - [`BreakpointSpec`]: the static responsive width table
//! - [`ResolvedMedia`] / [`MediaMetrics`]: what comes out
//! - [`PipelineConfig`]: TOML-loadable tunables
//!
//! # Example
//!
//! ```rust
//! use amp_types::{ImageFormat, MediaRequest, Quality};
//!
//! let request = MediaRequest::new("https://res.cloudinary.com/demo/image/upload/cat.jpg")
//!     .with_quality(Quality::new(75).unwrap())
//!     .with_format(ImageFormat::Webp)
//!     .with_layout_sizes("(max-width: 768px) 100vw, 50vw");
//!
//! assert!(request.is_deferred());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod breakpoint;
pub mod config;
pub mod error;
pub mod format;
pub mod network;
pub mod profile;
pub mod request;
pub mod resolved;

// Re-exports for convenience
pub use breakpoint::{Breakpoint, BreakpointSpec, DEFAULT_WIDTHS};
pub use config::{BackendConfig, PipelineConfig};
pub use error::TypeError;
pub use format::{FormatPreference, ImageFormat};
pub use network::{BandwidthClass, ConnectionTier};
pub use profile::{sanitize_dpr, CapabilityProfile, Viewport};
pub use request::{
    EncodingHints, MediaRequest, MediaRequestPatch, PlaceholderStrategy, Quality, RequestKey,
};
pub use resolved::{Dimensions, MediaMetrics, ResolvedMedia, SrcSetEntry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
