//! AMP Pipeline - adaptive media resolution
//!
//! Decides which variant of a source image to request from a URL-addressed
//! transformation backend, for which widths, at what quality and in what
//! format, from the client's capability profile.
//!
//! # Architecture
//!
//! ```text
//! MediaRequest ──▶ MediaPipeline::resolve ──▶ MediaHandle
//!                     │
//!                     ├─ CapabilityService (shared profile, amp-capability)
//!                     ├─ TransformBuilder ──▶ primary locator
//!                     ├─ ResponsiveSetGenerator ──▶ srcset
//!                     ├─ PlaceholderGenerator ──▶ preview
//!                     ├─ LazyActivation / PreloadController (when to resolve)
//!                     └─ MetricsCollector ──▶ MetricsLedger
//! ```
//!
//! # Example
//!
//! ```rust
//! use amp_pipeline::prelude::*;
//!
//! let builder = TransformBuilder::from_config(&PipelineConfig::default());
//! let profile = CapabilityProfile::conservative().with_formats(vec![ImageFormat::Webp, ImageFormat::Jpeg]);
//! let transform = Transform::for_request(
//!     &MediaRequest::new("https://res.cloudinary.com/demo/image/upload/cat.jpg"),
//!     Some(640),
//! );
//!
//! assert_eq!(
//!     builder.build("https://res.cloudinary.com/demo/image/upload/cat.jpg", &profile, &transform),
//!     "https://res.cloudinary.com/demo/image/upload/w_640,q_80,f_webp/cat.jpg",
//! );
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builder;
pub mod cache;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod lazy;
pub mod metrics;
pub mod pipeline;
pub mod placeholder;
pub mod preload;
pub mod responsive;

// Re-exports for convenience
pub use builder::{adjust_quality, BuildOutcome, Transform, TransformBuilder, SAVE_DATA_MARKDOWN};
pub use cache::{Resolution, ResolutionCache, ResolutionKey};
pub use error::{LoadError, PipelineError};
#[cfg(feature = "http")]
pub use http::HttpLoader;
pub use lazy::{ActivationState, LazyActivation, VisibilityNotifier, VisibilityWatch};
pub use metrics::{
    compression_ratio, estimate_sizes, MeasureContext, MediaLoader, MetricsCollector,
    MetricsLedger,
};
pub use pipeline::{LoadTask, MediaHandle, MediaPipeline};
pub use placeholder::PlaceholderGenerator;
pub use preload::{PreloadController, PreloadGuard, PreloadHint, PreloadRegistry};
pub use responsive::ResponsiveSetGenerator;

/// Prelude for common imports
pub mod prelude {
    pub use crate::builder::{BuildOutcome, Transform, TransformBuilder};
    pub use crate::error::{LoadError, PipelineError};
    pub use crate::lazy::{ActivationState, VisibilityNotifier, VisibilityWatch};
    pub use crate::metrics::{MediaLoader, MetricsLedger};
    pub use crate::pipeline::{MediaHandle, MediaPipeline};
    pub use crate::preload::PreloadRegistry;
    pub use amp_capability::{CapabilityProvider, CapabilityService, ClientHintsProvider};
    pub use amp_types::{
        CapabilityProfile, ConnectionTier, FormatPreference, ImageFormat, MediaRequest,
        MediaRequestPatch, PipelineConfig, PlaceholderStrategy, Quality, ResolvedMedia,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
