//! AMP Capability - run-time client capability detection
//!
//! Establishes which formats a client decodes and how constrained its
//! network is, behind an injected [`CapabilityProvider`] so policy code can be
//! tested without a real client.
//!
//! # Architecture
//!
//! ```text
//! CapabilityProvider ──► CapabilityDetector ──► CapabilityService ──► ProfileSubscription (many)
//!   (probes, hints)       (bounded probes)      (memoized, watch)       (read-only)
//!                                                     ▲
//!                                   notify_network_change (single writer)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use amp_capability::{CapabilityDetector, CapabilityService, ClientHintsProvider};
//! use std::sync::Arc;
//!
//! let provider = ClientHintsProvider::from_headers([("accept", "image/avif,image/webp")]);
//! let detector = CapabilityDetector::from_config(Arc::new(provider), &config);
//! let service = CapabilityService::new(detector);
//!
//! let subscription = service.subscribe().await;
//! let profile = subscription.profile();
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod detector;
pub mod error;
pub mod provider;
pub mod service;

// Re-exports for convenience
pub use detector::CapabilityDetector;
pub use error::CapabilityError;
pub use provider::{CapabilityProvider, ClientHintsProvider, NetworkSnapshot};
pub use service::{CapabilityService, ProfileSnapshot, ProfileSubscription};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
