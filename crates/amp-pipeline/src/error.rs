//! Error types for the media pipeline
//!
//! Only [`PipelineError::LoadFailure`] is expected in normal operation; it is
//! reported to the one consumer whose load failed, alongside a retry
//! affordance, and never affects sibling requests.

use crate::lazy::ActivationState;

/// Errors surfaced to a consumer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// The resolved locator failed to load
    #[error("failed to load {url}: {source}")]
    LoadFailure {
        /// Locator that failed
        url: String,
        /// Underlying cause
        #[source]
        source: LoadError,
    },

    /// Consumer unmounted before the operation completed
    #[error("consumer is gone")]
    ConsumerGone,

    /// A newer resolution replaced the one this load belonged to
    #[error("load of {url} superseded by a newer resolution")]
    Superseded {
        /// Locator of the discarded load
        url: String,
    },

    /// Operation needs a resolved request
    #[error("request has not been resolved yet")]
    NotResolved,

    /// Lazy activation state machine rejected a transition
    #[error("illegal activation transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: ActivationState,
        /// Requested state
        to: ActivationState,
    },
}

impl PipelineError {
    /// Create load failure
    pub fn load_failure(url: impl Into<String>, source: LoadError) -> Self {
        Self::LoadFailure {
            url: url.into(),
            source,
        }
    }

    /// Check if the consumer should offer a retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LoadFailure { .. })
    }
}

/// Why a locator failed to load
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// Backend answered with a non-success status
    #[error("http status {0}")]
    Status(u16),

    /// Transport-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Response could not be decoded as an image
    #[error("decode error: {0}")]
    Decode(String),

    /// Load task ended without producing a result
    #[error("load aborted: {0}")]
    Aborted(String),
}
