//! Lazy activation
//!
//! An event-driven gate that defers resolution until the consumer's render
//! target is about to become visible. Any platform that can report an
//! intersection ratio drives it through a [`VisibilityNotifier`].
//!
//! ```text
//!   Idle ──arm──▶ Armed ──ratio ≥ threshold──▶ Triggered
//!    │              │
//!    └──release──▶ Released ◀──release (unmount)
//! ```
//!
//! `Triggered` is reached at most once; the watch is dropped on the same
//! step, so the notifier observes the release immediately.

use crate::error::PipelineError;
use tokio::sync::mpsc;

/// Activation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivationState {
    /// No watch registered
    Idle,
    /// Watch registered, waiting for visibility
    Armed,
    /// Fired; the watch has been released
    Triggered,
    /// Consumer went away before firing
    Released,
}

impl ActivationState {
    /// Check if no further transitions are possible
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        allowed_transitions(*self).is_empty()
    }
}

/// Validate a state transition
///
/// # Errors
/// Returns [`PipelineError::IllegalTransition`] for anything not listed by
/// [`allowed_transitions`].
pub fn validate_transition(from: ActivationState, to: ActivationState) -> Result<(), PipelineError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(PipelineError::IllegalTransition { from, to })
    }
}

/// Successor states of `from`
#[must_use]
pub fn allowed_transitions(from: ActivationState) -> &'static [ActivationState] {
    use ActivationState::{Armed, Idle, Released, Triggered};
    match from {
        Idle => &[Armed, Released],
        Armed => &[Triggered, Released],
        Triggered | Released => &[],
    }
}

/// Producer half: the platform reports intersection ratios here
#[derive(Debug, Clone)]
pub struct VisibilityNotifier {
    sender: mpsc::UnboundedSender<f64>,
}

impl VisibilityNotifier {
    /// Report the target's current intersection ratio
    ///
    /// Returns `false` once the watch has been released.
    pub fn notify(&self, ratio: f64) -> bool {
        self.sender.send(ratio).is_ok()
    }

    /// Check if the consumer side dropped its watch
    #[inline]
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Consumer half: a registered watch on one render target
#[derive(Debug)]
pub struct VisibilityWatch {
    receiver: mpsc::UnboundedReceiver<f64>,
}

impl VisibilityWatch {
    /// Create a connected notifier/watch pair
    #[must_use]
    pub fn channel() -> (VisibilityNotifier, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (VisibilityNotifier { sender }, Self { receiver })
    }
}

/// Per-consumer activation controller
#[derive(Debug)]
pub struct LazyActivation {
    state: ActivationState,
    threshold: f64,
    watch: Option<VisibilityWatch>,
}

impl LazyActivation {
    /// Create an idle controller firing at `threshold` (an intersection ratio)
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            state: ActivationState::Idle,
            threshold,
            watch: None,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Check if the watch is still held
    #[inline]
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Register `watch` and move to `Armed`
    ///
    /// # Errors
    /// Returns [`PipelineError::IllegalTransition`] unless currently `Idle`.
    pub fn arm(&mut self, watch: VisibilityWatch) -> Result<(), PipelineError> {
        self.transition(ActivationState::Armed)?;
        self.watch = Some(watch);
        Ok(())
    }

    /// Feed one visibility event
    ///
    /// Returns `true` only for the event that fires the trigger. A NaN ratio
    /// never fires.
    pub fn observe(&mut self, ratio: f64) -> bool {
        if self.state != ActivationState::Armed || ratio.is_nan() || ratio < self.threshold {
            return false;
        }
        if self.transition(ActivationState::Triggered).is_err() {
            return false;
        }
        self.watch = None;
        tracing::debug!(ratio, "lazy activation triggered");
        true
    }

    /// Wait for the trigger
    ///
    /// Returns `true` once triggered (immediately if already), `false` if
    /// the controller was never armed, was released, or the notifier went
    /// away. May wait forever if the target never becomes visible; an idle
    /// wait holds nothing but the channel.
    pub async fn wait(&mut self) -> bool {
        loop {
            let next = match self.watch.as_mut() {
                Some(watch) => watch.receiver.recv().await,
                None => return self.state == ActivationState::Triggered,
            };
            match next {
                Some(ratio) => {
                    if self.observe(ratio) {
                        return true;
                    }
                }
                None => return false,
            }
        }
    }

    /// Drop the watch without firing
    ///
    /// Returns `true` if this call released a pending watch. A controller
    /// that already fired stays `Triggered`.
    pub fn release(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        let was_armed = self.state == ActivationState::Armed;
        if self.transition(ActivationState::Released).is_err() {
            return false;
        }
        self.watch = None;
        if was_armed {
            tracing::debug!("visibility watch released before trigger");
        }
        was_armed
    }

    fn transition(&mut self, to: ActivationState) -> Result<(), PipelineError> {
        validate_transition(self.state, to)?;
        self.state = to;
        Ok(())
    }
}

impl Drop for LazyActivation {
    fn drop(&mut self) {
        self.release();
    }
}
