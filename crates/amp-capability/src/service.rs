//! Process-wide capability-profile service
//!
//! One producer, many readers. The first [`subscribe`](CapabilityService::subscribe)
//! runs detection and publishes the profile; later subscribers receive the
//! memoized value. Dropping the last [`ProfileSubscription`] tears the service
//! down, so the next subscriber detects afresh.
//!
//! Only the service writes the profile. A network change signal re-publishes
//! it with a new generation; format support is not re-probed.

use crate::detector::CapabilityDetector;
use crate::provider::NetworkSnapshot;
use amp_types::CapabilityProfile;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// A published profile together with its generation
///
/// The generation increases on every publication; resolution caches key on
/// it so a re-published profile never serves stale locators.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    /// Monotonic publication counter
    pub generation: u64,
    /// The profile
    pub profile: Arc<CapabilityProfile>,
}

#[derive(Debug)]
struct ServiceInner {
    detector: CapabilityDetector,
    sender: watch::Sender<Option<ProfileSnapshot>>,
    init: Mutex<()>,
    subscribers: AtomicUsize,
    generation: AtomicU64,
}

impl ServiceInner {
    fn publish(&self, profile: CapabilityProfile) -> ProfileSnapshot {
        let snapshot = ProfileSnapshot {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            profile: Arc::new(profile),
        };
        self.sender.send_replace(Some(snapshot.clone()));
        snapshot
    }
}

/// Shared capability-profile service
#[derive(Debug, Clone)]
pub struct CapabilityService {
    inner: Arc<ServiceInner>,
}

impl CapabilityService {
    /// Create service around a detector; nothing runs until the first subscription
    #[must_use]
    pub fn new(detector: CapabilityDetector) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            inner: Arc::new(ServiceInner {
                detector,
                sender,
                init: Mutex::new(()),
                subscribers: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to profile publications, detecting on first use
    pub async fn subscribe(&self) -> ProfileSubscription {
        let previous = self.inner.subscribers.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            tracing::debug!("capability service initialising");
        }
        let subscription = ProfileSubscription {
            receiver: self.inner.sender.subscribe(),
            inner: Arc::clone(&self.inner),
        };
        self.ensure_detected().await;
        subscription
    }

    /// Current profile, detecting it if nothing is published yet
    pub async fn ensure_detected(&self) -> ProfileSnapshot {
        let _guard = self.inner.init.lock().await;
        let published = self.inner.sender.borrow().clone();
        if let Some(snapshot) = published {
            return snapshot;
        }

        let profile = self.inner.detector.detect().await;
        let snapshot = self.inner.publish(profile);
        tracing::info!(generation = snapshot.generation, "capability profile published");
        snapshot
    }

    /// Latest published profile without triggering detection
    #[must_use]
    pub fn current(&self) -> Option<ProfileSnapshot> {
        self.inner.sender.borrow().clone()
    }

    /// Re-publish the profile with new network information
    ///
    /// Ignored while nothing is published: the next detection reads fresh
    /// network information anyway.
    pub fn notify_network_change(&self, network: NetworkSnapshot) -> Option<ProfileSnapshot> {
        let current = self.current()?;
        let profile = CapabilityProfile::clone(&current.profile)
            .with_tier(network.tier)
            .with_save_data(network.save_data)
            .with_downlink(network.downlink_mbps);

        if profile == *current.profile {
            return Some(current);
        }

        let snapshot = self.inner.publish(profile);
        tracing::info!(
            generation = snapshot.generation,
            tier = %network.tier,
            save_data = network.save_data,
            "network change re-published capability profile"
        );
        Some(snapshot)
    }

    /// Re-read network information from the provider and re-publish on change
    pub fn refresh_network(&self) -> Option<ProfileSnapshot> {
        let network = self.inner.detector.network_snapshot();
        self.notify_network_change(network)
    }

    /// Number of live subscriptions
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.load(Ordering::SeqCst)
    }
}

/// Read-only handle on the published profile
///
/// Dropping the last subscription tears the service down.
#[derive(Debug)]
pub struct ProfileSubscription {
    receiver: watch::Receiver<Option<ProfileSnapshot>>,
    inner: Arc<ServiceInner>,
}

impl ProfileSubscription {
    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> Option<ProfileSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Latest profile, or the conservative profile if none is published
    #[must_use]
    pub fn profile(&self) -> Arc<CapabilityProfile> {
        self.snapshot()
            .map_or_else(|| Arc::new(CapabilityProfile::conservative()), |s| s.profile)
    }

    /// Latest snapshot, marking it seen for [`has_changed`](Self::has_changed)
    pub fn mark_seen(&mut self) -> Option<ProfileSnapshot> {
        self.receiver.borrow_and_update().clone()
    }

    /// Check if a publication arrived since the last one this handle saw
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next publication
    ///
    /// Returns `None` when the service was torn down.
    pub async fn changed(&mut self) -> Option<ProfileSnapshot> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }
}

impl Drop for ProfileSubscription {
    fn drop(&mut self) {
        if self.inner.subscribers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.sender.send_replace(None);
            tracing::debug!("last subscriber gone; capability service torn down");
        }
    }
}
