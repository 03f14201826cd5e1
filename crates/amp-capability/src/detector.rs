//! Capability detection
//!
//! Probes run concurrently, each bounded by the configured timeout. A probe
//! that errors, answers `false`, or never settles marks its format
//! unsupported; the detector itself cannot fail.

use crate::error::CapabilityError;
use crate::provider::{CapabilityProvider, NetworkSnapshot};
use amp_types::{CapabilityProfile, ImageFormat, PipelineConfig};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds [`CapabilityProfile`]s from an injected provider
#[derive(Clone)]
pub struct CapabilityDetector {
    provider: Arc<dyn CapabilityProvider>,
    probe_formats: Vec<ImageFormat>,
    probe_timeout: Duration,
}

impl fmt::Debug for CapabilityDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDetector")
            .field("probe_formats", &self.probe_formats)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl CapabilityDetector {
    /// Create detector
    ///
    /// `probe_formats` is probed in the given order, newest first; the legacy
    /// fallback is always appended as supported.
    #[must_use]
    pub fn new(
        provider: Arc<dyn CapabilityProvider>,
        probe_formats: Vec<ImageFormat>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            probe_formats,
            probe_timeout,
        }
    }

    /// Create detector using the probe settings of `config`
    #[must_use]
    pub fn from_config(provider: Arc<dyn CapabilityProvider>, config: &PipelineConfig) -> Self {
        Self::new(provider, config.probe_formats.clone(), config.probe_timeout())
    }

    /// Run every probe and read network/device information
    pub async fn detect(&self) -> CapabilityProfile {
        let formats = self.supported_formats().await;
        let network = self.network_snapshot();

        let mut profile = CapabilityProfile::conservative()
            .with_formats(formats)
            .with_tier(network.tier)
            .with_save_data(network.save_data)
            .with_downlink(network.downlink_mbps);

        if let Some(dpr) = self.provider.device_pixel_ratio() {
            profile = profile.with_device_pixel_ratio(dpr);
        }
        if let Some(viewport) = self.provider.viewport() {
            profile = profile.with_viewport(viewport);
        }

        tracing::debug!(
            formats = ?profile.supported_formats,
            tier = %profile.connection_tier,
            save_data = profile.save_data,
            "capability profile detected"
        );
        profile
    }

    /// Supported formats, most preferred first, legacy fallback last
    pub async fn supported_formats(&self) -> Vec<ImageFormat> {
        let probes = self.probe_formats.iter().map(|format| self.probe(*format));
        let results = join_all(probes).await;

        let mut formats: Vec<ImageFormat> = self
            .probe_formats
            .iter()
            .zip(results)
            .filter_map(|(format, supported)| supported.then_some(*format))
            .collect();
        formats.dedup();

        if !formats.contains(&ImageFormat::LEGACY_FALLBACK) {
            formats.push(ImageFormat::LEGACY_FALLBACK);
        }
        formats
    }

    /// Current network snapshot, defaulting to `4g` without save-data
    #[must_use]
    pub fn network_snapshot(&self) -> NetworkSnapshot {
        self.provider.network().unwrap_or_else(|| {
            tracing::debug!("no network information available; assuming 4g");
            NetworkSnapshot::default()
        })
    }

    /// Probe one format, absorbing errors and timeouts
    async fn probe(&self, format: ImageFormat) -> bool {
        match tokio::time::timeout(self.probe_timeout, self.provider.probe_decode(format)).await {
            Ok(Ok(supported)) => supported,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "treating format as unsupported");
                false
            }
            Err(_) => {
                let err = CapabilityError::ProbeTimeout {
                    format,
                    waited: self.probe_timeout,
                };
                tracing::warn!(error = %err, "treating format as unsupported");
                false
            }
        }
    }
}
