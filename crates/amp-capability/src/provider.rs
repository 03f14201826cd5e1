//! Injected capability sources
//!
//! The detector never queries platform globals directly; it asks a
//! [`CapabilityProvider`]. [`ClientHintsProvider`] is the default
//! implementation for server-side negotiation, reading the `Accept` header and
//! the network/device client hints a browser sends with an image request.

use crate::error::CapabilityError;
use amp_types::{sanitize_dpr, ConnectionTier, ImageFormat, Viewport};
use async_trait::async_trait;
use std::collections::HashMap;

/// Point-in-time network information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkSnapshot {
    /// Effective connection tier
    pub tier: ConnectionTier,
    /// Reduced data usage requested
    pub save_data: bool,
    /// Downlink estimate in Mbps
    pub downlink_mbps: Option<f64>,
}

impl NetworkSnapshot {
    /// Snapshot for `tier` with no save-data and no downlink estimate
    #[inline]
    #[must_use]
    pub fn new(tier: ConnectionTier) -> Self {
        Self {
            tier,
            save_data: false,
            downlink_mbps: None,
        }
    }

    /// With save-data flag
    #[inline]
    #[must_use]
    pub fn with_save_data(mut self, save_data: bool) -> Self {
        self.save_data = save_data;
        self
    }

    /// With downlink estimate
    #[inline]
    #[must_use]
    pub fn with_downlink(mut self, mbps: f64) -> Self {
        self.downlink_mbps = Some(mbps);
        self
    }
}

impl Default for NetworkSnapshot {
    /// `4g` without save-data: what a platform with no network information implies
    fn default() -> Self {
        Self::new(ConnectionTier::G4)
    }
}

/// Source of run-time client capabilities
///
/// Implementations may fail or hang in [`probe_decode`](Self::probe_decode);
/// the detector bounds every probe and treats failure as "unsupported".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Attempt to decode a minimal probe image in `format`
    ///
    /// # Errors
    /// Any error means the format is treated as unsupported.
    async fn probe_decode(&self, format: ImageFormat) -> Result<bool, CapabilityError>;

    /// Current network information, if the platform exposes any
    fn network(&self) -> Option<NetworkSnapshot>;

    /// Device pixel ratio, if known
    fn device_pixel_ratio(&self) -> Option<f64>;

    /// Viewport size, if known
    fn viewport(&self) -> Option<Viewport>;
}

/// Capability provider backed by HTTP request headers
///
/// Recognised headers (case-insensitive):
/// - `Accept`: `image/avif`, `image/webp` advertise next-gen decode support
/// - `ECT`: effective connection type (`slow-2g`, `2g`, `3g`, `4g`)
/// - `Save-Data`: `on` enables save-data mode
/// - `Downlink`: Mbps estimate
/// - `Sec-CH-DPR` / `DPR`: device pixel ratio
/// - `Sec-CH-Viewport-Width` / `Viewport-Width`: viewport width
#[derive(Debug, Clone, Default)]
pub struct ClientHintsProvider {
    headers: HashMap<String, String>,
}

impl ClientHintsProvider {
    /// Build from header name/value pairs
    pub fn from_headers<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().trim().to_ascii_lowercase(), v.as_ref().trim().to_string()))
            .collect();
        Self { headers }
    }

    /// Header value by lowercase name
    #[inline]
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// First present header among `names`
    fn first_header(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.header(name))
    }

    /// Check if `Accept` lists the MIME type for `format`
    fn accepts(&self, format: ImageFormat) -> bool {
        self.header("accept").is_some_and(|accept| {
            accept
                .split(',')
                .filter_map(|part| part.split(';').next())
                .any(|mime| mime.trim().eq_ignore_ascii_case(format.mime_type()))
        })
    }
}

#[async_trait]
impl CapabilityProvider for ClientHintsProvider {
    async fn probe_decode(&self, format: ImageFormat) -> Result<bool, CapabilityError> {
        if format.is_next_gen() {
            Ok(self.accepts(format))
        } else {
            // Legacy formats decode everywhere.
            Ok(true)
        }
    }

    fn network(&self) -> Option<NetworkSnapshot> {
        let tier = self.header("ect").and_then(|v| v.parse::<ConnectionTier>().ok());
        let save_data = self.header("save-data").map(|v| v.eq_ignore_ascii_case("on"));
        let downlink = self
            .header("downlink")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|m| m.is_finite() && *m >= 0.0);

        if tier.is_none() && save_data.is_none() && downlink.is_none() {
            return None;
        }

        Some(NetworkSnapshot {
            tier: tier.unwrap_or_default(),
            save_data: save_data.unwrap_or(false),
            downlink_mbps: downlink,
        })
    }

    fn device_pixel_ratio(&self) -> Option<f64> {
        self.first_header(&["sec-ch-dpr", "dpr"])
            .and_then(|v| v.parse::<f64>().ok())
            .map(sanitize_dpr)
    }

    fn viewport(&self) -> Option<Viewport> {
        let width = self
            .first_header(&["sec-ch-viewport-width", "viewport-width"])
            .and_then(|v| v.parse::<u32>().ok())?;
        let height = self
            .first_header(&["sec-ch-viewport-height", "viewport-height"])
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(Viewport::default().height);
        Some(Viewport::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chrome_like() -> ClientHintsProvider {
        ClientHintsProvider::from_headers([
            ("Accept", "image/avif,image/webp,image/apng,image/*,*/*;q=0.8"),
            ("ECT", "3g"),
            ("Downlink", "1.2"),
            ("Sec-CH-DPR", "2"),
            ("Sec-CH-Viewport-Width", "412"),
        ])
    }

    #[tokio::test]
    async fn accept_header_drives_probes() {
        let provider = chrome_like();
        assert!(provider.probe_decode(ImageFormat::Avif).await.unwrap());
        assert!(provider.probe_decode(ImageFormat::Webp).await.unwrap());
        assert!(provider.probe_decode(ImageFormat::Jpeg).await.unwrap());

        let legacy = ClientHintsProvider::from_headers([("accept", "image/png,*/*")]);
        assert!(!legacy.probe_decode(ImageFormat::Avif).await.unwrap());
        assert!(!legacy.probe_decode(ImageFormat::Webp).await.unwrap());
    }

    #[test]
    fn network_hints() {
        let snapshot = chrome_like().network().unwrap();
        assert_eq!(snapshot.tier, ConnectionTier::G3);
        assert!(!snapshot.save_data);
        assert_eq!(snapshot.downlink_mbps, Some(1.2));

        let save = ClientHintsProvider::from_headers([("save-data", "on")]);
        let snapshot = save.network().unwrap();
        assert!(snapshot.save_data);
        assert_eq!(snapshot.tier, ConnectionTier::G4);
    }

    #[test]
    fn no_hints_means_no_network_info() {
        let provider = ClientHintsProvider::from_headers([("accept", "*/*")]);
        assert!(provider.network().is_none());
        assert!(provider.device_pixel_ratio().is_none());
        assert!(provider.viewport().is_none());
    }

    #[test]
    fn device_hints() {
        let provider = chrome_like();
        assert_eq!(provider.device_pixel_ratio(), Some(2.0));
        assert_eq!(provider.viewport().map(|v| v.width), Some(412));

        let bogus = ClientHintsProvider::from_headers([("dpr", "-3")]);
        assert_eq!(bogus.device_pixel_ratio(), Some(1.0));
    }
}
