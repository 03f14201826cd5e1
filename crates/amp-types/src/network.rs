//! Network condition classification
//!
//! Mirrors the coarse effective-connection-type buckets exposed by clients
//! (`slow-2g`, `2g`, `3g`, `4g`) plus `offline` and `unknown`.

use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Coarse classification of current network quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionTier {
    /// No connectivity
    #[serde(rename = "offline")]
    Offline,
    /// Very slow 2G
    #[serde(rename = "slow-2g")]
    Slow2g,
    /// 2G
    #[serde(rename = "2g")]
    G2,
    /// 3G
    #[serde(rename = "3g")]
    G3,
    /// 4G or better
    #[default]
    #[serde(rename = "4g")]
    G4,
    /// Client did not report a tier
    #[serde(rename = "unknown")]
    Unknown,
}

impl ConnectionTier {
    /// Canonical name as reported by clients
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Slow2g => "slow-2g",
            Self::G2 => "2g",
            Self::G3 => "3g",
            Self::G4 => "4g",
            Self::Unknown => "unknown",
        }
    }

    /// Quality points removed for this tier
    ///
    /// `offline` and `unknown` are not throttled: nothing is fetched offline,
    /// and an unknown tier degrades to unthrottled quality.
    #[inline]
    #[must_use]
    pub fn quality_markdown(&self) -> u8 {
        match self {
            Self::Slow2g | Self::G2 => 20,
            Self::G3 => 10,
            Self::G4 | Self::Offline | Self::Unknown => 0,
        }
    }

    /// Whether a tier this slow implies a slow link when no downlink is reported
    #[inline]
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        matches!(self, Self::Slow2g | Self::G2 | Self::G3 | Self::Offline)
    }
}

impl Display for ConnectionTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionTier {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" => Ok(Self::Offline),
            "slow-2g" | "slow2g" => Ok(Self::Slow2g),
            "2g" => Ok(Self::G2),
            "3g" => Ok(Self::G3),
            "4g" => Ok(Self::G4),
            "unknown" => Ok(Self::Unknown),
            other => Err(TypeError::UnknownTier(other.to_string())),
        }
    }
}

/// Bandwidth bucket recorded with measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandwidthClass {
    /// At or below the fast threshold
    Slow,
    /// Above the fast threshold
    Fast,
}

impl BandwidthClass {
    /// Classify a downlink estimate against `fast_threshold_mbps`
    ///
    /// Without an estimate the tier decides: constrained tiers are slow,
    /// everything else is fast.
    #[must_use]
    pub fn classify(
        downlink_mbps: Option<f64>,
        tier: ConnectionTier,
        fast_threshold_mbps: f64,
    ) -> Self {
        match downlink_mbps {
            Some(mbps) if mbps > fast_threshold_mbps => Self::Fast,
            Some(_) => Self::Slow,
            None if tier.is_constrained() => Self::Slow,
            None => Self::Fast,
        }
    }
}
