//! Testing utilities for the AMP workspace
//!
//! Swappable doubles for the pipeline's two injected seams, a hand-driven
//! visibility source, and fixtures.

#![allow(missing_docs)]

use amp_capability::{CapabilityError, CapabilityProvider, NetworkSnapshot};
use amp_pipeline::{LoadError, MediaLoader, MediaPipeline, VisibilityNotifier, VisibilityWatch};
use amp_types::{ConnectionTier, Dimensions, ImageFormat, PipelineConfig, Viewport};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const BACKEND_PREFIX: &str = "https://res.cloudinary.com/demo/image/upload/";

/// Locator inside the default backend namespace
pub fn backend_url(path: &str) -> String {
    format!("{BACKEND_PREFIX}{}", path.trim_start_matches('/'))
}

/// Visibility source driven by the test instead of a layout engine
#[derive(Debug)]
pub struct ManualVisibility {
    notifier: VisibilityNotifier,
    sent: AtomicUsize,
}

impl ManualVisibility {
    /// Connected source and the watch to hand to `resolve`
    pub fn new() -> (Self, VisibilityWatch) {
        let (notifier, watch) = VisibilityWatch::channel();
        (
            Self {
                notifier,
                sent: AtomicUsize::new(0),
            },
            watch,
        )
    }

    /// Report an intersection ratio; `false` once the watch is released
    pub fn set_ratio(&self, ratio: f64) -> bool {
        let delivered = self.notifier.notify(ratio);
        if delivered {
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
        delivered
    }

    /// Fully in view
    pub fn show(&self) -> bool {
        self.set_ratio(1.0)
    }

    /// Fully out of view
    pub fn hide(&self) -> bool {
        self.set_ratio(0.0)
    }

    /// Scroll the target in and out `times` times
    pub fn cross(&self, times: usize) {
        for _ in 0..times {
            self.show();
            self.hide();
        }
    }

    /// Events delivered so far
    pub fn events_sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.notifier.is_released()
    }
}

/// Default config with a short probe timeout
pub fn test_config() -> PipelineConfig {
    PipelineConfig::default().with_probe_timeout(Duration::from_millis(50))
}

/// Capability provider with fixed answers
#[derive(Debug)]
pub struct StaticProvider {
    decodable: Vec<ImageFormat>,
    network: Option<NetworkSnapshot>,
    dpr: Option<f64>,
    viewport: Option<Viewport>,
    hang: bool,
    probes: AtomicUsize,
}

impl StaticProvider {
    /// Decodes AVIF and WebP, no network information
    pub fn modern() -> Self {
        Self::decoding(vec![ImageFormat::Avif, ImageFormat::Webp])
    }

    /// Decodes nothing beyond the legacy fallback
    pub fn legacy() -> Self {
        Self::decoding(Vec::new())
    }

    pub fn decoding(decodable: Vec<ImageFormat>) -> Self {
        Self {
            decodable,
            network: None,
            dpr: None,
            viewport: None,
            hang: false,
            probes: AtomicUsize::new(0),
        }
    }

    pub fn with_network(mut self, network: NetworkSnapshot) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_tier(self, tier: ConnectionTier) -> Self {
        self.with_network(NetworkSnapshot::new(tier))
    }

    pub fn with_save_data(self, tier: ConnectionTier) -> Self {
        self.with_network(NetworkSnapshot::new(tier).with_save_data(true))
    }

    pub fn with_display(mut self, viewport: Viewport, dpr: f64) -> Self {
        self.viewport = Some(viewport);
        self.dpr = Some(dpr);
        self
    }

    /// Probes never settle
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapabilityProvider for StaticProvider {
    async fn probe_decode(&self, format: ImageFormat) -> Result<bool, CapabilityError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.decodable.contains(&format))
    }

    fn network(&self) -> Option<NetworkSnapshot> {
        self.network
    }

    fn device_pixel_ratio(&self) -> Option<f64> {
        self.dpr
    }

    fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }
}

/// Media loader with scripted outcomes
///
/// Every URL loads as `default_dimensions` unless scripted otherwise. A
/// gated loader holds every load until [`open_gate`](Self::open_gate).
#[derive(Debug)]
pub struct ScriptedLoader {
    default_dimensions: Dimensions,
    scripted: DashMap<String, Result<Dimensions, LoadError>>,
    gate: watch::Sender<bool>,
    loads: AtomicUsize,
}

impl ScriptedLoader {
    pub fn new(default_dimensions: Dimensions) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            default_dimensions,
            scripted: DashMap::new(),
            gate,
            loads: AtomicUsize::new(0),
        }
    }

    /// Loads block until the gate opens
    pub fn gated(default_dimensions: Dimensions) -> Self {
        let loader = Self::new(default_dimensions);
        loader.gate.send_replace(false);
        loader
    }

    pub fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    /// Every load of `url` fails with `error`
    pub fn fail(&self, url: impl Into<String>, error: LoadError) {
        self.scripted.insert(url.into(), Err(error));
    }

    /// Every load of `url` yields `dimensions`
    pub fn succeed(&self, url: impl Into<String>, dimensions: Dimensions) {
        self.scripted.insert(url.into(), Ok(dimensions));
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedLoader {
    fn default() -> Self {
        Self::new(Dimensions::new(1080, 720))
    }
}

#[async_trait]
impl MediaLoader for ScriptedLoader {
    async fn load(&self, url: &str) -> Result<Dimensions, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(LoadError::Aborted("loader dropped".to_string()));
        }

        self.scripted
            .get(url)
            .map_or(Ok(self.default_dimensions), |entry| entry.value().clone())
    }
}

/// Pipeline over the given doubles with [`test_config`]
pub fn pipeline_with(provider: Arc<StaticProvider>, loader: Arc<ScriptedLoader>) -> MediaPipeline {
    MediaPipeline::new(test_config(), provider, loader)
}

/// Pipeline for a modern client on a fast network
pub fn modern_pipeline() -> (MediaPipeline, Arc<ScriptedLoader>) {
    let loader = Arc::new(ScriptedLoader::default());
    (pipeline_with(Arc::new(StaticProvider::modern()), Arc::clone(&loader)), loader)
}

/// `w_` and `q_` directive values of a backend locator
pub fn directive_values(url: &str) -> Option<(u32, u32)> {
    let directives = url.strip_prefix(BACKEND_PREFIX)?.split('/').next()?;
    let value = |prefix: &str| {
        directives
            .split(',')
            .find_map(|d| d.strip_prefix(prefix))
            .and_then(|v| v.parse::<u32>().ok())
    };
    Some((value("w_")?, value("q_")?))
}
