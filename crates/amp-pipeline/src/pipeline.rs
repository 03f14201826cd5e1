//! Consumer-facing resolution
//!
//! [`MediaPipeline::resolve`] turns a [`MediaRequest`] into a [`MediaHandle`]
//! owned by one consumer. Each resolution pass runs, in order:
//!
//! 1. capability profile (shared, memoized by the [`CapabilityService`])
//! 2. primary locator ([`TransformBuilder`])
//! 3. responsive set and placeholder (independent of each other)
//!
//! Loading and measuring the primary locator is a separate, spawned step.
//! Its result reaches the handle and the [`MetricsLedger`] only while the
//! consumer is still mounted.

use crate::builder::{Transform, TransformBuilder};
use crate::cache::{Resolution, ResolutionCache, ResolutionKey};
use crate::error::{LoadError, PipelineError};
use crate::lazy::{ActivationState, LazyActivation, VisibilityWatch};
use crate::metrics::{MeasureContext, MediaLoader, MetricsCollector, MetricsLedger};
use crate::placeholder::PlaceholderGenerator;
use crate::preload::{PreloadController, PreloadGuard, PreloadRegistry};
use crate::responsive::ResponsiveSetGenerator;
use amp_capability::{
    CapabilityDetector, CapabilityProvider, CapabilityService, ProfileSnapshot,
    ProfileSubscription,
};
use amp_types::{
    CapabilityProfile, MediaMetrics, MediaRequest, MediaRequestPatch, PipelineConfig,
    ResolvedMedia,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

struct PipelineInner {
    config: PipelineConfig,
    service: CapabilityService,
    builder: TransformBuilder,
    responsive: ResponsiveSetGenerator,
    placeholder: PlaceholderGenerator,
    collector: MetricsCollector,
    preload: PreloadController,
    cache: ResolutionCache,
    ledger: MetricsLedger,
}

/// Shared entry point; cheap to clone
#[derive(Clone)]
pub struct MediaPipeline {
    inner: Arc<PipelineInner>,
}

impl std::fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("backend", &self.inner.config.backend.host)
            .field("breakpoints", &self.inner.config.breakpoints.len())
            .field("resolutions", &self.inner.cache.builds())
            .finish_non_exhaustive()
    }
}

impl MediaPipeline {
    /// Create a pipeline with its own capability service and preload registry
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn CapabilityProvider>,
        loader: Arc<dyn MediaLoader>,
    ) -> Self {
        let service = CapabilityService::new(CapabilityDetector::from_config(provider, &config));
        Self::from_parts(config, service, loader, PreloadRegistry::new())
    }

    /// Create a pipeline over a shared service and registry
    #[must_use]
    pub fn from_parts(
        config: PipelineConfig,
        service: CapabilityService,
        loader: Arc<dyn MediaLoader>,
        registry: PreloadRegistry,
    ) -> Self {
        let builder = TransformBuilder::from_config(&config);
        Self {
            inner: Arc::new(PipelineInner {
                responsive: ResponsiveSetGenerator::new(builder.clone(), config.breakpoints.clone()),
                placeholder: PlaceholderGenerator::new(
                    builder.clone(),
                    config.placeholder_width,
                    config.placeholder_quality,
                ),
                collector: MetricsCollector::new(loader, config.fast_bandwidth_mbps),
                preload: PreloadController::new(registry),
                cache: ResolutionCache::new(config.cache_capacity),
                ledger: MetricsLedger::new(),
                builder,
                service,
                config,
            }),
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Capability service
    #[inline]
    #[must_use]
    pub fn service(&self) -> &CapabilityService {
        &self.inner.service
    }

    /// Active preload hints
    #[inline]
    #[must_use]
    pub fn preload_registry(&self) -> &PreloadRegistry {
        self.inner.preload.registry()
    }

    /// Completed measurements
    #[inline]
    #[must_use]
    pub fn ledger(&self) -> &MetricsLedger {
        &self.inner.ledger
    }

    /// Number of resolution passes run (cache hits excluded)
    #[inline]
    #[must_use]
    pub fn resolution_count(&self) -> u64 {
        self.inner.cache.builds()
    }

    /// Resolve `request` for one consumer
    ///
    /// Resolution runs immediately when the request is priority, not lazy,
    /// or when no visibility watch is supplied. Otherwise the watch is armed
    /// and resolution waits for [`MediaHandle::activate`].
    pub async fn resolve(
        &self,
        request: MediaRequest,
        visibility: Option<VisibilityWatch>,
    ) -> MediaHandle {
        let subscription = self.inner.service.subscribe().await;
        let mut handle = MediaHandle {
            id: Uuid::new_v4(),
            pipeline: self.clone(),
            activation: LazyActivation::new(self.inner.config.visibility_threshold),
            state: Arc::new(Mutex::new(HandleState::default())),
            preload: None,
            subscription,
            request,
        };

        match visibility {
            Some(watch) if handle.request.is_deferred() => {
                if let Err(err) = handle.activation.arm(watch) {
                    tracing::warn!(error = %err, "could not arm visibility watch");
                    handle.run_resolution().await;
                } else {
                    tracing::debug!(source = %handle.request.source, "resolution deferred until visible");
                }
            }
            _ => handle.run_resolution().await,
        }
        handle
    }

    /// Build one resolution; pure given its inputs
    #[must_use]
    pub fn build_resolution(
        &self,
        request: &MediaRequest,
        profile: &CapabilityProfile,
        generation: u64,
    ) -> Resolution {
        let inner = &self.inner;
        let width = inner.responsive.primary_width(request, profile);
        let primary = inner.builder.build_outcome(
            &request.source,
            profile,
            &Transform::for_request(request, Some(width)),
        );
        let src_set = inner.responsive.generate_set(request, profile);
        let placeholder_url =
            inner
                .placeholder
                .generate_below(&request.source, &request.placeholder, profile, &primary);

        Resolution {
            resolved: ResolvedMedia {
                primary_url: primary.url().to_string(),
                src_set,
                sizes_attribute: request.layout_sizes.clone(),
                placeholder_url,
                metrics: None,
            },
            primary,
            generation,
        }
    }

    async fn resolve_cached(
        &self,
        request: &MediaRequest,
        snapshot: &ProfileSnapshot,
    ) -> Arc<Resolution> {
        let key = ResolutionKey::new(request, snapshot.generation);
        self.inner
            .cache
            .get_or_resolve(key, || {
                tracing::debug!(
                    source = %request.source,
                    generation = snapshot.generation,
                    "resolving media request"
                );
                self.build_resolution(request, &snapshot.profile, snapshot.generation)
            })
            .await
    }
}

#[derive(Debug, Default)]
struct HandleState {
    resolution: Option<Arc<Resolution>>,
    metrics: Option<MediaMetrics>,
    error: Option<PipelineError>,
    started: Option<Instant>,
    epoch: u64,
    unmounted: bool,
}

/// One consumer's view of a resolved request
///
/// Dropping the handle (or calling [`unmount`](Self::unmount)) releases the
/// visibility watch, the preload hint and the profile subscription, and
/// removes the consumer's entries from the metrics ledger. Loads still in
/// flight complete, but their metrics are discarded.
#[derive(Debug)]
pub struct MediaHandle {
    id: Uuid,
    pipeline: MediaPipeline,
    request: MediaRequest,
    subscription: ProfileSubscription,
    activation: LazyActivation,
    state: Arc<Mutex<HandleState>>,
    preload: Option<PreloadGuard>,
}

impl MediaHandle {
    /// Consumer id (ledger key)
    #[inline]
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current request
    #[inline]
    #[must_use]
    pub fn request(&self) -> &MediaRequest {
        &self.request
    }

    /// Resolved media, with metrics once measured
    #[must_use]
    pub fn resolved(&self) -> Option<ResolvedMedia> {
        let state = self.state.lock();
        state.resolution.as_ref().map(|resolution| {
            let mut resolved = resolution.resolved.clone();
            resolved.metrics.clone_from(&state.metrics);
            resolved
        })
    }

    /// Check if a resolution pass has completed
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.lock().resolution.is_some()
    }

    /// Last load failure, if any
    #[must_use]
    pub fn error(&self) -> Option<PipelineError> {
        self.state.lock().error.clone()
    }

    /// Lazy activation state
    #[inline]
    #[must_use]
    pub fn activation_state(&self) -> ActivationState {
        self.activation.state()
    }

    /// Check if a preload hint is registered for this consumer
    #[inline]
    #[must_use]
    pub fn is_preloading(&self) -> bool {
        self.preload.is_some()
    }

    /// Wait for visibility if deferred, then resolve
    ///
    /// # Errors
    /// Returns [`PipelineError::NotResolved`] if the visibility source went
    /// away before the target became visible.
    pub async fn activate(&mut self) -> Result<ResolvedMedia, PipelineError> {
        if let Some(resolved) = self.resolved() {
            return Ok(resolved);
        }
        if self.activation.state() == ActivationState::Armed && !self.activation.wait().await {
            return Err(PipelineError::NotResolved);
        }
        self.run_resolution().await;
        self.resolved().ok_or(PipelineError::NotResolved)
    }

    /// Feed one visibility event directly
    ///
    /// Returns `true` if it fired the trigger; the caller then resolves
    /// with [`activate`](Self::activate).
    pub fn observe_visibility(&mut self, ratio: f64) -> bool {
        self.activation.observe(ratio)
    }

    /// Start loading the primary locator
    ///
    /// The load runs on its own task. If the consumer unmounts first the
    /// task still finishes, but its result is not applied anywhere.
    ///
    /// # Errors
    /// Returns [`PipelineError::NotResolved`] before the first resolution.
    pub fn start_load(&self) -> Result<LoadTask, PipelineError> {
        let (url, context, started, epoch) = {
            let state = self.state.lock();
            let resolution = state.resolution.as_ref().ok_or(PipelineError::NotResolved)?;
            let context = MeasureContext {
                format: resolution.primary.format(),
                quality: resolution.primary.quality().unwrap_or(self.request.quality),
                profile: CapabilityProfile::clone(&self.subscription.profile()),
            };
            (
                resolution.resolved.primary_url.clone(),
                context,
                state.started.unwrap_or_else(Instant::now),
                state.epoch,
            )
        };

        let consumer = self.id;
        let locator = url.clone();
        let collector = self.pipeline.inner.collector.clone();
        let ledger = self.pipeline.inner.ledger.clone();
        let weak: Weak<Mutex<HandleState>> = Arc::downgrade(&self.state);

        let task = tokio::spawn(async move {
            let outcome = collector.measure(&url, started, &context).await;

            let Some(shared) = weak.upgrade() else {
                tracing::debug!(%url, "consumer unmounted; discarding load result");
                return Err(PipelineError::ConsumerGone);
            };
            // Ledger writes happen under the state lock so they cannot race
            // the unmount that forgets this consumer.
            let mut state = shared.lock();
            if state.unmounted {
                tracing::debug!(%url, "consumer unmounted; discarding load result");
                return Err(PipelineError::ConsumerGone);
            }
            if state.epoch != epoch {
                tracing::debug!(%url, "stale load; a newer resolution replaced it");
                return Err(PipelineError::Superseded { url });
            }

            match outcome {
                Ok(metrics) => {
                    state.metrics = Some(metrics.clone());
                    state.error = None;
                    ledger.record(consumer, metrics.clone());
                    Ok(metrics)
                }
                Err(source) => {
                    tracing::warn!(%url, error = %source, "load failed");
                    let err = PipelineError::load_failure(url, source);
                    state.error = Some(err.clone());
                    Err(err)
                }
            }
        });

        Ok(LoadTask { url: locator, task })
    }

    /// Load the primary locator and wait for its metrics
    ///
    /// # Errors
    /// [`PipelineError::LoadFailure`] when the load fails (offer
    /// [`retry`](Self::retry)), or [`PipelineError::NotResolved`].
    pub async fn load(&self) -> Result<MediaMetrics, PipelineError> {
        self.start_load()?.join().await
    }

    /// Rebuild from the builder step, reusing the published profile
    ///
    /// # Errors
    /// Returns [`PipelineError::NotResolved`] if nothing was resolved yet.
    pub async fn retry(&mut self) -> Result<ResolvedMedia, PipelineError> {
        let generation = self
            .state
            .lock()
            .resolution
            .as_ref()
            .map(|resolution| resolution.generation)
            .ok_or(PipelineError::NotResolved)?;

        let key = ResolutionKey::new(&self.request, generation);
        self.pipeline.inner.cache.invalidate(&key).await;
        tracing::debug!(source = %self.request.source, "retrying resolution");
        self.run_resolution().await;
        self.resolved().ok_or(PipelineError::NotResolved)
    }

    /// Merge `patch` into the request and resolve again
    ///
    /// Returns `None` while the handle is still waiting for visibility; the
    /// merged request is used when it activates.
    pub async fn update_request(&mut self, patch: &MediaRequestPatch) -> Option<ResolvedMedia> {
        if patch.is_empty() {
            return self.resolved();
        }
        self.request = self.request.merged(patch);
        if self.activation.state() == ActivationState::Armed {
            return None;
        }
        self.run_resolution().await;
        self.resolved()
    }

    /// Re-resolve if the capability profile was re-published
    ///
    /// Returns `true` if a new resolution pass ran.
    pub async fn refresh_profile(&mut self) -> bool {
        if !self.subscription.has_changed() {
            return false;
        }
        if !self.is_resolved() {
            self.subscription.mark_seen();
            return false;
        }
        self.run_resolution().await;
        true
    }

    /// Release everything this consumer holds
    pub fn unmount(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        {
            let mut state = self.state.lock();
            if state.unmounted {
                return;
            }
            state.unmounted = true;
            self.pipeline.inner.ledger.forget(self.id);
        }
        let released_watch = self.activation.release();
        let released_preload = self.preload.take().is_some();
        tracing::debug!(
            consumer = %self.id,
            released_watch,
            released_preload,
            "consumer unmounted"
        );
    }

    async fn run_resolution(&mut self) {
        let snapshot = match self.subscription.mark_seen() {
            Some(snapshot) => snapshot,
            None => self.pipeline.inner.service.ensure_detected().await,
        };

        let started = Instant::now();
        let resolution = self.pipeline.resolve_cached(&self.request, &snapshot).await;

        self.preload = self
            .pipeline
            .inner
            .preload
            .preload(&self.request, &resolution.resolved);

        let mut state = self.state.lock();
        state.resolution = Some(resolution);
        state.metrics = None;
        state.error = None;
        state.started = Some(started);
        state.epoch += 1;
    }
}

impl Drop for MediaHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

/// A spawned load of one primary locator
#[derive(Debug)]
pub struct LoadTask {
    url: String,
    task: JoinHandle<Result<MediaMetrics, PipelineError>>,
}

impl LoadTask {
    /// Locator being loaded
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the load to finish
    ///
    /// # Errors
    /// The load's own error, [`PipelineError::ConsumerGone`] or
    /// [`PipelineError::Superseded`] if its result was discarded, or a load
    /// failure naming the locator if the task itself died.
    pub async fn join(self) -> Result<MediaMetrics, PipelineError> {
        let Self { url, task } = self;
        task.await.unwrap_or_else(|err| {
            Err(PipelineError::load_failure(
                url,
                LoadError::Aborted(err.to_string()),
            ))
        })
    }

    /// Abort the load; [`join`](Self::join) then reports an aborted load
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Check if the load has finished
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
