//! Activation Tests
//!
//! Lazy activation, priority preloading and unmount cleanup.
//!
use amp_pipeline::lazy::{allowed_transitions, validate_transition};
use amp_pipeline::prelude::*;
use amp_test_utils::{
    backend_url, modern_pipeline, pipeline_with, ManualVisibility, ScriptedLoader, StaticProvider,
};
use amp_types::Dimensions;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;

#[tokio::test]
async fn test_lazy_request_waits_for_visibility() {
    let (pipeline, _) = modern_pipeline();
    let (notifier, watch) = VisibilityWatch::channel();

    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")), Some(watch))
        .await;
    assert_eq!(handle.activation_state(), ActivationState::Armed);
    assert!(handle.resolved().is_none());
    assert_eq!(pipeline.resolution_count(), 0);

    notifier.notify(0.0);
    for _ in 0..10 {
        notifier.notify(1.0);
    }
    let resolved = handle.activate().await.unwrap();

    assert_eq!(handle.activation_state(), ActivationState::Triggered);
    assert!(notifier.is_released());
    assert!(!resolved.primary_url.is_empty());
    assert_eq!(pipeline.resolution_count(), 1);

    // Further activation is a no-op.
    handle.activate().await.unwrap();
    assert_eq!(pipeline.resolution_count(), 1);
}

#[tokio::test]
async fn test_ten_crossings_trigger_once() {
    let (pipeline, _) = modern_pipeline();
    let (_notifier, watch) = VisibilityWatch::channel();
    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")), Some(watch))
        .await;

    let triggers = (0..10).filter(|_| handle.observe_visibility(1.0)).count();
    assert_eq!(triggers, 1);
    assert_eq!(handle.activation_state(), ActivationState::Triggered);
}

#[tokio::test]
async fn test_scrolling_in_and_out_resolves_once() {
    let (pipeline, _) = modern_pipeline();
    let (visibility, watch) = ManualVisibility::new();
    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")), Some(watch))
        .await;

    visibility.hide();
    visibility.cross(10);
    assert_eq!(visibility.events_sent(), 21);

    handle.activate().await.unwrap();
    handle.activate().await.unwrap();
    assert_eq!(pipeline.resolution_count(), 1);
    assert!(visibility.is_released());
    assert!(!visibility.show());
}

#[tokio::test]
async fn test_priority_resolves_immediately_and_preloads() {
    let (pipeline, _) = modern_pipeline();
    let (notifier, watch) = VisibilityWatch::channel();

    let request = MediaRequest::new(backend_url("hero.jpg"))
        .with_priority(true)
        .with_lazy(true);
    let handle = pipeline.resolve(request, Some(watch)).await;

    let resolved = handle.resolved().unwrap();
    assert_eq!(handle.activation_state(), ActivationState::Idle);
    assert!(notifier.is_released());
    assert!(handle.is_preloading());
    assert!(pipeline.preload_registry().contains(&resolved.primary_url));

    let tag = pipeline.preload_registry().hints()[0].to_link_tag();
    assert!(tag.starts_with(r#"<link rel="preload" as="image""#));
}

#[tokio::test]
async fn test_non_priority_requests_do_not_preload() {
    let (pipeline, _) = modern_pipeline();
    let handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")).with_lazy(false), None)
        .await;

    assert!(!handle.is_preloading());
    assert!(pipeline.preload_registry().is_empty());
}

#[tokio::test]
async fn test_unmount_while_armed_releases_watch() {
    let (pipeline, _) = modern_pipeline();
    let (notifier, watch) = VisibilityWatch::channel();
    let handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")), Some(watch))
        .await;
    assert!(!notifier.is_released());

    handle.unmount();

    assert!(notifier.is_released());
    assert!(!notifier.notify(1.0));
    assert_eq!(pipeline.resolution_count(), 0);
    assert_eq!(pipeline.service().subscriber_count(), 0);
}

#[tokio::test]
async fn test_unmount_deregisters_preload() {
    let (pipeline, _) = modern_pipeline();
    let handle = pipeline
        .resolve(MediaRequest::new(backend_url("hero.jpg")).with_priority(true), None)
        .await;
    assert_eq!(pipeline.preload_registry().len(), 1);

    handle.unmount();
    assert!(pipeline.preload_registry().is_empty());
}

#[tokio::test]
async fn test_metrics_discarded_after_unmount() {
    let loader = Arc::new(ScriptedLoader::gated(Dimensions::new(640, 480)));
    let pipeline = pipeline_with(Arc::new(StaticProvider::modern()), Arc::clone(&loader));

    let handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")).with_lazy(false), None)
        .await;
    let task = handle.start_load().unwrap();

    handle.unmount();
    loader.open_gate();

    assert_eq!(task.join().await.unwrap_err(), PipelineError::ConsumerGone);
    assert!(pipeline.ledger().is_empty());
}

#[tokio::test]
async fn test_unmount_forgets_recorded_metrics() {
    let (pipeline, _) = modern_pipeline();

    for i in 0..50 {
        let handle = pipeline
            .resolve(MediaRequest::new(backend_url(&format!("{i}.jpg"))).with_lazy(false), None)
            .await;
        handle.load().await.unwrap();
        assert_eq!(pipeline.ledger().for_consumer(handle.id()).len(), 1);
        handle.unmount();
    }
    assert!(pipeline.ledger().is_empty());

    // Dropping without an explicit unmount cleans up the same way.
    let handle = pipeline
        .resolve(MediaRequest::new(backend_url("dropped.jpg")).with_lazy(false), None)
        .await;
    handle.load().await.unwrap();
    assert_eq!(pipeline.ledger().len(), 1);
    drop(handle);
    assert!(pipeline.ledger().is_empty());
}

#[tokio::test]
async fn test_load_started_before_retry_is_superseded() {
    let loader = Arc::new(ScriptedLoader::gated(Dimensions::new(640, 480)));
    let pipeline = pipeline_with(Arc::new(StaticProvider::modern()), Arc::clone(&loader));

    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")).with_lazy(false), None)
        .await;
    let url = handle.resolved().unwrap().primary_url;
    let stale = handle.start_load().unwrap();
    assert_eq!(stale.url(), url);

    handle.retry().await.unwrap();
    loader.open_gate();

    assert_eq!(
        stale.join().await.unwrap_err(),
        PipelineError::Superseded { url }
    );
    assert_eq!(handle.resolved().unwrap().metrics, None);
    assert!(handle.error().is_none());
    assert!(pipeline.ledger().is_empty());

    // A load of the current resolution still lands.
    handle.load().await.unwrap();
    assert!(handle.resolved().unwrap().metrics.is_some());
}

#[tokio::test]
async fn test_load_started_before_update_is_superseded() {
    let loader = Arc::new(ScriptedLoader::gated(Dimensions::new(640, 480)));
    let pipeline = pipeline_with(Arc::new(StaticProvider::modern()), Arc::clone(&loader));

    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")).with_lazy(false), None)
        .await;
    let stale = handle.start_load().unwrap();

    let patch = MediaRequestPatch::new().quality(Quality::new(50).unwrap());
    handle.update_request(&patch).await.unwrap();
    loader.open_gate();

    assert!(matches!(
        stale.join().await,
        Err(PipelineError::Superseded { .. })
    ));
    assert_eq!(handle.resolved().unwrap().metrics, None);
}

#[tokio::test]
async fn test_aborted_load_names_its_locator() {
    let loader = Arc::new(ScriptedLoader::gated(Dimensions::new(640, 480)));
    let pipeline = pipeline_with(Arc::new(StaticProvider::modern()), loader);

    let handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")).with_lazy(false), None)
        .await;
    let task = handle.start_load().unwrap();
    task.abort();

    match task.join().await {
        Err(PipelineError::LoadFailure { url, source: LoadError::Aborted(_) }) => {
            assert_eq!(url, handle.resolved().unwrap().primary_url);
        }
        other => panic!("expected an aborted load, got {other:?}"),
    }
}

#[tokio::test]
async fn test_last_unmount_tears_down_profile_service() {
    let (pipeline, _) = modern_pipeline();
    let a = pipeline.resolve(MediaRequest::new(backend_url("a.jpg")), None).await;
    let b = pipeline.resolve(MediaRequest::new(backend_url("b.jpg")), None).await;
    assert_eq!(pipeline.service().subscriber_count(), 2);

    a.unmount();
    assert!(pipeline.service().current().is_some());
    b.unmount();
    assert!(pipeline.service().current().is_none());
}

#[tokio::test]
async fn test_update_request_while_armed_waits_for_trigger() {
    let (pipeline, _) = modern_pipeline();
    let (notifier, watch) = VisibilityWatch::channel();
    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")), Some(watch))
        .await;

    let patch = MediaRequestPatch::new().quality(Quality::new(60).unwrap());
    assert!(handle.update_request(&patch).await.is_none());
    assert_eq!(pipeline.resolution_count(), 0);

    notifier.notify(1.0);
    let resolved = handle.activate().await.unwrap();
    assert!(resolved.primary_url.contains(",q_60,"));
}

#[tokio::test]
async fn test_activation_fails_when_visibility_source_goes_away() {
    let (pipeline, _) = modern_pipeline();
    let (notifier, watch) = VisibilityWatch::channel();
    let mut handle = pipeline
        .resolve(MediaRequest::new(backend_url("a.jpg")), Some(watch))
        .await;

    drop(notifier);
    assert_eq!(handle.activate().await.unwrap_err(), PipelineError::NotResolved);
    assert!(handle.resolved().is_none());
}

fn any_state() -> impl Strategy<Value = ActivationState> {
    prop_oneof![
        Just(ActivationState::Idle),
        Just(ActivationState::Armed),
        Just(ActivationState::Triggered),
        Just(ActivationState::Released),
    ]
}

proptest! {
    #[test]
    fn prop_transitions_match_table(from in any_state(), to in any_state()) {
        let allowed = allowed_transitions(from);
        prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
    }
}
