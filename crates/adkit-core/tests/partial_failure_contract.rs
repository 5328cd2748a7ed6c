//! Contract Test: Partial Failure Isolation
//!
//! This test verifies that one ad network failing never takes the others
//! down with it.
//!
//! Constraints verified:
//! - A failing provider ends in `Error(reason)` while others reach `Ready`
//! - The aggregate result is `false` whenever any provider failed
//! - Panicking and hanging adapters are contained
//! - Loads on a failed provider fail fast without a `Loading` event
//! - `cleanup` empties the registry and the state map
//!
//! If this test fails, an adapter failure is leaking into the manager.

mod common;

use adkit_core::{
    AdManager, AdProvider, AdResult, AdSdk, AdState, ManagerConfig, ProviderPolicy, StateMap,
};
use common::*;
use std::sync::Arc;
use tokio_stream::StreamExt;

#[tokio::test]
async fn end_to_end_one_provider_fails() {
    // A always succeeds, B always fails with "network error"
    let manager = AdManager::default();

    let a = Arc::new(MockAdSdk::succeeding(AdProvider::Google));
    let b = Arc::new(MockAdSdk::failing(AdProvider::InMobi, "network error"));
    manager.register_sdk(AdProvider::Google, a.clone());
    manager.register_sdk(AdProvider::InMobi, b.clone());

    let all_ready = manager.initialize(&test_context()).await;
    assert!(!all_ready, "one failure makes the aggregate false");

    let expected: StateMap = [
        (AdProvider::Google, AdState::Ready),
        (AdProvider::InMobi, AdState::Error("network error".to_string())),
    ]
    .into_iter()
    .collect();
    assert_eq!(manager.states(), expected);

    let google = manager.get_sdk(AdProvider::Google).unwrap();
    let events: Vec<_> = google.load_ad("unit-1").collect().await;
    assert_eq!(
        events,
        vec![AdResult::loading("unit-1"), AdResult::success("unit-1")]
    );
    assert!(google.is_ad_loaded("unit-1"));

    let inmobi = manager.get_sdk(AdProvider::InMobi).unwrap();
    let events: Vec<_> = inmobi.load_ad("10000033117").collect().await;
    assert_eq!(
        events,
        vec![AdResult::error("10000033117", "SDK not initialized")]
    );
    assert_eq!(b.views_created(), 0, "no vendor work on an uninitialized adapter");

    manager.cleanup();

    assert!(manager.states().is_empty());
    assert!(manager.get_sdk(AdProvider::Google).is_none());
    assert!(manager.get_sdk(AdProvider::InMobi).is_none());
    assert_eq!(a.adapter_destroy_count(), 1);
    assert_eq!(b.adapter_destroy_count(), 1);
    assert_eq!(a.surface_destroy_count(), 1, "cached surface released on cleanup");
    assert!(!a.is_initialized_flag());
}

#[tokio::test]
async fn panicking_adapter_is_contained() {
    let manager = AdManager::default();
    manager.register_sdk(
        AdProvider::Google,
        Arc::new(MockAdSdk::new(AdProvider::Google, InitOutcome::Panic, LoadOutcome::Fill)),
    );
    manager.register_sdk(AdProvider::InMobi, Arc::new(MockAdSdk::succeeding(AdProvider::InMobi)));

    let report = manager.initialize_report(&test_context()).await;

    assert!(!report.all_ready());
    assert!(matches!(manager.state(AdProvider::Google), Some(AdState::Error(_))));
    assert_eq!(manager.state(AdProvider::InMobi), Some(AdState::Ready));
}

#[tokio::test]
async fn hanging_adapter_times_out() {
    let manager = AdManager::new(ManagerConfig {
        init_timeout_secs: 1,
        ..ManagerConfig::default()
    });
    let hanging = Arc::new(MockAdSdk::new(AdProvider::InMobi, InitOutcome::Hang, LoadOutcome::Fill));
    manager.register_sdk(AdProvider::Google, Arc::new(MockAdSdk::succeeding(AdProvider::Google)));
    manager.register_sdk(AdProvider::InMobi, hanging.clone());

    let all_ready = tokio::time::timeout(
        tokio::time::Duration::from_secs(5),
        manager.initialize(&test_context()),
    )
    .await
    .expect("initialize returns despite a hanging vendor");

    assert!(!all_ready);
    assert_eq!(manager.state(AdProvider::Google), Some(AdState::Ready));
    assert_eq!(
        manager.state(AdProvider::InMobi),
        Some(AdState::Error("Initialization timed out after 1s".to_string()))
    );
    assert!(!hanging.is_initialized_flag());
}

#[tokio::test]
async fn optional_provider_failure_keeps_stack_usable() {
    let manager = AdManager::default();
    manager.register_sdk(AdProvider::Google, Arc::new(MockAdSdk::succeeding(AdProvider::Google)));
    manager.register_sdk_with_policy(
        AdProvider::InMobi,
        Arc::new(MockAdSdk::failing(AdProvider::InMobi, "network error")),
        ProviderPolicy::Optional,
    );

    let report = manager.initialize_report(&test_context()).await;

    assert!(!report.all_ready());
    assert!(report.is_usable());
    assert_eq!(
        report.failures(),
        vec![(AdProvider::InMobi, "network error".to_string())]
    );
}

#[tokio::test]
async fn required_provider_failure_makes_stack_unusable() {
    let manager = AdManager::default();
    manager.register_sdk_with_policy(
        AdProvider::Google,
        Arc::new(MockAdSdk::succeeding(AdProvider::Google)),
        ProviderPolicy::Optional,
    );
    manager.register_sdk(
        AdProvider::InMobi,
        Arc::new(MockAdSdk::failing(AdProvider::InMobi, "bad account id")),
    );

    let report = manager.initialize_report(&test_context()).await;

    assert!(!report.is_usable());
    assert_eq!(report.ready(), vec![AdProvider::Google]);
}

#[tokio::test]
async fn failed_provider_can_be_retried_explicitly() {
    let manager = AdManager::default();
    manager.register_sdk(
        AdProvider::InMobi,
        Arc::new(MockAdSdk::failing(AdProvider::InMobi, "network error")),
    );
    assert!(!manager.initialize(&test_context()).await);

    // No automatic retry: state stays Error until the caller acts
    tokio::task::yield_now().await;
    assert_eq!(
        manager.state(AdProvider::InMobi),
        Some(AdState::Error("network error".to_string()))
    );

    manager.register_sdk(AdProvider::InMobi, Arc::new(MockAdSdk::succeeding(AdProvider::InMobi)));
    assert!(manager.initialize(&test_context()).await);
    assert!(manager.is_sdk_initialized(AdProvider::InMobi));
}
