//! Contract Test: Readiness State Machine
//!
//! This test verifies the per-provider state machine observed through the
//! manager.
//!
//! Constraints verified:
//! - `Initializing` is published before the adapter finishes
//! - `is_sdk_initialized` is true iff the state is exactly `Ready`
//! - Re-initializing a ready adapter does not repeat the vendor bootstrap
//! - Sequential and concurrent initialization reach the same states
//!
//! If this test fails, observers can no longer trust the published states.

mod common;

use adkit_core::{AdManager, AdProvider, AdState, ManagerConfig};
use common::*;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{Duration, timeout};
use tokio_stream::StreamExt;

#[tokio::test]
async fn initializing_is_observable_before_ready() {
    let gate = Arc::new(Notify::new());
    let manager = Arc::new(AdManager::default());
    manager.register_sdk(
        AdProvider::Google,
        Arc::new(MockAdSdk::new(
            AdProvider::Google,
            InitOutcome::Gated(Arc::clone(&gate)),
            LoadOutcome::Fill,
        )),
    );

    let mut rx = manager.subscribe();
    let run = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.initialize(&test_context()).await })
    };

    timeout(
        Duration::from_secs(1),
        rx.wait_for(|states| states.get(&AdProvider::Google) == Some(&AdState::Initializing)),
    )
    .await
    .expect("Initializing is published")
    .expect("sender is alive");

    assert!(!manager.is_sdk_initialized(AdProvider::Google));

    gate.notify_one();

    let all_ready = timeout(Duration::from_secs(1), run)
        .await
        .expect("initialize completes once the gate opens")
        .expect("initialize task does not panic");

    assert!(all_ready);
    assert_eq!(manager.state(AdProvider::Google), Some(AdState::Ready));
    assert!(manager.is_sdk_initialized(AdProvider::Google));
}

#[tokio::test]
async fn is_sdk_initialized_matches_ready_only() {
    let manager = AdManager::default();
    manager.register_sdk(AdProvider::Google, Arc::new(MockAdSdk::succeeding(AdProvider::Google)));
    manager.register_sdk(
        AdProvider::InMobi,
        Arc::new(MockAdSdk::failing(AdProvider::InMobi, "network error")),
    );

    assert!(!manager.is_sdk_initialized(AdProvider::Google), "Idle is not initialized");

    manager.initialize(&test_context()).await;

    for (provider, state) in manager.states() {
        assert_eq!(manager.is_sdk_initialized(provider), state.is_ready());
    }
    assert!(manager.is_sdk_initialized(AdProvider::Google));
    assert!(!manager.is_sdk_initialized(AdProvider::InMobi));
}

#[tokio::test]
async fn repeated_initialize_does_not_rerun_vendor_bootstrap() {
    let manager = AdManager::default();
    let sdk = Arc::new(MockAdSdk::succeeding(AdProvider::InMobi));
    manager.register_sdk(AdProvider::InMobi, sdk.clone());

    assert!(manager.initialize(&test_context()).await);
    assert!(manager.initialize(&test_context()).await);

    assert_eq!(sdk.init_call_count(), 1);
    assert_eq!(manager.state(AdProvider::InMobi), Some(AdState::Ready));
}

#[tokio::test]
async fn shared_adapter_counts_across_clones() {
    let manager = AdManager::default();
    let original = MockAdSdk::succeeding(AdProvider::Google);
    let shared = MockAdSdk::sharing_counters_with(&original);
    manager.register_sdk(AdProvider::Google, Arc::new(shared));

    assert!(manager.initialize(&test_context()).await);

    assert_eq!(original.init_call_count(), 1);
    assert!(original.is_initialized_flag());
}

#[tokio::test]
async fn sequential_and_concurrent_runs_agree() {
    let sequential = AdManager::new(ManagerConfig {
        concurrent_init: false,
        ..ManagerConfig::default()
    });
    let concurrent = AdManager::default();

    for manager in [&sequential, &concurrent] {
        manager.register_sdk(AdProvider::Google, Arc::new(MockAdSdk::succeeding(AdProvider::Google)));
        manager.register_sdk(
            AdProvider::InMobi,
            Arc::new(MockAdSdk::failing(AdProvider::InMobi, "bad account id")),
        );
    }

    let a = sequential.initialize_report(&test_context()).await;
    let b = concurrent.initialize_report(&test_context()).await;

    assert_eq!(a.states(), b.states());
    assert_eq!(sequential.states(), concurrent.states());
}

#[tokio::test]
async fn state_stream_starts_with_current_snapshot() {
    let manager = AdManager::default();
    manager.register_sdk(AdProvider::Google, Arc::new(MockAdSdk::succeeding(AdProvider::Google)));
    manager.initialize(&test_context()).await;

    let mut stream = manager.state_stream();
    let first = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("current snapshot is yielded immediately")
        .expect("stream is open");

    assert_eq!(first.get(&AdProvider::Google), Some(&AdState::Ready));
}

#[tokio::test]
async fn cleanup_publishes_empty_map() {
    let manager = AdManager::default();
    manager.register_sdk(AdProvider::Google, Arc::new(MockAdSdk::succeeding(AdProvider::Google)));
    manager.initialize(&test_context()).await;

    let mut rx = manager.subscribe();
    rx.borrow_and_update();

    manager.cleanup();

    assert!(rx.has_changed().expect("sender is alive"));
    assert!(rx.borrow_and_update().is_empty());
    assert!(!manager.is_sdk_initialized(AdProvider::Google));
}
