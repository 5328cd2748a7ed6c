//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal adapters and surfaces that exercise the
//! contract without any vendor behind them.

#![allow(dead_code)]

use adkit_core::traits::{AdContext, AdSdk, AdSize, AdSurface, ViewHandle};
use adkit_core::{AdProvider, Error, LoadSender, LoadStream, Result, ViewCache};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Surface that counts how often it was destroyed
pub struct MockSurface {
    provider: AdProvider,
    placement_id: String,
    destroyed: AtomicBool,
    destroy_calls: Arc<AtomicUsize>,
}

impl AdSurface for MockSurface {
    fn provider(&self) -> AdProvider {
        self.provider
    }

    fn placement_id(&self) -> &str {
        &self.placement_id
    }

    fn size(&self) -> AdSize {
        AdSize::BANNER
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// How the mock vendor answers a bootstrap
#[derive(Debug, Clone)]
pub enum InitOutcome {
    Succeed,
    Fail(&'static str),
    Panic,
    Hang,
    /// Succeed once the test releases the gate
    Gated(Arc<tokio::sync::Notify>),
}

/// How the mock vendor answers a load request
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Fill,
    NoFill(&'static str),
    /// Keep the request pending until the test fires it via `pending_loads`
    Hold,
}

struct Counters {
    init_calls: AtomicUsize,
    views_created: AtomicUsize,
    destroy_calls: Arc<AtomicUsize>,
    adapter_destroyed: AtomicUsize,
}

/// A mock adapter that tracks calls
pub struct MockAdSdk {
    provider: AdProvider,
    name: &'static str,
    init: InitOutcome,
    load: LoadOutcome,
    initialized: Arc<AtomicBool>,
    views: Arc<ViewCache<MockSurface>>,
    counters: Arc<Counters>,
    pending: Arc<Mutex<Vec<LoadSender>>>,
}

impl MockAdSdk {
    pub fn new(provider: AdProvider, init: InitOutcome, load: LoadOutcome) -> Self {
        Self {
            provider,
            name: "mock",
            init,
            load,
            initialized: Arc::new(AtomicBool::new(false)),
            views: Arc::new(ViewCache::new()),
            counters: Arc::new(Counters {
                init_calls: AtomicUsize::new(0),
                views_created: AtomicUsize::new(0),
                destroy_calls: Arc::new(AtomicUsize::new(0)),
                adapter_destroyed: AtomicUsize::new(0),
            }),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adapter whose vendor always initializes and always fills
    pub fn succeeding(provider: AdProvider) -> Self {
        Self::new(provider, InitOutcome::Succeed, LoadOutcome::Fill)
    }

    /// Adapter whose vendor always fails to initialize
    pub fn failing(provider: AdProvider, reason: &'static str) -> Self {
        Self::new(provider, InitOutcome::Fail(reason), LoadOutcome::Fill)
    }

    /// Create a new MockAdSdk that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            provider: other.provider,
            name: other.name,
            init: other.init.clone(),
            load: other.load.clone(),
            initialized: Arc::clone(&other.initialized),
            views: Arc::clone(&other.views),
            counters: Arc::clone(&other.counters),
            pending: Arc::clone(&other.pending),
        }
    }

    /// Number of times the vendor bootstrap actually ran
    pub fn init_call_count(&self) -> usize {
        self.counters.init_calls.load(Ordering::SeqCst)
    }

    /// Number of surfaces constructed
    pub fn views_created(&self) -> usize {
        self.counters.views_created.load(Ordering::SeqCst)
    }

    /// Number of surfaces destroyed
    pub fn surface_destroy_count(&self) -> usize {
        self.counters.destroy_calls.load(Ordering::SeqCst)
    }

    /// Number of times destroy() was called on the adapter
    pub fn adapter_destroy_count(&self) -> usize {
        self.counters.adapter_destroyed.load(Ordering::SeqCst)
    }

    /// Adapter-side initialized flag, readable without the trait in scope
    pub fn is_initialized_flag(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Number of surfaces currently cached
    pub fn cached_views(&self) -> usize {
        self.views.len()
    }

    /// Senders of loads parked by `LoadOutcome::Hold`
    pub fn pending_loads(&self) -> Vec<LoadSender> {
        self.pending.lock().unwrap().clone()
    }

    /// Answer every parked load with a fill, the way a vendor answers
    /// whichever listener is attached; returns how many loads took it
    pub fn fill_pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|sender| {
                if sender.is_closed() {
                    return false;
                }
                self.views.mark_loaded(sender.placement_id());
                sender.success()
            })
            .count()
    }

    fn build_surface(&self, placement_id: &str) -> Arc<MockSurface> {
        self.counters.views_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockSurface {
            provider: self.provider,
            placement_id: placement_id.to_string(),
            destroyed: AtomicBool::new(false),
            destroy_calls: Arc::clone(&self.counters.destroy_calls),
        })
    }
}

#[async_trait::async_trait]
impl AdSdk for MockAdSdk {
    fn name(&self) -> &'static str {
        self.name
    }

    fn provider(&self) -> AdProvider {
        self.provider
    }

    async fn initialize(&self, _ctx: &AdContext) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.counters.init_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        match &self.init {
            InitOutcome::Succeed => {
                self.initialized.store(true, Ordering::SeqCst);
                Ok(())
            }
            InitOutcome::Fail(reason) => Err(Error::initialization(*reason)),
            InitOutcome::Panic => panic!("vendor bootstrap exploded"),
            InitOutcome::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            InitOutcome::Gated(gate) => {
                gate.notified().await;
                self.initialized.store(true, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn load_ad(&self, placement_id: &str) -> LoadStream {
        if !self.is_initialized() {
            return LoadStream::immediate(adkit_core::AdResult::error(
                placement_id,
                adkit_core::error::NOT_INITIALIZED,
            ));
        }

        let (sender, stream) = self.views.start_load(placement_id);

        if let Err(e) = self.get_or_create_ad_view(placement_id) {
            sender.loading();
            sender.error(e.reason());
            return stream;
        }

        sender.loading();

        match self.load.clone() {
            LoadOutcome::Fill => {
                let views = Arc::clone(&self.views);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    if !sender.is_closed() {
                        views.mark_loaded(sender.placement_id());
                        sender.success();
                    }
                });
            }
            LoadOutcome::NoFill(message) => {
                let views = Arc::clone(&self.views);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    if !sender.is_closed() {
                        views.mark_failed(sender.placement_id());
                        sender.error(message);
                    }
                });
            }
            LoadOutcome::Hold => self.pending.lock().unwrap().push(sender),
        }

        stream
    }

    fn get_or_create_ad_view(&self, placement_id: &str) -> Result<ViewHandle> {
        let view = self
            .views
            .get_or_create(placement_id, || Ok(self.build_surface(placement_id)))?;
        let handle: ViewHandle = view;
        Ok(handle)
    }

    fn create_ad_view(&self, _ctx: &AdContext, placement_id: &str) -> Result<ViewHandle> {
        let handle: ViewHandle = self.build_surface(placement_id);
        Ok(handle)
    }

    fn is_ad_loaded(&self, placement_id: &str) -> bool {
        self.views.is_loaded(placement_id)
    }

    fn cleanup(&self, placement_id: &str) {
        self.views.release(placement_id);
    }

    fn destroy(&self) {
        self.counters.adapter_destroyed.fetch_add(1, Ordering::SeqCst);
        self.views.release_all();
        self.initialized.store(false, Ordering::SeqCst);
    }
}

/// Context used by every contract test
pub fn test_context() -> AdContext {
    AdContext::new("com.mobileaddemo").with_test_mode(true)
}
