//! Simulated Mobile Ads backend
//!
//! Implements the vendor surface in software so the adapter can run without
//! the native SDK. Callbacks are delivered from spawned tokio tasks after the
//! configured latency, the way the real SDK calls back from its own threads.
//!
//! Methods that deliver callbacks must be called from within a Tokio runtime.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use adkit_core::{AdContext, AdSize};
use tracing::debug;

use crate::vendor::{
    AdListener, AdRequest, AdView, AdapterState, AdapterStatus, InitCallback,
    InitializationStatus, LoadAdError, MobileAds, MobileAdsError, RequestConfiguration,
};

/// How the simulated SDK answers `initialize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimInit {
    /// Fire the completion callback after the latency
    Complete,
    /// Throw synchronously with this message
    Throw(String),
    /// Accept the call and drop the callback without firing it
    Drop,
    /// Accept the call and never answer
    Hang,
}

/// How simulated banners answer `load_ad`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimFill {
    Fill,
    NoFill,
    Fail(LoadAdError),
    /// Accept the request and never answer
    Hold,
}

/// Behaviour of a [`SimMobileAds`]
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub init: SimInit,
    pub fill: SimFill,
    pub latency: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            init: SimInit::Complete,
            fill: SimFill::Fill,
            latency: Duration::from_millis(50),
        }
    }
}

impl SimConfig {
    /// Instant callbacks, always filling
    pub fn instant() -> Self {
        Self {
            latency: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_init(mut self, init: SimInit) -> Self {
        self.init = init;
        self
    }

    pub fn with_fill(mut self, fill: SimFill) -> Self {
        self.fill = fill;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    init_calls: AtomicUsize,
    views_created: AtomicUsize,
    loads: AtomicUsize,
    views_destroyed: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Software stand-in for the Mobile Ads SDK
pub struct SimMobileAds {
    config: SimConfig,
    counters: Arc<Counters>,
    last_context: Mutex<Option<AdContext>>,
    request_configuration: Mutex<RequestConfiguration>,
}

impl SimMobileAds {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            counters: Arc::new(Counters::default()),
            last_context: Mutex::new(None),
            request_configuration: Mutex::new(RequestConfiguration::default()),
        }
    }

    /// Number of `initialize` calls received
    pub fn init_calls(&self) -> usize {
        self.counters.init_calls.load(Ordering::SeqCst)
    }

    /// Number of banner views constructed
    pub fn views_created(&self) -> usize {
        self.counters.views_created.load(Ordering::SeqCst)
    }

    /// Number of `load_ad` calls across all views
    pub fn loads(&self) -> usize {
        self.counters.loads.load(Ordering::SeqCst)
    }

    /// Number of views destroyed
    pub fn views_destroyed(&self) -> usize {
        self.counters.views_destroyed.load(Ordering::SeqCst)
    }

    /// Context passed to the most recent `initialize`
    pub fn last_context(&self) -> Option<AdContext> {
        lock(&self.last_context).clone()
    }

    /// Configuration most recently applied
    pub fn request_configuration(&self) -> RequestConfiguration {
        lock(&self.request_configuration).clone()
    }

    fn status(&self) -> InitializationStatus {
        let mut adapter_statuses = BTreeMap::new();
        adapter_statuses.insert(
            "com.google.android.gms.ads.MobileAds".to_string(),
            AdapterStatus {
                state: AdapterState::Ready,
                description: String::new(),
                latency: self.config.latency,
            },
        );
        InitializationStatus { adapter_statuses }
    }
}

impl Default for SimMobileAds {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl MobileAds for SimMobileAds {
    fn initialize(&self, ctx: &AdContext, on_complete: InitCallback) -> Result<(), MobileAdsError> {
        self.counters.init_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_context) = Some(ctx.clone());

        match &self.config.init {
            SimInit::Complete => {
                let status = self.status();
                let latency = self.config.latency;
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    on_complete(status);
                });
                Ok(())
            }
            SimInit::Throw(message) => Err(MobileAdsError::new(
                LoadAdError::ERROR_CODE_INTERNAL_ERROR,
                message.clone(),
            )),
            SimInit::Drop => {
                drop(on_complete);
                Ok(())
            }
            SimInit::Hang => {
                tokio::spawn(async move {
                    std::future::pending::<()>().await;
                    on_complete(InitializationStatus::default());
                });
                Ok(())
            }
        }
    }

    fn set_request_configuration(&self, config: RequestConfiguration) {
        *lock(&self.request_configuration) = config;
    }

    fn create_ad_view(&self, _ctx: &AdContext) -> Result<Arc<dyn AdView>, MobileAdsError> {
        self.counters.views_created.fetch_add(1, Ordering::SeqCst);
        let view: Arc<dyn AdView> = Arc::new(SimAdView {
            fill: self.config.fill.clone(),
            latency: self.config.latency,
            counters: Arc::clone(&self.counters),
            size: Mutex::new(None),
            ad_unit_id: Mutex::new(None),
            hardware_acceleration: AtomicBool::new(false),
            listener: Arc::new(Mutex::new(None)),
            destroyed: Arc::new(AtomicBool::new(false)),
        });
        Ok(view)
    }
}

/// Listener currently attached to a view
type ListenerSlot = Arc<Mutex<Option<Arc<dyn AdListener>>>>;

/// Simulated banner view
///
/// Like the native view, an answer goes to whichever listener is attached
/// when it arrives, not the one attached when the request was made.
pub struct SimAdView {
    fill: SimFill,
    latency: Duration,
    counters: Arc<Counters>,
    size: Mutex<Option<AdSize>>,
    ad_unit_id: Mutex<Option<String>>,
    hardware_acceleration: AtomicBool,
    listener: ListenerSlot,
    destroyed: Arc<AtomicBool>,
}

impl SimAdView {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl AdView for SimAdView {
    fn set_ad_size(&self, size: AdSize) {
        *lock(&self.size) = Some(size);
    }

    fn ad_size(&self) -> Option<AdSize> {
        *lock(&self.size)
    }

    fn set_ad_unit_id(&self, ad_unit_id: &str) {
        *lock(&self.ad_unit_id) = Some(ad_unit_id.to_string());
    }

    fn ad_unit_id(&self) -> Option<String> {
        lock(&self.ad_unit_id).clone()
    }

    fn set_hardware_acceleration(&self, enabled: bool) {
        self.hardware_acceleration.store(enabled, Ordering::SeqCst);
    }

    fn hardware_acceleration(&self) -> bool {
        self.hardware_acceleration.load(Ordering::SeqCst)
    }

    fn set_ad_listener(&self, listener: Option<Arc<dyn AdListener>>) {
        *lock(&self.listener) = listener;
    }

    fn load_ad(&self, request: AdRequest) {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);

        if self.is_destroyed() {
            debug!("Ignoring load on destroyed view");
            return;
        }

        debug!("Simulated request with {} keyword(s)", request.keywords().len());

        let fill = self.fill.clone();
        let latency = self.latency;
        let slot = Arc::clone(&self.listener);
        let destroyed = Arc::clone(&self.destroyed);
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if destroyed.load(Ordering::SeqCst) {
                return;
            }

            let Some(listener) = lock(&slot).clone() else {
                debug!("No listener attached, outcome is unobserved");
                return;
            };

            match fill {
                SimFill::Fill => {
                    listener.on_ad_loaded();
                    listener.on_ad_impression();
                }
                SimFill::NoFill => listener.on_ad_failed_to_load(LoadAdError::no_fill()),
                SimFill::Fail(error) => listener.on_ad_failed_to_load(error),
                SimFill::Hold => {}
            }
        });
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            lock(&self.listener).take();
            self.counters.views_destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
