//! Simulated InMobi backend
//!
//! Software implementation of the vendor surface. Listener callbacks are
//! delivered from spawned tokio tasks after the configured latency, so the
//! methods that trigger them must run inside a Tokio runtime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use adkit_core::AdContext;
use tracing::debug;

use crate::vendor::{
    AdMetaInfo, AnimationType, BannerAdEventListener, InMobiAdRequestStatus, InMobiBanner,
    InMobiSdk, InMobiSdkError, LogLevel, SdkInitializationListener, StatusCode,
};

/// How the simulated SDK answers `init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimInit {
    /// Report success after the latency
    Complete,
    /// Report this failure to the listener after the latency
    Fail(String),
    /// Throw synchronously with this message
    Throw(String),
    /// Accept the call and never notify the listener
    Hang,
}

/// How simulated banners answer `load`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimFill {
    Fill,
    Fail(InMobiAdRequestStatus),
    /// Accept the request and never answer
    Hold,
}

/// Behaviour of a [`SimInMobiSdk`]
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
            latency: Duration::from_millis(80),
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
    banners_created: AtomicUsize,
    loads: AtomicUsize,
    banners_destroyed: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Software stand-in for the InMobi SDK
pub struct SimInMobiSdk {
    config: SimConfig,
    counters: Arc<Counters>,
    last_consent: Mutex<Option<serde_json::Value>>,
    log_level: Mutex<LogLevel>,
}

impl SimInMobiSdk {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            counters: Arc::new(Counters::default()),
            last_consent: Mutex::new(None),
            log_level: Mutex::new(LogLevel::default()),
        }
    }

    /// Number of `init` calls received
    pub fn init_calls(&self) -> usize {
        self.counters.init_calls.load(Ordering::SeqCst)
    }

    /// Number of banners constructed
    pub fn banners_created(&self) -> usize {
        self.counters.banners_created.load(Ordering::SeqCst)
    }

    /// Number of `load` calls across all banners
    pub fn loads(&self) -> usize {
        self.counters.loads.load(Ordering::SeqCst)
    }

    /// Number of banners destroyed
    pub fn banners_destroyed(&self) -> usize {
        self.counters.banners_destroyed.load(Ordering::SeqCst)
    }

    /// Consent object passed to the most recent `init`
    pub fn last_consent(&self) -> Option<serde_json::Value> {
        lock(&self.last_consent).clone()
    }

    pub fn log_level(&self) -> LogLevel {
        *lock(&self.log_level)
    }
}

impl Default for SimInMobiSdk {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}

impl InMobiSdk for SimInMobiSdk {
    fn init(
        &self,
        _ctx: &AdContext,
        account_id: &str,
        consent: serde_json::Value,
        listener: Arc<dyn SdkInitializationListener>,
    ) -> Result<(), InMobiSdkError> {
        self.counters.init_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_consent) = Some(consent);

        let outcome = match &self.config.init {
            SimInit::Throw(message) => return Err(InMobiSdkError::new(message.clone())),
            SimInit::Hang => return Ok(()),
            _ if account_id.trim().is_empty() => Some(InMobiSdkError::new("Invalid account id")),
            SimInit::Complete => None,
            SimInit::Fail(message) => Some(InMobiSdkError::new(message.clone())),
        };

        let latency = self.config.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            listener.on_initialization_complete(outcome);
        });
        Ok(())
    }

    fn set_log_level(&self, level: LogLevel) {
        *lock(&self.log_level) = level;
    }

    fn create_banner(&self, _ctx: &AdContext, placement_id: i64) -> Result<Arc<dyn InMobiBanner>, InMobiSdkError> {
        if placement_id <= 0 {
            return Err(InMobiSdkError::new(format!("Invalid placement id {}", placement_id)));
        }

        self.counters.banners_created.fetch_add(1, Ordering::SeqCst);
        let banner: Arc<dyn InMobiBanner> = Arc::new(SimBanner {
            placement_id,
            fill: self.config.fill.clone(),
            latency: self.config.latency,
            counters: Arc::clone(&self.counters),
            animation: Mutex::new(AnimationType::default()),
            auto_refresh: AtomicBool::new(true),
            listener: Arc::new(Mutex::new(None)),
            destroyed: Arc::new(AtomicBool::new(false)),
        });
        Ok(banner)
    }
}

/// Listener currently attached to a banner
type ListenerSlot = Arc<Mutex<Option<Arc<dyn BannerAdEventListener>>>>;

/// Simulated banner
///
/// An answer goes to whichever listener is attached when it arrives.
pub struct SimBanner {
    placement_id: i64,
    fill: SimFill,
    latency: Duration,
    counters: Arc<Counters>,
    animation: Mutex<AnimationType>,
    auto_refresh: AtomicBool,
    listener: ListenerSlot,
    destroyed: Arc<AtomicBool>,
}

impl InMobiBanner for SimBanner {
    fn placement_id(&self) -> i64 {
        self.placement_id
    }

    fn set_animation_type(&self, animation: AnimationType) {
        *lock(&self.animation) = animation;
    }

    fn animation_type(&self) -> AnimationType {
        *lock(&self.animation)
    }

    fn set_enable_auto_refresh(&self, enabled: bool) {
        self.auto_refresh.store(enabled, Ordering::SeqCst);
    }

    fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh.load(Ordering::SeqCst)
    }

    fn set_listener(&self, listener: Option<Arc<dyn BannerAdEventListener>>) {
        *lock(&self.listener) = listener;
    }

    fn load(&self) {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);

        if self.destroyed.load(Ordering::SeqCst) {
            debug!("Ignoring load on destroyed banner {}", self.placement_id);
            return;
        }

        let placement_id = self.placement_id;
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
                debug!("No listener on banner {}, outcome is unobserved", placement_id);
                return;
            };

            match fill {
                SimFill::Fill => {
                    listener.on_ad_load_succeeded(AdMetaInfo {
                        creative_id: format!("sim-{}", placement_id),
                        bid: 0.0,
                        bid_info: serde_json::json!({ "placementId": placement_id }),
                    });
                    listener.on_ad_displayed();
                    listener.on_ad_impression();
                }
                SimFill::Fail(status) => listener.on_ad_load_failed(status),
                SimFill::Hold => {}
            }
        });
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            lock(&self.listener).take();
            self.counters.banners_destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// No-fill status as the SDK reports it
pub fn no_fill() -> InMobiAdRequestStatus {
    InMobiAdRequestStatus::new(StatusCode::NoFill, Some("Ad request did not fill".to_string()))
}
