// # InMobi Provider
//
// Adapter that puts the InMobi SDK behind the `AdSdk` contract.
//
// ## Vendor API Shape
//
// - Bootstrap: `InMobiSdk::init(ctx, account_id, consent, listener)`; the
//   listener is told once whether initialization succeeded
// - Banners: created per numeric placement id, animation off, no auto refresh
// - Load outcome: `BannerAdEventListener` callbacks on the banner
//
// ## Placement Ids
//
// InMobi addresses placements by `i64`. Ids that do not parse are rejected
// with `Error::InvalidPlacement` before the vendor is touched.

pub mod sim;
pub mod vendor;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use adkit_core::config::{ProviderConfig, ProviderPolicy};
use adkit_core::error::NOT_INITIALIZED;
use adkit_core::traits::{AdContext, AdSdk, AdSize, AdSurface, ViewHandle};
use adkit_core::{AdManager, AdProvider, AdResult, Error, LoadSender, LoadStream, Result, ViewCache};
use async_trait::async_trait;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

use crate::vendor::{
    AdMetaInfo, AnimationType, BannerAdEventListener, GdprConsent, InMobiAdRequestStatus,
    InMobiBanner, InMobiSdk, InMobiSdkError, LogLevel, SdkInitializationListener,
};

/// Network name reported by the adapter
pub const NAME: &str = "InMobi";

/// Parse a placement id the way the vendor addresses it
///
/// The id is also the cache key, so surrounding whitespace is rejected
/// rather than trimmed: `" 42"` and `"42"` must not map to two banners.
pub fn parse_placement_id(placement_id: &str) -> Result<i64> {
    placement_id.parse::<i64>().map_err(|_| {
        Error::invalid_placement(format!(
            "InMobi placement id must be numeric, got {:?}",
            placement_id
        ))
    })
}

/// Cached banner for one placement
pub struct BannerSurface {
    placement_id: String,
    banner: Arc<dyn InMobiBanner>,
    destroyed: AtomicBool,
}

impl BannerSurface {
    /// Underlying vendor banner
    pub fn banner(&self) -> &Arc<dyn InMobiBanner> {
        &self.banner
    }
}

impl AdSurface for BannerSurface {
    fn provider(&self) -> AdProvider {
        AdProvider::InMobi
    }

    fn placement_id(&self) -> &str {
        &self.placement_id
    }

    fn size(&self) -> AdSize {
        AdSize::BANNER
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.banner.destroy();
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Hands the vendor's init verdict to the waiting `initialize`
struct InitListener {
    tx: std::sync::Mutex<Option<oneshot::Sender<Option<InMobiSdkError>>>>,
}

impl SdkInitializationListener for InitListener {
    fn on_initialization_complete(&self, error: Option<InMobiSdkError>) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        match tx {
            Some(tx) => {
                let _ = tx.send(error);
            }
            None => warn!("{} reported initialization more than once", NAME),
        }
    }
}

/// Bridges one load's banner events into its `LoadStream`
struct BannerListener {
    sender: LoadSender,
    views: Weak<ViewCache<BannerSurface>>,
}

impl BannerAdEventListener for BannerListener {
    fn on_ad_load_succeeded(&self, info: AdMetaInfo) {
        if self.sender.is_closed() {
            debug!("Late load callback for {}, ignoring", self.sender.placement_id());
            return;
        }

        if let Some(views) = self.views.upgrade() {
            views.mark_loaded(self.sender.placement_id());
        }
        info!(
            "InMobi ad loaded for {} (creative {})",
            self.sender.placement_id(),
            info.creative_id
        );
        self.sender.success();
    }

    fn on_ad_load_failed(&self, status: InMobiAdRequestStatus) {
        if self.sender.is_closed() {
            debug!("Late failure callback for {}, ignoring", self.sender.placement_id());
            return;
        }

        if let Some(views) = self.views.upgrade() {
            views.mark_failed(self.sender.placement_id());
        }
        warn!(
            "InMobi ad failed to load for {}: {}",
            self.sender.placement_id(),
            status.status_code
        );
        self.sender.error(status.reason());
    }

    fn on_ad_clicked(&self, params: HashMap<String, String>) {
        debug!("InMobi ad clicked for {} ({} param(s))", self.sender.placement_id(), params.len());
    }

    fn on_ad_displayed(&self) {
        debug!("InMobi ad displayed for {}", self.sender.placement_id());
    }

    fn on_ad_dismissed(&self) {
        debug!("InMobi ad dismissed for {}", self.sender.placement_id());
    }

    fn on_ad_impression(&self) {
        debug!("InMobi ad impression for {}", self.sender.placement_id());
    }
}

/// InMobi adapter
pub struct InMobiAdSdk {
    vendor: Arc<dyn InMobiSdk>,
    /// Application context used for banners created on demand
    context: AdContext,
    account_id: String,
    consent: GdprConsent,
    log_level: LogLevel,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    views: Arc<ViewCache<BannerSurface>>,
}

impl InMobiAdSdk {
    /// Create an adapter for an InMobi account
    pub fn new(vendor: Arc<dyn InMobiSdk>, context: AdContext, account_id: impl Into<String>) -> Self {
        Self {
            vendor,
            context,
            account_id: account_id.into(),
            consent: GdprConsent::default(),
            log_level: LogLevel::Debug,
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            views: Arc::new(ViewCache::new()),
        }
    }

    /// Create an adapter from a `ProviderConfig::InMobi` entry
    pub fn from_config(
        config: &ProviderConfig,
        vendor: Arc<dyn InMobiSdk>,
        context: AdContext,
    ) -> Result<Self> {
        match config {
            ProviderConfig::InMobi {
                account_id,
                gdpr_applies,
                consent_available,
                iab_consent,
                ..
            } => {
                config.validate()?;
                Ok(Self::new(vendor, context, account_id.clone()).with_consent(GdprConsent::new(
                    *gdpr_applies,
                    *consent_available,
                    iab_consent.clone(),
                )))
            }
            _ => Err(Error::config("Invalid config type for InMobi provider")),
        }
    }

    /// GDPR consent sent with the bootstrap
    pub fn with_consent(mut self, consent: GdprConsent) -> Self {
        self.consent = consent;
        self
    }

    /// SDK log level applied after the bootstrap call
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Cached banner for a placement, with access to the vendor banner
    pub fn banner(&self, placement_id: &str) -> Option<Arc<BannerSurface>> {
        self.views.get(placement_id)
    }

    fn create_surface(&self, ctx: &AdContext, placement_id: &str) -> Result<Arc<BannerSurface>> {
        let numeric_id = parse_placement_id(placement_id)?;

        let banner = self
            .vendor
            .create_banner(ctx, numeric_id)
            .map_err(|e| Error::vendor(NAME, e.message))?;

        banner.set_animation_type(AnimationType::AnimationOff);
        banner.set_enable_auto_refresh(false);

        Ok(Arc::new(BannerSurface {
            placement_id: placement_id.to_string(),
            banner,
            destroyed: AtomicBool::new(false),
        }))
    }

    fn cached_surface(&self, placement_id: &str) -> Result<Arc<BannerSurface>> {
        self.views
            .get_or_create(placement_id, || self.create_surface(&self.context, placement_id))
    }
}

#[async_trait]
impl AdSdk for InMobiAdSdk {
    fn name(&self) -> &'static str {
        NAME
    }

    fn provider(&self) -> AdProvider {
        AdProvider::InMobi
    }

    async fn initialize(&self, ctx: &AdContext) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        info!(
            "Initializing {} (GDPR applies: {})",
            NAME,
            self.consent.applies()
        );

        let consent = self.consent.to_json()?;
        let (tx, rx) = oneshot::channel();
        let listener = Arc::new(InitListener {
            tx: std::sync::Mutex::new(Some(tx)),
        });

        self.vendor
            .init(ctx, &self.account_id, consent, listener)
            .map_err(|e| {
                error!("Error initializing {}: {}", NAME, e);
                Error::initialization(e.message)
            })?;
        self.vendor.set_log_level(self.log_level);

        match rx.await {
            Ok(None) => {
                self.initialized.store(true, Ordering::SeqCst);
                info!("{} SDK initialized successfully", NAME);
                Ok(())
            }
            Ok(Some(e)) => {
                error!("{} SDK initialization failed: {}", NAME, e);
                Err(Error::initialization(e.message))
            }
            Err(_) => {
                error!("{} dropped its initialization listener", NAME);
                Err(Error::initialization("Initialization callback was never invoked"))
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn load_ad(&self, placement_id: &str) -> LoadStream {
        if !self.is_initialized() {
            warn!("Load for {} before {} initialized", placement_id, NAME);
            return LoadStream::immediate(AdResult::error(placement_id, NOT_INITIALIZED));
        }

        let (sender, stream) = self.views.start_load(placement_id);

        let surface = match self.cached_surface(placement_id) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("Cannot create banner for {}: {}", placement_id, e);
                sender.loading();
                sender.error(e.reason());
                return stream;
            }
        };

        sender.loading();

        surface.banner().set_listener(Some(Arc::new(BannerListener {
            sender,
            views: Arc::downgrade(&self.views),
        })));
        debug!("Requesting InMobi ad for {}", placement_id);
        surface.banner().load();

        stream
    }

    fn get_or_create_ad_view(&self, placement_id: &str) -> Result<ViewHandle> {
        let surface: ViewHandle = self.cached_surface(placement_id)?;
        Ok(surface)
    }

    fn create_ad_view(&self, ctx: &AdContext, placement_id: &str) -> Result<ViewHandle> {
        let surface: ViewHandle = self.create_surface(ctx, placement_id)?;
        Ok(surface)
    }

    fn is_ad_loaded(&self, placement_id: &str) -> bool {
        self.views.is_loaded(placement_id)
    }

    fn cleanup(&self, placement_id: &str) {
        if self.views.release(placement_id) {
            debug!("Cleaned up InMobi banner for {}", placement_id);
        }
    }

    fn destroy(&self) {
        let released = self.views.release_all();
        self.initialized.store(false, Ordering::SeqCst);
        info!("{} destroyed ({} banner(s) released)", NAME, released);
    }
}

/// Register an InMobi adapter with a manager
pub fn register(manager: &AdManager, sdk: InMobiAdSdk, policy: ProviderPolicy) -> Arc<InMobiAdSdk> {
    let sdk = Arc::new(sdk);
    manager.register_sdk_with_policy(AdProvider::InMobi, sdk.clone(), policy);
    sdk
}
