// # Google Mobile Ads Provider
//
// Adapter that puts the Google Mobile Ads SDK behind the `AdSdk` contract.
//
// ## Vendor API Shape
//
// - Bootstrap: `MobileAds::initialize(ctx, on_complete)`, callback fires once
// - Banners: `AdView` configured with size, ad unit id and hardware layer
// - Load outcome: `AdListener` callbacks on the view
//
// ## What the adapter owns
//
// - Its view cache and loaded-set
// - A view-key registry so a host view can find the surface for its ad unit
// - Translating listener callbacks into `AdResult` events
//
// Readiness state, retries and scheduling belong to `AdManager`.

pub mod sim;
pub mod vendor;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use adkit_core::config::{ProviderConfig, ProviderPolicy};
use adkit_core::error::NOT_INITIALIZED;
use adkit_core::traits::{AdContext, AdSdk, AdSize, AdSurface, ViewHandle};
use adkit_core::{AdManager, AdProvider, AdResult, Error, LoadSender, LoadStream, Result, ViewCache};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

use crate::vendor::{AdListener, AdRequest, AdView, LoadAdError, MobileAds, RequestConfiguration};

/// Network name reported by the adapter
pub const NAME: &str = "Google Ads";

/// Metadata key carrying the AdMob application id into the vendor bootstrap
pub const APPLICATION_ID_KEY: &str = "com.google.android.gms.ads.APPLICATION_ID";

/// Cached banner for one ad unit
pub struct GoogleBanner {
    ad_unit_id: String,
    view: Arc<dyn AdView>,
    destroyed: AtomicBool,
}

impl GoogleBanner {
    fn new(ad_unit_id: &str, view: Arc<dyn AdView>) -> Self {
        Self {
            ad_unit_id: ad_unit_id.to_string(),
            view,
            destroyed: AtomicBool::new(false),
        }
    }

    /// Underlying vendor view
    pub fn view(&self) -> &Arc<dyn AdView> {
        &self.view
    }
}

impl AdSurface for GoogleBanner {
    fn provider(&self) -> AdProvider {
        AdProvider::Google
    }

    fn placement_id(&self) -> &str {
        &self.ad_unit_id
    }

    fn size(&self) -> AdSize {
        self.view.ad_size().unwrap_or(AdSize::BANNER)
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.view.destroy();
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Bridges one load's listener callbacks into its `LoadStream`
struct BannerListener {
    sender: LoadSender,
    views: Weak<ViewCache<GoogleBanner>>,
}

impl AdListener for BannerListener {
    fn on_ad_loaded(&self) {
        if self.sender.is_closed() {
            debug!("Late load callback for {}, ignoring", self.sender.placement_id());
            return;
        }

        if let Some(views) = self.views.upgrade() {
            views.mark_loaded(self.sender.placement_id());
        }
        info!("Google ad loaded for {}", self.sender.placement_id());
        self.sender.success();
    }

    fn on_ad_failed_to_load(&self, error: LoadAdError) {
        if self.sender.is_closed() {
            debug!("Late failure callback for {}, ignoring", self.sender.placement_id());
            return;
        }

        if let Some(views) = self.views.upgrade() {
            views.mark_failed(self.sender.placement_id());
        }
        warn!(
            "Google ad failed to load for {}: {}",
            self.sender.placement_id(),
            error.to_json()
        );
        self.sender.error(error.message);
    }

    fn on_ad_opened(&self) {
        debug!("Google ad opened for {}", self.sender.placement_id());
    }

    fn on_ad_closed(&self) {
        debug!("Google ad closed for {}", self.sender.placement_id());
    }

    fn on_ad_clicked(&self) {
        debug!("Google ad clicked for {}", self.sender.placement_id());
    }

    fn on_ad_impression(&self) {
        debug!("Google ad impression for {}", self.sender.placement_id());
    }
}

/// Google Mobile Ads adapter
///
/// # Thread Safety
///
/// The initialized flag is atomic; the bootstrap itself runs under an async
/// mutex so concurrent `initialize` calls start the vendor SDK once.
pub struct GoogleAdSdk {
    vendor: Arc<dyn MobileAds>,
    /// Application context used for views created on demand
    context: AdContext,
    app_id: Option<String>,
    test_device_ids: Vec<String>,
    request: AdRequest,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
    views: Arc<ViewCache<GoogleBanner>>,
    /// view key -> ad unit id
    view_keys: DashMap<String, String>,
}

impl GoogleAdSdk {
    /// Create an adapter over a vendor SDK
    ///
    /// `context` is the application context used when a view has to be
    /// created on demand (from `load_ad` or `get_or_create_ad_view`).
    pub fn new(vendor: Arc<dyn MobileAds>, context: AdContext) -> Self {
        Self {
            vendor,
            context,
            app_id: None,
            test_device_ids: Vec::new(),
            request: AdRequest::default(),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            views: Arc::new(ViewCache::new()),
            view_keys: DashMap::new(),
        }
    }

    /// Create an adapter from a `ProviderConfig::Google` entry
    pub fn from_config(
        config: &ProviderConfig,
        vendor: Arc<dyn MobileAds>,
        context: AdContext,
    ) -> Result<Self> {
        match config {
            ProviderConfig::Google {
                app_id,
                test_device_ids,
                ..
            } => {
                config.validate()?;
                Ok(Self::new(vendor, context)
                    .with_app_id(app_id.clone())
                    .with_test_devices(test_device_ids.clone()))
            }
            _ => Err(Error::config("Invalid config type for Google provider")),
        }
    }

    /// AdMob application id forwarded to the bootstrap
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Devices that always receive test creatives
    pub fn with_test_devices(mut self, test_device_ids: Vec<String>) -> Self {
        self.test_device_ids = test_device_ids;
        self
    }

    /// Request sent with every load
    pub fn with_request(mut self, request: AdRequest) -> Self {
        self.request = request;
        self
    }

    /// Associate a host view key with an ad unit
    pub fn register_ad_view(&self, view_key: impl Into<String>, ad_unit_id: impl Into<String>) {
        let view_key = view_key.into();
        let ad_unit_id = ad_unit_id.into();
        debug!("View {} -> ad unit {}", view_key, ad_unit_id);
        self.view_keys.insert(view_key, ad_unit_id);
    }

    /// Forget a host view key, returning the ad unit it pointed to
    ///
    /// The ad unit's surface is left alone; release it with `cleanup`.
    pub fn unregister_ad_view(&self, view_key: &str) -> Option<String> {
        self.view_keys.remove(view_key).map(|(_, ad_unit_id)| ad_unit_id)
    }

    /// Surface for the ad unit registered under a view key
    ///
    /// Creates the surface if the ad unit has none yet. `None` if the key is
    /// unknown or the surface cannot be created.
    pub fn ad_view_for_key(&self, view_key: &str) -> Option<ViewHandle> {
        let ad_unit_id = self.view_keys.get(view_key)?.value().clone();

        match self.get_or_create_ad_view(&ad_unit_id) {
            Ok(view) => Some(view),
            Err(e) => {
                warn!("No surface for view {} ({}): {}", view_key, ad_unit_id, e);
                None
            }
        }
    }

    /// Cached banner for an ad unit, with access to the vendor view
    pub fn banner(&self, ad_unit_id: &str) -> Option<Arc<GoogleBanner>> {
        self.views.get(ad_unit_id)
    }

    fn bootstrap_context(&self, ctx: &AdContext) -> AdContext {
        match &self.app_id {
            Some(app_id) if !ctx.metadata.contains_key(APPLICATION_ID_KEY) => {
                ctx.clone().with_metadata(APPLICATION_ID_KEY, app_id.clone())
            }
            _ => ctx.clone(),
        }
    }

    fn create_banner(&self, ctx: &AdContext, ad_unit_id: &str) -> Result<Arc<GoogleBanner>> {
        if ad_unit_id.trim().is_empty() {
            return Err(Error::invalid_placement("Google ad unit id cannot be empty"));
        }

        let view = self
            .vendor
            .create_ad_view(ctx)
            .map_err(|e| Error::vendor(NAME, e.message))?;

        view.set_ad_size(AdSize::BANNER);
        view.set_ad_unit_id(ad_unit_id);
        view.set_hardware_acceleration(true);

        Ok(Arc::new(GoogleBanner::new(ad_unit_id, view)))
    }

    fn cached_banner(&self, ad_unit_id: &str) -> Result<Arc<GoogleBanner>> {
        self.views
            .get_or_create(ad_unit_id, || self.create_banner(&self.context, ad_unit_id))
    }
}

#[async_trait]
impl AdSdk for GoogleAdSdk {
    fn name(&self) -> &'static str {
        NAME
    }

    fn provider(&self) -> AdProvider {
        AdProvider::Google
    }

    async fn initialize(&self, ctx: &AdContext) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let _guard = self.init_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }

        info!("Initializing {} for {}", NAME, ctx.application_id);

        if !self.test_device_ids.is_empty() {
            self.vendor.set_request_configuration(RequestConfiguration {
                test_device_ids: self.test_device_ids.clone(),
            });
        }

        let (tx, rx) = oneshot::channel();
        self.vendor
            .initialize(
                &self.bootstrap_context(ctx),
                Box::new(move |status| {
                    let _ = tx.send(status);
                }),
            )
            .map_err(|e| {
                error!("Error initializing {}: {}", NAME, e);
                Error::initialization(e.message)
            })?;

        let status = rx.await.map_err(|_| {
            error!("{} dropped its initialization callback", NAME);
            Error::initialization("Initialization callback was never invoked")
        })?;

        for (adapter, status) in status.not_ready() {
            warn!("Mediation adapter {} not ready: {}", adapter, status.description);
        }

        self.initialized.store(true, Ordering::SeqCst);
        info!(
            "{} initialized ({} mediation adapter(s))",
            NAME,
            status.adapter_statuses.len()
        );
        Ok(())
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

        let banner = match self.cached_banner(placement_id) {
            Ok(banner) => banner,
            Err(e) => {
                warn!("Cannot create banner for {}: {}", placement_id, e);
                sender.loading();
                sender.error(e.reason());
                return stream;
            }
        };

        sender.loading();

        banner.view().set_ad_listener(Some(Arc::new(BannerListener {
            sender,
            views: Arc::downgrade(&self.views),
        })));
        debug!("Requesting Google ad for {}", placement_id);
        banner.view().load_ad(self.request.clone());

        stream
    }

    fn get_or_create_ad_view(&self, placement_id: &str) -> Result<ViewHandle> {
        let banner: ViewHandle = self.cached_banner(placement_id)?;
        Ok(banner)
    }

    fn create_ad_view(&self, ctx: &AdContext, placement_id: &str) -> Result<ViewHandle> {
        let banner: ViewHandle = self.create_banner(ctx, placement_id)?;
        Ok(banner)
    }

    fn is_ad_loaded(&self, placement_id: &str) -> bool {
        self.views.is_loaded(placement_id)
    }

    fn cleanup(&self, placement_id: &str) {
        if self.views.release(placement_id) {
            debug!("Cleaned up Google banner for {}", placement_id);
        }
    }

    fn destroy(&self) {
        let released = self.views.release_all();
        self.view_keys.clear();
        self.initialized.store(false, Ordering::SeqCst);
        info!("{} destroyed ({} banner(s) released)", NAME, released);
    }
}

/// Register a Google adapter with a manager
///
/// Returns the concrete adapter so the caller keeps access to the view-key
/// registry.
pub fn register(manager: &AdManager, sdk: GoogleAdSdk, policy: ProviderPolicy) -> Arc<GoogleAdSdk> {
    let sdk = Arc::new(sdk);
    manager.register_sdk_with_policy(AdProvider::Google, sdk.clone(), policy);
    sdk
}
