// # Ad SDK Trait
//
// Defines the uniform contract every ad-network adapter must satisfy.
//
// ## Implementations
//
// - Google Mobile Ads: `adkit-provider-google` crate
// - InMobi: `adkit-provider-inmobi` crate
//
// ## Usage
//
// ```rust,ignore
// use adkit_core::{AdContext, AdSdk};
// use tokio_stream::StreamExt;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let sdk = /* AdSdk implementation */;
//
//     sdk.initialize(&AdContext::new("com.example.app")).await?;
//
//     let mut events = sdk.load_ad("unit-1");
//     while let Some(event) = events.next().await {
//         println!("{:?}", event);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::collections::HashMap;

use crate::model::AdProvider;
use crate::stream::LoadStream;
use crate::traits::surface::ViewHandle;

/// Environment handed to vendor SDKs
///
/// Stands in for the host application's context: which app is asking, and
/// whether the vendor should serve test creatives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdContext {
    /// Host application identifier (bundle id / package name)
    pub application_id: String,
    /// Ask vendors for test creatives
    pub test_mode: bool,
    /// Free-form key/value pairs forwarded to vendors
    pub metadata: HashMap<String, String>,
}

impl AdContext {
    /// Create a context for the given application
    pub fn new(application_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            test_mode: false,
            metadata: HashMap::new(),
        }
    }

    /// Enable or disable test creatives
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    /// Attach a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Trait for ad network adapters
///
/// An adapter is the sole translator between one vendor SDK's native API
/// (bootstrap call + completion callback, request object + listener) and this
/// uniform contract. The presentation layer and [`AdManager`](crate::AdManager)
/// only ever talk to this trait.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Ownership
///
/// ## Owned by the adapter
/// - ✅ Its view cache and loaded-set (see [`ViewCache`](crate::ViewCache))
/// - ✅ Its local "initialized" flag
/// - ✅ Translating vendor callbacks into [`AdResult`](crate::AdResult) events
///
/// ## Not owned by the adapter
/// - ❌ The provider readiness state map (owned by `AdManager`)
/// - ❌ Retry policy (callers re-invoke `initialize` / `load_ad` explicitly)
/// - ❌ Other adapters' surfaces
///
/// ## Failure Model
///
/// `initialize` reports failure through its `Result`; vendor panics and
/// timeouts are contained by the manager. `load_ad` never fails: every
/// failure path is a terminal `AdResult::Error` on the returned stream.
#[async_trait]
pub trait AdSdk: Send + Sync {
    /// Human-readable network name (for logging/debugging)
    fn name(&self) -> &'static str;

    /// Provider identifier this adapter serves
    fn provider(&self) -> AdProvider;

    /// Perform the one-time vendor SDK bootstrap
    ///
    /// # Idempotency
    ///
    /// Once initialized, further calls return `Ok(())` without touching the
    /// vendor. Concurrent calls must not bootstrap the vendor twice.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The vendor reported successful initialization
    /// - `Err(Error::Initialization)`: The vendor threw, reported failure, or
    ///   dropped its completion callback. The adapter stays uninitialized.
    async fn initialize(&self, ctx: &AdContext) -> crate::Result<()>;

    /// Local initialized flag; never consults the vendor runtime
    fn is_initialized(&self) -> bool;

    /// Load an ad for a placement
    ///
    /// Yields `Loading` followed by exactly one of `Success`/`Error`, then
    /// ends. If the adapter is not initialized, yields a lone
    /// `Error(placement, "SDK not initialized")` without contacting the vendor.
    /// Cancelling the stream, or dropping it before the terminal event,
    /// releases the placement's surface.
    ///
    /// A newer `load_ad` for the same placement ends a still-pending stream
    /// with `Error(placement, LOAD_SUPERSEDED)`; that stream no longer owns
    /// the surface and never releases it.
    ///
    /// Dropping the stream after its terminal event keeps the surface alive,
    /// since the ad is presumably on screen. Callers must call
    /// [`cleanup`](Self::cleanup) for the placement when its view is torn down.
    fn load_ad(&self, placement_id: &str) -> LoadStream;

    /// Return the cached surface for a placement, creating it on first use
    ///
    /// Concurrent callers for the same placement share one surface.
    fn get_or_create_ad_view(&self, placement_id: &str) -> crate::Result<ViewHandle>;

    /// Construct a fresh banner-sized surface without caching it
    fn create_ad_view(&self, ctx: &AdContext, placement_id: &str) -> crate::Result<ViewHandle>;

    /// Whether the placement's most recent load succeeded and is still displayable
    fn is_ad_loaded(&self, placement_id: &str) -> bool;

    /// Release the placement's cached surface and forget its loaded status
    ///
    /// Safe to call for unknown placements and safe to call repeatedly.
    fn cleanup(&self, placement_id: &str);

    /// Release every cached surface and reset to uninitialized
    fn destroy(&self);
}
