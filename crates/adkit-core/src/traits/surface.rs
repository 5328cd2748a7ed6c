// # Ad Surface Trait
//
// Defines the native banner surface an adapter caches per placement.
//
// The presentation layer only ever sees a `ViewHandle`; the concrete vendor
// view stays inside the adapter crate that created it.

use crate::model::AdProvider;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a cached ad surface
pub type ViewHandle = Arc<dyn AdSurface>;

/// Banner geometry in density-independent pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdSize {
    pub width: u32,
    pub height: u32,
}

impl AdSize {
    /// Standard phone banner
    pub const BANNER: AdSize = AdSize::new(320, 50);

    /// Large banner
    pub const LARGE_BANNER: AdSize = AdSize::new(320, 100);

    /// IAB medium rectangle
    pub const MEDIUM_RECTANGLE: AdSize = AdSize::new(300, 250);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for AdSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Native ad surface for one placement
///
/// # Lifecycle
///
/// A surface is created by [`AdSdk::create_ad_view`](crate::AdSdk::create_ad_view),
/// cached by the adapter, and destroyed exactly once: by `cleanup`, by
/// `destroy`, or never. Dropping the last `Arc` does not destroy the native
/// resource, only `destroy()` does.
///
/// # Thread Safety
///
/// Implementations must be safe to share between tasks; vendor views that
/// are bound to a UI thread are expected to marshal internally.
pub trait AdSurface: Send + Sync {
    /// Network that owns this surface
    fn provider(&self) -> AdProvider;

    /// Placement this surface was created for
    fn placement_id(&self) -> &str;

    /// Geometry the surface was sized to
    fn size(&self) -> AdSize;

    /// Release the native resource
    ///
    /// Called at most once by the owning cache.
    fn destroy(&self);

    /// Whether `destroy()` has run
    fn is_destroyed(&self) -> bool;
}

impl fmt::Debug for dyn AdSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdSurface")
            .field("provider", &self.provider())
            .field("placement_id", &self.placement_id())
            .field("size", &self.size())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}
