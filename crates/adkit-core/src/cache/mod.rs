// # View Cache
//
// Per-adapter cache of native surfaces keyed by placement, plus the
// loaded-set recording which placements currently hold a displayable ad.
//
// ## Guarantees
//
// - At most one live surface per placement: `get_or_create` holds the
//   placement's shard lock across creation, so racing callers share one
//   surface instead of each allocating their own
// - A surface is destroyed exactly once: removal from the map is atomic and
//   only the caller that removed it calls `destroy()`
// - Nothing is destroyed implicitly; dropping the cache without `release_all`
//   leaves native resources to the vendor
// - One load owns a placement at a time: a newer `start_load` ends the older
//   stream with `LOAD_SUPERSEDED`, and only the owning load's cancellation
//   releases the surface

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::error::{LOAD_SUPERSEDED, Result, VIEW_RELEASED};
use crate::stream::{LoadSender, LoadStream};
use crate::traits::AdSurface;

/// Load currently owning a placement
struct ActiveLoad {
    id: u64,
    sender: LoadSender,
}

/// Surface cache and loaded-set owned by one adapter
///
/// Adapters keep their own concrete surface type `V`, so they can reach
/// vendor-specific methods on cached views, and hand out `Arc<V>` coerced to
/// a [`ViewHandle`](crate::ViewHandle).
///
/// # Example
///
/// ```rust,ignore
/// let cache: ViewCache<MyBanner> = ViewCache::new();
/// let view = cache.get_or_create("unit-1", || Ok(Arc::new(MyBanner::new("unit-1"))))?;
/// cache.mark_loaded("unit-1");
/// assert!(cache.is_loaded("unit-1"));
/// cache.release("unit-1"); // destroys the banner
/// ```
pub struct ViewCache<V: ?Sized> {
    views: DashMap<String, Arc<V>>,
    loaded: DashMap<String, DateTime<Utc>>,
    active: DashMap<String, ActiveLoad>,
    next_load: AtomicU64,
}

impl<V: AdSurface + ?Sized> ViewCache<V> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            views: DashMap::new(),
            loaded: DashMap::new(),
            active: DashMap::new(),
            next_load: AtomicU64::new(1),
        }
    }

    /// Open a load stream that owns the placement
    ///
    /// A load still pending on the same placement is ended with
    /// `Error(LOAD_SUPERSEDED)` and loses the right to release the surface.
    /// Cancelling the returned stream releases the surface only while this
    /// load is still the placement's owner.
    pub fn start_load(self: &Arc<Self>, placement_id: &str) -> (LoadSender, LoadStream)
    where
        V: 'static,
    {
        let id = self.next_load.fetch_add(1, Ordering::SeqCst);
        let cache = Arc::downgrade(self);
        let owner = placement_id.to_string();
        let (sender, stream) = LoadStream::channel(placement_id, move || {
            if let Some(cache) = cache.upgrade() {
                cache.finish_load(&owner, id);
            }
        });

        let previous = self.active.insert(
            placement_id.to_string(),
            ActiveLoad {
                id,
                sender: sender.clone(),
            },
        );
        if let Some(previous) = previous {
            if previous.sender.abandon(LOAD_SUPERSEDED) {
                debug!("Load {} superseded a pending load for {}", id, placement_id);
            }
        }

        (sender, stream)
    }

    /// Cleanup hook of load `id`: release the surface if the load still owns it
    fn finish_load(&self, placement_id: &str, id: u64) {
        if let Entry::Occupied(entry) = self.active.entry(placement_id.to_string()) {
            if entry.get().id == id {
                // The slot stays locked while the surface goes, so a newer
                // load cannot claim the placement in between
                self.release_surface(placement_id);
                entry.remove();
            }
        }
    }

    /// Whether a load for the placement has been started and not released
    pub fn has_active_load(&self, placement_id: &str) -> bool {
        self.active
            .get(placement_id)
            .is_some_and(|load| !load.sender.is_closed())
    }

    /// Return the cached surface, or create and cache one atomically
    ///
    /// `create` runs at most once per placement while no surface is cached.
    /// If it fails, nothing is cached and the error is returned.
    pub fn get_or_create<F>(&self, placement_id: &str, create: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Result<Arc<V>>,
    {
        if let Some(view) = self.views.get(placement_id) {
            return Ok(Arc::clone(view.value()));
        }

        match self.views.entry(placement_id.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let view = create()?;
                debug!("Created surface for placement {}", placement_id);
                entry.insert(Arc::clone(&view));
                Ok(view)
            }
        }
    }

    /// Cached surface for a placement, if any
    pub fn get(&self, placement_id: &str) -> Option<Arc<V>> {
        self.views.get(placement_id).map(|view| Arc::clone(view.value()))
    }

    /// Whether a surface is cached for the placement
    pub fn contains(&self, placement_id: &str) -> bool {
        self.views.contains_key(placement_id)
    }

    /// Destroy and forget the placement's surface and loaded status
    ///
    /// A load still pending on the placement ends with `Error(VIEW_RELEASED)`.
    ///
    /// # Returns
    ///
    /// `true` if a surface was cached and has now been destroyed
    pub fn release(&self, placement_id: &str) -> bool {
        if let Some((_, load)) = self.active.remove(placement_id) {
            load.sender.abandon(VIEW_RELEASED);
        }
        self.release_surface(placement_id)
    }

    /// Destroy every cached surface and clear the loaded-set
    ///
    /// # Returns
    ///
    /// The number of surfaces destroyed
    pub fn release_all(&self) -> usize {
        let owned: Vec<String> = self.active.iter().map(|entry| entry.key().clone()).collect();
        for placement_id in owned {
            if let Some((_, load)) = self.active.remove(&placement_id) {
                load.sender.abandon(VIEW_RELEASED);
            }
        }

        self.loaded.clear();

        let placements: Vec<String> = self.views.iter().map(|entry| entry.key().clone()).collect();
        placements
            .iter()
            .filter(|placement_id| self.release_surface(placement_id))
            .count()
    }

    fn release_surface(&self, placement_id: &str) -> bool {
        self.loaded.remove(placement_id);

        match self.views.remove(placement_id) {
            Some((_, view)) => {
                view.destroy();
                debug!("Released surface for placement {}", placement_id);
                true
            }
            None => false,
        }
    }

    /// Record a successful load
    pub fn mark_loaded(&self, placement_id: &str) {
        self.loaded.insert(placement_id.to_string(), Utc::now());
    }

    /// Record a failed load
    pub fn mark_failed(&self, placement_id: &str) {
        self.loaded.remove(placement_id);
    }

    /// Whether the placement currently holds a displayable ad
    pub fn is_loaded(&self, placement_id: &str) -> bool {
        self.loaded.contains_key(placement_id)
    }

    /// When the placement's current ad finished loading
    pub fn loaded_at(&self, placement_id: &str) -> Option<DateTime<Utc>> {
        self.loaded.get(placement_id).map(|entry| *entry.value())
    }

    /// Placements that currently hold a displayable ad
    pub fn loaded_placements(&self) -> Vec<String> {
        self.loaded.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of cached surfaces
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether no surface is cached
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl<V: AdSurface + ?Sized> Default for ViewCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AdProvider, AdResult};
    use crate::traits::AdSize;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio_stream::StreamExt;

    struct CountingSurface {
        placement_id: String,
        destroyed: AtomicBool,
        destroy_calls: Arc<AtomicUsize>,
    }

    impl CountingSurface {
        fn new(placement_id: &str, destroy_calls: &Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self {
                placement_id: placement_id.to_string(),
                destroyed: AtomicBool::new(false),
                destroy_calls: Arc::clone(destroy_calls),
            })
        }
    }

    impl AdSurface for CountingSurface {
        fn provider(&self) -> AdProvider {
            AdProvider::Google
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

    #[test]
    fn test_get_or_create_reuses_surface() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let cache: ViewCache<CountingSurface> = ViewCache::new();

        let first = cache
            .get_or_create("unit-1", || Ok(CountingSurface::new("unit-1", &destroys)))
            .unwrap();
        let second = cache
            .get_or_create("unit-1", || panic!("surface should come from the cache"))
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failed_creation_caches_nothing() {
        let cache: ViewCache<CountingSurface> = ViewCache::new();

        let result = cache.get_or_create("bad", || Err(crate::Error::invalid_placement("bad")));

        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_get_or_create_creates_once() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let created = Arc::new(AtomicUsize::new(0));
        let cache: Arc<ViewCache<CountingSurface>> = Arc::new(ViewCache::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let created = Arc::clone(&created);
                let destroys = Arc::clone(&destroys);
                std::thread::spawn(move || {
                    cache
                        .get_or_create("unit-1", || {
                            created.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(CountingSurface::new("unit-1", &destroys))
                        })
                        .unwrap()
                })
            })
            .collect();

        let views: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(views.iter().all(|view| Arc::ptr_eq(view, &views[0])));
    }

    #[test]
    fn test_release_is_idempotent() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let cache: ViewCache<CountingSurface> = ViewCache::new();

        let view = cache
            .get_or_create("unit-1", || Ok(CountingSurface::new("unit-1", &destroys)))
            .unwrap();
        cache.mark_loaded("unit-1");

        assert!(cache.release("unit-1"));
        assert!(!cache.release("unit-1"));
        assert!(!cache.release("never-created"));

        assert!(view.is_destroyed());
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
        assert!(!cache.is_loaded("unit-1"));
    }

    #[test]
    fn test_loaded_set_tracking() {
        let cache: ViewCache<CountingSurface> = ViewCache::new();

        assert!(!cache.is_loaded("unit-1"));
        cache.mark_loaded("unit-1");
        assert!(cache.is_loaded("unit-1"));
        assert!(cache.loaded_at("unit-1").is_some());

        cache.mark_failed("unit-1");
        assert!(!cache.is_loaded("unit-1"));
        assert!(cache.loaded_at("unit-1").is_none());
    }

    #[test]
    fn test_release_all() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let cache: ViewCache<CountingSurface> = ViewCache::new();

        for id in ["a", "b", "c"] {
            cache
                .get_or_create(id, || Ok(CountingSurface::new(id, &destroys)))
                .unwrap();
            cache.mark_loaded(id);
        }

        assert_eq!(cache.release_all(), 3);
        assert!(cache.is_empty());
        assert!(cache.loaded_placements().is_empty());
        assert_eq!(destroys.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_newer_load_supersedes_pending_load() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let cache: Arc<ViewCache<CountingSurface>> = Arc::new(ViewCache::new());
        cache
            .get_or_create("unit-1", || Ok(CountingSurface::new("unit-1", &destroys)))
            .unwrap();

        let (first_tx, first) = cache.start_load("unit-1");
        first_tx.loading();
        let (second_tx, second) = cache.start_load("unit-1");
        second_tx.loading();

        assert!(first_tx.is_closed());
        let events: Vec<_> = first.collect().await;
        assert_eq!(
            events,
            vec![
                AdResult::loading("unit-1"),
                AdResult::error("unit-1", LOAD_SUPERSEDED),
            ]
        );

        cache.mark_loaded("unit-1");
        second_tx.success();
        let events: Vec<_> = second.collect().await;
        assert_eq!(events.last(), Some(&AdResult::success("unit-1")));

        assert_eq!(destroys.load(Ordering::SeqCst), 0);
        assert!(cache.is_loaded("unit-1"));
    }

    #[tokio::test]
    async fn test_only_owning_load_releases_surface() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let cache: Arc<ViewCache<CountingSurface>> = Arc::new(ViewCache::new());
        cache
            .get_or_create("unit-1", || Ok(CountingSurface::new("unit-1", &destroys)))
            .unwrap();

        let (_, mut first) = cache.start_load("unit-1");
        let (_, mut second) = cache.start_load("unit-1");

        assert!(!first.cancel());
        assert_eq!(destroys.load(Ordering::SeqCst), 0);
        assert!(cache.has_active_load("unit-1"));

        assert!(second.cancel());
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
        assert!(!cache.has_active_load("unit-1"));
    }

    #[tokio::test]
    async fn test_release_ends_pending_load() {
        let destroys = Arc::new(AtomicUsize::new(0));
        let cache: Arc<ViewCache<CountingSurface>> = Arc::new(ViewCache::new());
        cache
            .get_or_create("unit-1", || Ok(CountingSurface::new("unit-1", &destroys)))
            .unwrap();

        let (sender, stream) = cache.start_load("unit-1");
        sender.loading();

        assert!(cache.release("unit-1"));
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.last(), Some(&AdResult::error("unit-1", VIEW_RELEASED)));
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
    }
}
