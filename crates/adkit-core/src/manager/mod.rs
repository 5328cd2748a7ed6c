//! Provider registry and readiness coordinator
//!
//! The AdManager is responsible for:
//! - Registering one adapter per ad network
//! - Driving every adapter's vendor bootstrap
//! - Publishing each network's readiness as an observable state map
//! - Tearing every adapter down at shutdown
//!
//! ## Architecture
//!
//! ```text
//!                    register_sdk()            initialize()
//!                         │                         │
//!                         ▼                         ▼
//!               ┌──────────────────────────────────────────┐
//!               │ AdManager                                │
//!               │  RwLock<HashMap<AdProvider, Entry>>      │──── watch ────► StateMap observers
//!               └──────────────────────────────────────────┘
//!                    │                 │                 │
//!                    ▼                 ▼                 ▼
//!              ┌──────────┐      ┌──────────┐      ┌──────────┐
//!              │  AdSdk   │      │  AdSdk   │      │   ...    │
//!              │ (Google) │      │ (InMobi) │      │          │
//!              └──────────┘      └──────────┘      └──────────┘
//! ```
//!
//! ## State Flow
//!
//! 1. `register_sdk` → `Idle`
//! 2. `initialize` publishes `Initializing` before calling into the adapter
//! 3. The adapter's outcome publishes `Ready` or `Error(reason)`
//! 4. `cleanup` removes every entry
//!
//! There is no automatic retry. A caller that sees `Error` re-invokes
//! `initialize` (or re-registers) explicitly.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::config::{ManagerConfig, ProviderPolicy};
use crate::model::{AdProvider, AdResult, AdState, StateMap};
use crate::stream::LoadStream;
use crate::traits::{AdContext, AdSdk};

/// Registry entry for one provider
struct Entry {
    sdk: Arc<dyn AdSdk>,
    state: AdState,
    policy: ProviderPolicy,
    /// Bumped on every registration so a stale initialization run cannot
    /// overwrite the state of a newer adapter
    epoch: u64,
}

/// Outcome of one `initialize` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    states: StateMap,
    policies: HashMap<AdProvider, ProviderPolicy>,
}

impl InitReport {
    /// Final state of every provider the run covered
    pub fn states(&self) -> &StateMap {
        &self.states
    }

    /// Every provider reached `Ready` (vacuously true with no providers)
    pub fn all_ready(&self) -> bool {
        self.states.values().all(AdState::is_ready)
    }

    /// Every `Required` provider reached `Ready`
    pub fn is_usable(&self) -> bool {
        self.states.iter().all(|(provider, state)| {
            state.is_ready() || self.policies.get(provider) == Some(&ProviderPolicy::Optional)
        })
    }

    /// Providers that did not reach `Ready`, with their failure reason
    pub fn failures(&self) -> Vec<(AdProvider, String)> {
        self.states
            .iter()
            .filter(|(_, state)| !state.is_ready())
            .map(|(provider, state)| {
                let reason = state
                    .error_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| state.to_string());
                (*provider, reason)
            })
            .collect()
    }

    /// Providers that reached `Ready`
    pub fn ready(&self) -> Vec<AdProvider> {
        self.states
            .iter()
            .filter(|(_, state)| state.is_ready())
            .map(|(provider, _)| *provider)
            .collect()
    }
}

/// Registry of ad network adapters and their readiness
///
/// One instance is created at startup and shared (`Arc<AdManager>`) with
/// everything that needs it; there is no global instance.
///
/// ## Thread Safety
///
/// Adapters and states live in one table behind one `RwLock`. Every write
/// publishes a fresh snapshot to a `watch` channel before releasing the
/// lock, so readers never see a torn map and observers see transitions in
/// the order they happened.
pub struct AdManager {
    entries: RwLock<HashMap<AdProvider, Entry>>,
    state_tx: watch::Sender<StateMap>,
    config: ManagerConfig,
    next_epoch: std::sync::atomic::AtomicU64,
}

impl AdManager {
    /// Create a manager with the given settings
    pub fn new(config: ManagerConfig) -> Self {
        let (state_tx, _) = watch::channel(StateMap::new());

        Self {
            entries: RwLock::new(HashMap::new()),
            state_tx,
            config,
            next_epoch: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Settings this manager was created with
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Register an adapter as a required provider
    ///
    /// Re-registering a provider replaces its adapter (last write wins) and
    /// resets its state to `Idle`. The replaced adapter is not destroyed.
    pub fn register_sdk(&self, provider: AdProvider, sdk: Arc<dyn AdSdk>) {
        self.register_sdk_with_policy(provider, sdk, ProviderPolicy::Required);
    }

    /// Register an adapter with an explicit failure policy
    pub fn register_sdk_with_policy(
        &self,
        provider: AdProvider,
        sdk: Arc<dyn AdSdk>,
        policy: ProviderPolicy,
    ) {
        let epoch = self
            .next_epoch
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let name = sdk.name();

        let mut entries = self.write_entries();
        let replaced = entries
            .insert(
                provider,
                Entry {
                    sdk,
                    state: AdState::Idle,
                    policy,
                    epoch,
                },
            )
            .is_some();
        self.publish(&entries);
        drop(entries);

        if replaced {
            warn!("Replaced adapter for {} with {} ({:?})", provider, name, policy);
        } else {
            info!("Registered {} adapter for {} ({:?})", name, provider, policy);
        }
    }

    /// Initialize every registered provider
    ///
    /// # Returns
    ///
    /// `true` only if every provider reached `Ready`. Inspect
    /// [`states`](Self::states) to see which providers are usable.
    pub async fn initialize(&self, ctx: &AdContext) -> bool {
        self.initialize_report(ctx).await.all_ready()
    }

    /// Initialize every registered provider and report per-provider outcomes
    ///
    /// Each provider is moved to `Initializing` before its adapter is
    /// called. One provider failing, timing out, or panicking never stops
    /// the others from being attempted.
    pub async fn initialize_report(&self, ctx: &AdContext) -> InitReport {
        let targets: Vec<(AdProvider, Arc<dyn AdSdk>, u64, ProviderPolicy)> = {
            let entries = self.read_entries();
            let mut targets: Vec<_> = entries
                .iter()
                .map(|(provider, entry)| (*provider, Arc::clone(&entry.sdk), entry.epoch, entry.policy))
                .collect();
            targets.sort_by_key(|(provider, ..)| *provider);
            targets
        };

        info!("Initializing {} ad provider(s)", targets.len());

        let timeout = Duration::from_secs(self.config.init_timeout_secs);
        let mut states = StateMap::new();
        let mut policies = HashMap::new();

        if self.config.concurrent_init {
            let mut runs = JoinSet::new();

            for (provider, sdk, epoch, policy) in targets {
                policies.insert(provider, policy);
                self.transition(provider, epoch, AdState::Initializing);
                let ctx = ctx.clone();
                runs.spawn(async move {
                    let state = run_initialization(provider, sdk, ctx, timeout).await;
                    (provider, epoch, state)
                });
            }

            while let Some(joined) = runs.join_next().await {
                match joined {
                    Ok((provider, epoch, state)) => {
                        self.transition(provider, epoch, state.clone());
                        states.insert(provider, state);
                    }
                    // run_initialization contains adapter panics itself, so
                    // this only fires if the runtime is shutting down
                    Err(e) => error!("Initialization task failed: {}", e),
                }
            }
        } else {
            for (provider, sdk, epoch, policy) in targets {
                policies.insert(provider, policy);
                self.transition(provider, epoch, AdState::Initializing);
                let state = run_initialization(provider, sdk, ctx.clone(), timeout).await;
                self.transition(provider, epoch, state.clone());
                states.insert(provider, state);
            }
        }

        let report = InitReport { states, policies };
        if report.all_ready() {
            info!("All ad providers ready");
        } else {
            for (provider, reason) in report.failures() {
                warn!("Ad provider {} not ready: {}", provider, reason);
            }
        }

        report
    }

    /// Adapter registered for a provider
    ///
    /// `None` means the provider was never registered (or was cleaned up);
    /// it is not a transient condition.
    pub fn get_sdk(&self, provider: AdProvider) -> Option<Arc<dyn AdSdk>> {
        self.read_entries()
            .get(&provider)
            .map(|entry| Arc::clone(&entry.sdk))
    }

    /// Whether the provider's state is exactly `Ready`
    pub fn is_sdk_initialized(&self, provider: AdProvider) -> bool {
        self.read_entries()
            .get(&provider)
            .is_some_and(|entry| entry.state.is_ready())
    }

    /// Current state of one provider
    pub fn state(&self, provider: AdProvider) -> Option<AdState> {
        self.read_entries()
            .get(&provider)
            .map(|entry| entry.state.clone())
    }

    /// Snapshot of every registered provider's state
    pub fn states(&self) -> StateMap {
        self.state_tx.borrow().clone()
    }

    /// Registered providers, in key order
    pub fn providers(&self) -> Vec<AdProvider> {
        let mut providers: Vec<_> = self.read_entries().keys().copied().collect();
        providers.sort();
        providers
    }

    /// Receiver that observes every state map change
    pub fn subscribe(&self) -> watch::Receiver<StateMap> {
        self.state_tx.subscribe()
    }

    /// Stream of state map snapshots, starting with the current one
    pub fn state_stream(&self) -> WatchStream<StateMap> {
        WatchStream::new(self.subscribe())
    }

    /// Load an ad through a provider's adapter
    ///
    /// An unregistered provider yields a single `Error` event.
    pub fn load_ad(&self, provider: AdProvider, placement_id: &str) -> LoadStream {
        match self.get_sdk(provider) {
            Some(sdk) => sdk.load_ad(placement_id),
            None => {
                warn!("Load requested for unregistered provider {}", provider);
                LoadStream::immediate(AdResult::error(
                    placement_id,
                    format!("{} is not registered", provider),
                ))
            }
        }
    }

    /// Destroy every adapter and forget every provider
    ///
    /// Intended for process shutdown; do not race it against `initialize`
    /// or in-flight loads.
    pub fn cleanup(&self) {
        let drained: Vec<(AdProvider, Arc<dyn AdSdk>)> = {
            let mut entries = self.write_entries();
            let drained = entries
                .drain()
                .map(|(provider, entry)| (provider, entry.sdk))
                .collect();
            self.publish(&entries);
            drained
        };

        for (provider, sdk) in drained {
            debug!("Destroying {} adapter for {}", sdk.name(), provider);
            sdk.destroy();
        }

        info!("Ad manager cleaned up");
    }

    /// Apply a state transition if the entry is still the one the run targeted
    fn transition(&self, provider: AdProvider, epoch: u64, state: AdState) -> bool {
        let mut entries = self.write_entries();

        let Some(entry) = entries.get_mut(&provider) else {
            debug!("Dropping {} transition for {}: provider no longer registered", state, provider);
            return false;
        };

        if entry.epoch != epoch {
            debug!("Dropping {} transition for {}: adapter was re-registered", state, provider);
            return false;
        }

        info!("Ad provider {}: {} -> {}", provider, entry.state, state);
        entry.state = state;
        self.publish(&entries);
        true
    }

    /// Push a snapshot of the table to observers
    fn publish(&self, entries: &HashMap<AdProvider, Entry>) {
        let snapshot: StateMap = entries
            .iter()
            .map(|(provider, entry)| (*provider, entry.state.clone()))
            .collect();
        self.state_tx.send_replace(snapshot);
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<AdProvider, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<AdProvider, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for AdManager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

/// Run one adapter's bootstrap in its own task and map the outcome to a state
///
/// The task boundary contains adapter panics; the timeout drops the
/// adapter's future, which leaves it uninitialized.
async fn run_initialization(
    provider: AdProvider,
    sdk: Arc<dyn AdSdk>,
    ctx: AdContext,
    timeout: Duration,
) -> AdState {
    let name = sdk.name();
    let task = tokio::spawn(async move { tokio::time::timeout(timeout, sdk.initialize(&ctx)).await });

    match task.await {
        Ok(Ok(Ok(()))) => AdState::Ready,
        Ok(Ok(Err(e))) => {
            warn!("{} initialization failed for {}: {}", name, provider, e);
            AdState::Error(e.reason())
        }
        Ok(Err(_)) => {
            warn!("{} initialization for {} timed out after {:?}", name, provider, timeout);
            AdState::Error(format!("Initialization timed out after {}s", timeout.as_secs()))
        }
        Err(e) => {
            error!("{} initialization for {} panicked: {}", name, provider, e);
            AdState::Error("Initialization panicked".to_string())
        }
    }
}
