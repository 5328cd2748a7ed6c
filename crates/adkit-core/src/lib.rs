// # adkit-core
//
// Core library for the multi-network banner ad lifecycle manager.
//
// ## Architecture Overview
//
// This library provides the provider-agnostic half of the ad stack:
// - **AdSdk**: Trait every ad-network adapter implements
// - **AdSurface**: Trait for the native banner surface an adapter hands out
// - **ViewCache**: Per-placement surface cache and loaded-set owned by one adapter
// - **LoadStream**: Cancellable Loading → Success/Error event stream for one load
// - **AdManager**: Registry of adapters plus the observable readiness state map
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Vendor SDK specifics live in provider crates
// 2. **Event-Driven**: Loads are streams, readiness is a watch channel
// 3. **Plugin-Based**: Adapters are registered at runtime by provider id
// 4. **Partial Failure Isolation**: One network failing never blocks another
// 5. **Explicit Ownership**: No global singletons; the manager is passed around

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod model;
pub mod stream;
pub mod traits;

// Re-export core types for convenience
pub use cache::ViewCache;
pub use config::{AdkitConfig, ManagerConfig, PlacementConfig, ProviderConfig, ProviderPolicy};
pub use error::{Error, Result};
pub use manager::{AdManager, InitReport};
pub use model::{AdProvider, AdResult, AdState, StateMap};
pub use stream::{LoadCancelHandle, LoadSender, LoadStream};
pub use traits::{AdContext, AdSdk, AdSize, AdSurface, ViewHandle};
