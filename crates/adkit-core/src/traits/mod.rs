//! Core traits for the ad lifecycle manager
//!
//! This module defines the abstract interfaces that all adapters must follow.
//!
//! - [`AdSdk`]: Uniform contract over one ad network's SDK
//! - [`AdSurface`]: Native banner surface handed out per placement

pub mod ad_sdk;
pub mod surface;

pub use ad_sdk::{AdContext, AdSdk};
pub use surface::{AdSize, AdSurface, ViewHandle};
