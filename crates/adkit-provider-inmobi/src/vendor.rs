//! InMobi vendor surface
//!
//! Listener-based bootstrap, banners addressed by numeric placement id, and
//! an event listener per banner.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use adkit_core::AdContext;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error reported by the SDK, thrown or passed to the init listener
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InMobiSdkError {
    pub message: String,
}

impl InMobiSdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// SDK log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    #[default]
    None,
    Error,
    Debug,
}

/// Banner transition between two creatives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnimationType {
    AnimationOff,
    #[default]
    RotateHorizontalAxis,
    AnimationAlpha,
    RotateVerticalAxis,
}

/// GDPR consent payload handed to `InMobiSdk::init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GdprConsent {
    /// Whether the user's consent is available
    #[serde(rename = "gdpr_consent_available")]
    pub consent_available: bool,
    /// "1" if GDPR applies to this user, "0" otherwise
    pub gdpr: String,
    /// IAB TCF consent string
    #[serde(rename = "gdpr_consent")]
    pub iab_consent: String,
}

impl GdprConsent {
    pub fn new(gdpr_applies: bool, consent_available: bool, iab_consent: impl Into<String>) -> Self {
        Self {
            consent_available,
            gdpr: if gdpr_applies { "1" } else { "0" }.to_string(),
            iab_consent: iab_consent.into(),
        }
    }

    /// Whether GDPR applies to this user
    pub fn applies(&self) -> bool {
        self.gdpr == "1"
    }

    /// The JSON object the SDK expects
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Default for GdprConsent {
    fn default() -> Self {
        Self::new(false, true, "")
    }
}

/// Status code of a failed banner request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    NoFill,
    NetworkUnreachable,
    RequestTimedOut,
    RequestInvalid,
    InternalError,
    ServerError,
    AdActive,
    EarlyRefreshRequest,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::NoFill => "NO_FILL",
            StatusCode::NetworkUnreachable => "NETWORK_UNREACHABLE",
            StatusCode::RequestTimedOut => "REQUEST_TIMED_OUT",
            StatusCode::RequestInvalid => "REQUEST_INVALID",
            StatusCode::InternalError => "INTERNAL_ERROR",
            StatusCode::ServerError => "SERVER_ERROR",
            StatusCode::AdActive => "AD_ACTIVE",
            StatusCode::EarlyRefreshRequest => "EARLY_REFRESH_REQUEST",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed banner request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMobiAdRequestStatus {
    pub status_code: StatusCode,
    pub message: Option<String>,
}

impl InMobiAdRequestStatus {
    pub fn new(status_code: StatusCode, message: Option<String>) -> Self {
        Self {
            status_code,
            message,
        }
    }

    /// Message to surface to callers; the status code when the SDK gave none
    pub fn reason(&self) -> String {
        match self.message.as_deref() {
            Some(message) if !message.trim().is_empty() => message.to_string(),
            _ => self.status_code.as_str().to_string(),
        }
    }
}

/// Details of a served creative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdMetaInfo {
    pub creative_id: String,
    pub bid: f64,
    #[serde(default)]
    pub bid_info: serde_json::Value,
}

/// Completion listener for `InMobiSdk::init`
pub trait SdkInitializationListener: Send + Sync {
    /// `None` on success
    fn on_initialization_complete(&self, error: Option<InMobiSdkError>);
}

/// Event callbacks for one banner
///
/// Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait BannerAdEventListener: Send + Sync {
    fn on_ad_load_succeeded(&self, info: AdMetaInfo) {}
    fn on_ad_load_failed(&self, status: InMobiAdRequestStatus) {}
    fn on_ad_clicked(&self, params: HashMap<String, String>) {}
    fn on_ad_displayed(&self) {}
    fn on_ad_dismissed(&self) {}
    fn on_ad_impression(&self) {}
}

/// Native banner
pub trait InMobiBanner: Send + Sync {
    fn placement_id(&self) -> i64;
    fn set_animation_type(&self, animation: AnimationType);
    fn animation_type(&self) -> AnimationType;
    fn set_enable_auto_refresh(&self, enabled: bool);
    fn auto_refresh_enabled(&self) -> bool;
    fn set_listener(&self, listener: Option<Arc<dyn BannerAdEventListener>>);

    /// Request a creative; the outcome arrives on the listener
    fn load(&self);

    fn destroy(&self);
}

/// Entry point of the InMobi SDK
pub trait InMobiSdk: Send + Sync {
    fn init(
        &self,
        ctx: &AdContext,
        account_id: &str,
        consent: serde_json::Value,
        listener: Arc<dyn SdkInitializationListener>,
    ) -> Result<(), InMobiSdkError>;

    fn set_log_level(&self, level: LogLevel);

    fn create_banner(&self, ctx: &AdContext, placement_id: i64) -> Result<Arc<dyn InMobiBanner>, InMobiSdkError>;
}
