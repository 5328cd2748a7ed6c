//! Google Mobile Ads vendor surface
//!
//! The subset of the Mobile Ads SDK the adapter talks to: a callback-based
//! bootstrap, banner views, and a listener notified of load outcomes. A real
//! binding and the [`sim`](crate::sim) backend both implement these traits.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use adkit_core::{AdContext, AdSize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error thrown synchronously by the vendor SDK
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct MobileAdsError {
    pub code: i32,
    pub message: String,
}

impl MobileAdsError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Readiness of one mediation adapter bundled with the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdapterState {
    NotReady,
    Ready,
}

/// Per-adapter entry of [`InitializationStatus`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub state: AdapterState,
    pub description: String,
    /// Time the mediation adapter took to come up
    pub latency: Duration,
}

/// Delivered to the completion callback once the SDK has started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationStatus {
    pub adapter_statuses: BTreeMap<String, AdapterStatus>,
}

impl InitializationStatus {
    /// Mediation adapters that did not come up
    pub fn not_ready(&self) -> impl Iterator<Item = (&String, &AdapterStatus)> {
        self.adapter_statuses
            .iter()
            .filter(|(_, status)| status.state == AdapterState::NotReady)
    }
}

/// One-shot completion callback for [`MobileAds::initialize`]
pub type InitCallback = Box<dyn FnOnce(InitializationStatus) + Send + 'static>;

/// Settings applied to every subsequent request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestConfiguration {
    pub test_device_ids: Vec<String>,
}

/// Load failure reported to [`AdListener::on_ad_failed_to_load`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadAdError {
    pub code: i32,
    pub message: String,
    pub domain: String,
}

impl LoadAdError {
    pub const ERROR_CODE_INTERNAL_ERROR: i32 = 0;
    pub const ERROR_CODE_INVALID_REQUEST: i32 = 1;
    pub const ERROR_CODE_NETWORK_ERROR: i32 = 2;
    pub const ERROR_CODE_NO_FILL: i32 = 3;

    pub const DOMAIN: &'static str = "com.google.android.gms.ads";

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            domain: Self::DOMAIN.to_string(),
        }
    }

    /// Standard "no ad to show" failure
    pub fn no_fill() -> Self {
        Self::new(Self::ERROR_CODE_NO_FILL, "No fill.")
    }

    /// JSON rendering, matching the SDK's `toString()`
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

/// Targeting attached to one banner request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdRequest {
    keywords: Vec<String>,
    content_url: Option<String>,
    extras: BTreeMap<String, String>,
}

impl AdRequest {
    pub fn builder() -> AdRequestBuilder {
        AdRequestBuilder::default()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn content_url(&self) -> Option<&str> {
        self.content_url.as_deref()
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }
}

/// Builder for [`AdRequest`]
#[derive(Debug, Clone, Default)]
pub struct AdRequestBuilder {
    request: AdRequest,
}

impl AdRequestBuilder {
    pub fn add_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.request.keywords.push(keyword.into());
        self
    }

    pub fn content_url(mut self, url: impl Into<String>) -> Self {
        self.request.content_url = Some(url.into());
        self
    }

    pub fn add_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.extras.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> AdRequest {
        self.request
    }
}

/// Load outcome callbacks for one [`AdView`]
///
/// Every method defaults to a no-op, like the SDK's abstract listener class.
#[allow(unused_variables)]
pub trait AdListener: Send + Sync {
    fn on_ad_loaded(&self) {}
    fn on_ad_failed_to_load(&self, error: LoadAdError) {}
    fn on_ad_opened(&self) {}
    fn on_ad_closed(&self) {}
    fn on_ad_clicked(&self) {}
    fn on_ad_impression(&self) {}
}

/// Native banner view
pub trait AdView: Send + Sync {
    fn set_ad_size(&self, size: AdSize);
    fn ad_size(&self) -> Option<AdSize>;
    fn set_ad_unit_id(&self, ad_unit_id: &str);
    fn ad_unit_id(&self) -> Option<String>;
    fn set_hardware_acceleration(&self, enabled: bool);
    fn hardware_acceleration(&self) -> bool;
    fn set_ad_listener(&self, listener: Option<Arc<dyn AdListener>>);

    /// Start a request; the outcome arrives on the listener
    fn load_ad(&self, request: AdRequest);

    fn destroy(&self);
}

/// Entry point of the Mobile Ads SDK
pub trait MobileAds: Send + Sync {
    /// Start the SDK; `on_complete` fires once, possibly from another thread
    fn initialize(&self, ctx: &AdContext, on_complete: InitCallback) -> Result<(), MobileAdsError>;

    fn set_request_configuration(&self, config: RequestConfiguration);

    fn create_ad_view(&self, ctx: &AdContext) -> Result<Arc<dyn AdView>, MobileAdsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = AdRequest::builder()
            .add_keyword("games")
            .add_keyword("puzzle")
            .content_url("https://example.com/level/3")
            .add_extra("npa", "1")
            .build();

        assert_eq!(request.keywords(), ["games", "puzzle"]);
        assert_eq!(request.content_url(), Some("https://example.com/level/3"));
        assert_eq!(request.extras().get("npa").map(String::as_str), Some("1"));
        assert_eq!(AdRequest::builder().build(), AdRequest::default());
    }

    #[test]
    fn test_load_error_json() {
        let json = LoadAdError::no_fill().to_json();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["code"], 3);
        assert_eq!(parsed["message"], "No fill.");
        assert_eq!(parsed["domain"], LoadAdError::DOMAIN);
    }

    #[test]
    fn test_not_ready_adapters() {
        let mut status = InitializationStatus::default();
        status.adapter_statuses.insert(
            "com.google.android.gms.ads.MobileAds".to_string(),
            AdapterStatus {
                state: AdapterState::Ready,
                description: String::new(),
                latency: Duration::from_millis(12),
            },
        );
        status.adapter_statuses.insert(
            "com.example.Mediation".to_string(),
            AdapterStatus {
                state: AdapterState::NotReady,
                description: "Timeout".to_string(),
                latency: Duration::from_secs(10),
            },
        );

        let not_ready: Vec<_> = status.not_ready().map(|(name, _)| name.as_str()).collect();
        assert_eq!(not_ready, vec!["com.example.Mediation"]);
    }
}
