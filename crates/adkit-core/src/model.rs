//! Result and state model
//!
//! Closed sum types shared by every adapter and the manager:
//! - [`AdProvider`]: the known ad networks
//! - [`AdState`]: per-provider readiness
//! - [`AdResult`]: one event of a load stream

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Snapshot of every registered provider's readiness
pub type StateMap = BTreeMap<AdProvider, AdState>;

/// Known ad networks
///
/// The set is closed: providers are never created or destroyed at runtime,
/// which is why they can key every registry in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdProvider {
    /// Google Mobile Ads
    Google,
    /// InMobi
    InMobi,
}

impl AdProvider {
    /// Every known provider, in registry order
    pub const ALL: [AdProvider; 2] = [AdProvider::Google, AdProvider::InMobi];

    /// Stable lowercase identifier (used in config and logs)
    pub fn as_str(&self) -> &'static str {
        match self {
            AdProvider::Google => "google",
            AdProvider::InMobi => "inmobi",
        }
    }
}

impl fmt::Display for AdProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdProvider {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" | "admob" => Ok(AdProvider::Google),
            "inmobi" => Ok(AdProvider::InMobi),
            other => Err(crate::Error::config(format!("Unknown ad provider: {}", other))),
        }
    }
}

/// Readiness of one provider
///
/// Within one initialization attempt the state only moves forward:
/// `Idle → Initializing → {Ready | Error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum AdState {
    /// Registered, not yet initialized
    Idle,
    /// Vendor bootstrap in flight
    Initializing,
    /// Vendor bootstrap succeeded
    Ready,
    /// Vendor bootstrap failed
    Error(String),
}

impl AdState {
    /// `true` only for [`AdState::Ready`]
    pub fn is_ready(&self) -> bool {
        matches!(self, AdState::Ready)
    }

    /// `true` for the two states an initialization attempt ends in
    pub fn is_settled(&self) -> bool {
        matches!(self, AdState::Ready | AdState::Error(_))
    }

    /// Failure message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            AdState::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for AdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdState::Idle => f.write_str("idle"),
            AdState::Initializing => f.write_str("initializing"),
            AdState::Ready => f.write_str("ready"),
            AdState::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// One event of a load stream
///
/// A load yields exactly one `Loading` and then exactly one terminal
/// (`Success` or `Error`) event. The only exception is the fail-fast path of
/// an uninitialized adapter, which yields a lone `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdResult {
    /// Request issued to the vendor
    Loading {
        /// Placement being loaded
        placement_id: String,
    },
    /// Vendor reported a filled, displayable ad
    Success {
        /// Placement that loaded
        placement_id: String,
    },
    /// Load failed or could not be attempted
    Error {
        /// Placement that failed
        placement_id: String,
        /// Failure description, verbatim from the vendor where possible
        message: String,
    },
}

impl AdResult {
    /// Create a `Loading` event
    pub fn loading(placement_id: impl Into<String>) -> Self {
        Self::Loading {
            placement_id: placement_id.into(),
        }
    }

    /// Create a `Success` event
    pub fn success(placement_id: impl Into<String>) -> Self {
        Self::Success {
            placement_id: placement_id.into(),
        }
    }

    /// Create an `Error` event
    pub fn error(placement_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            placement_id: placement_id.into(),
            message: message.into(),
        }
    }

    /// Placement this event belongs to
    pub fn placement_id(&self) -> &str {
        match self {
            AdResult::Loading { placement_id }
            | AdResult::Success { placement_id }
            | AdResult::Error { placement_id, .. } => placement_id,
        }
    }

    /// `true` for `Success` and `Error`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AdResult::Loading { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("google".parse::<AdProvider>().unwrap(), AdProvider::Google);
        assert_eq!(" AdMob ".parse::<AdProvider>().unwrap(), AdProvider::Google);
        assert_eq!("InMobi".parse::<AdProvider>().unwrap(), AdProvider::InMobi);
        assert!("facebook".parse::<AdProvider>().is_err());
    }

    #[test]
    fn test_provider_serde_is_lowercase() {
        let json = serde_json::to_string(&AdProvider::InMobi).unwrap();
        assert_eq!(json, "\"inmobi\"");
    }

    #[test]
    fn test_state_predicates() {
        assert!(AdState::Ready.is_ready());
        assert!(!AdState::Initializing.is_ready());
        assert!(!AdState::Error("x".into()).is_ready());

        assert!(AdState::Ready.is_settled());
        assert!(AdState::Error("x".into()).is_settled());
        assert!(!AdState::Idle.is_settled());

        assert_eq!(AdState::Error("boom".into()).error_message(), Some("boom"));
        assert_eq!(AdState::Idle.error_message(), None);
    }

    #[test]
    fn test_result_accessors() {
        let loading = AdResult::loading("unit-1");
        let failed = AdResult::error("unit-1", "no fill");

        assert_eq!(loading.placement_id(), "unit-1");
        assert!(!loading.is_terminal());
        assert!(failed.is_terminal());
        assert!(AdResult::success("unit-1").is_terminal());
    }
}
