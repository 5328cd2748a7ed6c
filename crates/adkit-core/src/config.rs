//! Configuration types for the ad lifecycle manager
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::model::AdProvider;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdkitConfig {
    /// Ad networks to register
    pub providers: Vec<ProviderConfig>,

    /// Ad slots to load once the networks are up
    #[serde(default)]
    pub placements: Vec<PlacementConfig>,

    /// Optional manager settings
    #[serde(default)]
    pub manager: ManagerConfig,
}

impl AdkitConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.providers.is_empty() {
            return Err(crate::Error::config("No ad providers configured"));
        }

        for (index, provider) in self.providers.iter().enumerate() {
            provider.validate()?;

            if self.providers[..index]
                .iter()
                .any(|earlier| earlier.provider() == provider.provider())
            {
                return Err(crate::Error::config(format!(
                    "Provider {} is configured more than once",
                    provider.provider()
                )));
            }
        }

        for placement in &self.placements {
            placement.validate()?;

            if !self.providers.iter().any(|p| p.provider() == placement.provider) {
                return Err(crate::Error::config(format!(
                    "Placement {} refers to provider {} which is not configured",
                    placement.placement_id, placement.provider
                )));
            }
        }

        self.manager.validate()
    }

    /// Configuration for one provider, if present
    pub fn provider(&self, provider: AdProvider) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider() == provider)
    }
}

/// Whether a provider failing to initialize makes the whole ad stack unusable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPolicy {
    /// The stack is unusable without this provider
    #[default]
    Required,
    /// The stack carries on without this provider
    Optional,
}

/// Ad network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Mobile Ads
    Google {
        /// AdMob application id (`ca-app-pub-...~...`)
        app_id: String,
        /// Device ids that always receive test creatives
        #[serde(default)]
        test_device_ids: Vec<String>,
        /// Failure policy
        #[serde(default)]
        policy: ProviderPolicy,
    },

    /// InMobi
    #[serde(rename = "inmobi")]
    InMobi {
        /// InMobi account id
        account_id: String,
        /// Whether GDPR applies to this user
        #[serde(default)]
        gdpr_applies: bool,
        /// Whether the user's consent string is available
        #[serde(default = "default_consent_available")]
        consent_available: bool,
        /// IAB TCF consent string
        #[serde(default)]
        iab_consent: String,
        /// Failure policy
        #[serde(default)]
        policy: ProviderPolicy,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Google { app_id, .. } => {
                if app_id.is_empty() {
                    return Err(crate::Error::config("Google app id cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::InMobi {
                account_id,
                gdpr_applies,
                iab_consent,
                ..
            } => {
                if account_id.is_empty() {
                    return Err(crate::Error::config("InMobi account id cannot be empty"));
                }
                if *gdpr_applies && iab_consent.is_empty() {
                    return Err(crate::Error::config(
                        "InMobi IAB consent string is required when GDPR applies",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Provider this configuration is for
    pub fn provider(&self) -> AdProvider {
        match self {
            ProviderConfig::Google { .. } => AdProvider::Google,
            ProviderConfig::InMobi { .. } => AdProvider::InMobi,
        }
    }

    /// Failure policy
    pub fn policy(&self) -> ProviderPolicy {
        match self {
            ProviderConfig::Google { policy, .. } | ProviderConfig::InMobi { policy, .. } => *policy,
        }
    }
}

/// Ad slot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Network serving this slot
    pub provider: AdProvider,

    /// Vendor-assigned placement / ad unit id
    pub placement_id: String,

    /// Whether this slot is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl PlacementConfig {
    /// Create a new placement configuration
    pub fn new(provider: AdProvider, placement_id: impl Into<String>) -> Self {
        Self {
            provider,
            placement_id: placement_id.into(),
            enabled: true,
        }
    }

    /// Enable or disable the placement
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the placement configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.placement_id.trim().is_empty() {
            return Err(crate::Error::config(format!(
                "Placement id for {} cannot be empty",
                self.provider
            )));
        }
        Ok(())
    }
}

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Upper bound on one provider's vendor bootstrap (in seconds)
    ///
    /// A vendor that never fires its completion callback ends up in
    /// `AdState::Error` after this long instead of `Initializing` forever.
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,

    /// Initialize all providers at once (`true`) or one after another
    #[serde(default = "default_concurrent_init")]
    pub concurrent_init: bool,
}

impl ManagerConfig {
    /// Validate the manager configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.init_timeout_secs == 0 {
            return Err(crate::Error::config("Initialization timeout must be > 0"));
        }
        Ok(())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            init_timeout_secs: default_init_timeout_secs(),
            concurrent_init: default_concurrent_init(),
        }
    }
}

fn default_init_timeout_secs() -> u64 {
    30
}

fn default_concurrent_init() -> bool {
    true
}

fn default_consent_available() -> bool {
    true
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google() -> ProviderConfig {
        ProviderConfig::Google {
            app_id: "ca-app-pub-3940256099942544~3347511713".to_string(),
            test_device_ids: Vec::new(),
            policy: ProviderPolicy::Required,
        }
    }

    fn inmobi() -> ProviderConfig {
        ProviderConfig::InMobi {
            account_id: "bfb3f72fbd8345978f7c37d0fa8f09a2".to_string(),
            gdpr_applies: false,
            consent_available: true,
            iab_consent: String::new(),
            policy: ProviderPolicy::Optional,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = AdkitConfig {
            providers: vec![google(), inmobi()],
            placements: vec![
                PlacementConfig::new(AdProvider::Google, "ca-app-pub-3940256099942544/6300978111"),
                PlacementConfig::new(AdProvider::InMobi, "10000033117"),
            ],
            manager: ManagerConfig::default(),
        };

        assert!(config.validate().is_ok());
        assert_eq!(config.provider(AdProvider::InMobi).unwrap().policy(), ProviderPolicy::Optional);
    }

    #[test]
    fn test_empty_providers_rejected() {
        assert!(AdkitConfig::new().validate().is_err());
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let config = AdkitConfig {
            providers: vec![google(), google()],
            ..AdkitConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_placement_for_unconfigured_provider_rejected() {
        let config = AdkitConfig {
            providers: vec![google()],
            placements: vec![PlacementConfig::new(AdProvider::InMobi, "10000033117")],
            manager: ManagerConfig::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gdpr_requires_consent_string() {
        let config = ProviderConfig::InMobi {
            account_id: "acct".to_string(),
            gdpr_applies: true,
            consent_available: true,
            iab_consent: String::new(),
            policy: ProviderPolicy::Required,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = serde_json::json!({
            "providers": [
                { "type": "google", "app_id": "app" },
                { "type": "inmobi", "account_id": "acct", "policy": "optional" }
            ]
        });

        let config: AdkitConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.manager, ManagerConfig::default());
        assert_eq!(config.providers[0].policy(), ProviderPolicy::Required);
        assert_eq!(config.providers[1].policy(), ProviderPolicy::Optional);
        assert!(config.validate().is_ok());
    }
}
