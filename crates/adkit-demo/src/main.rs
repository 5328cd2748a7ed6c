// # adkit-demo - Banner Ad Demo Host
//
// Thin integration layer that wires the ad networks together the way a host
// application would at startup:
//
// 1. Read configuration from environment variables
// 2. Register one adapter per configured network with a shared `AdManager`
// 3. Initialize every network and report which ones are usable
// 4. Load every configured placement and log the event streams
// 5. Wait for shutdown, then cancel pending loads and clean up
//
// Vendor SDKs are backed by the simulated vendors shipped with each provider
// crate. All ad logic lives in `adkit-core` and the provider crates.
//
// ## Configuration
//
// ### Networks
// - `ADKIT_PROVIDERS`: Comma-separated networks to register (default `google,inmobi`)
// - `ADKIT_OPTIONAL_PROVIDERS`: Networks whose failure does not make the stack unusable
// - `ADKIT_GOOGLE_APP_ID`: AdMob application id
// - `ADKIT_INMOBI_ACCOUNT_ID`: InMobi account id
// - `ADKIT_INMOBI_GDPR_APPLIES`: Whether GDPR applies (`true`/`false`)
// - `ADKIT_INMOBI_IAB_CONSENT`: IAB consent string, required when GDPR applies
//
// ### Placements
// - `ADKIT_PLACEMENTS`: Comma-separated `provider:placement` pairs
//
// ### Manager
// - `ADKIT_INIT_TIMEOUT_SECS`: Per-network initialization timeout (default 30)
// - `ADKIT_SEQUENTIAL_INIT`: Initialize networks one after another
//
// ### Simulation
// - `ADKIT_SIMULATE_FAILURE`: Networks whose simulated vendor fails to initialize
//
// ### Runtime
// - `ADKIT_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `ADKIT_RUN_SECS`: Shut down after this many seconds instead of waiting for a signal
//
// ## Example
//
// ```bash
// export ADKIT_PROVIDERS=google,inmobi
// export ADKIT_OPTIONAL_PROVIDERS=inmobi
// export ADKIT_SIMULATE_FAILURE=inmobi
// export ADKIT_RUN_SECS=5
//
// adkit-demo
// ```

use adkit_core::{
    AdContext, AdManager, AdProvider, AdResult, AdkitConfig, LoadCancelHandle, ManagerConfig,
    PlacementConfig, ProviderConfig, ProviderPolicy,
};
use anyhow::{Context, Result};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Public Google test banner unit
const DEFAULT_GOOGLE_PLACEMENT: &str = "ca-app-pub-3940256099942544/6300978111";

/// Public Google sample application id
const DEFAULT_GOOGLE_APP_ID: &str = "ca-app-pub-3940256099942544~3347511713";

const DEFAULT_INMOBI_ACCOUNT_ID: &str = "bfb3f72fbd8345978f7c37d0fa8f09a2";

const DEFAULT_INMOBI_PLACEMENT: &str = "10000060004";

/// Application id the demo presents to vendors
const APPLICATION_ID: &str = "com.mobileaddemo";

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error, including a required network that never became ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemoExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<DemoExitCode> for ExitCode {
    fn from(code: DemoExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Demo configuration
#[derive(Debug)]
struct Config {
    adkit: AdkitConfig,
    simulate_failure: Vec<AdProvider>,
    log_level: String,
    run_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let providers = parse_providers(
            &var("ADKIT_PROVIDERS").unwrap_or_else(|| "google,inmobi".to_string()),
        )
        .context("ADKIT_PROVIDERS")?;
        let optional = parse_providers(&var("ADKIT_OPTIONAL_PROVIDERS").unwrap_or_default())
            .context("ADKIT_OPTIONAL_PROVIDERS")?;
        let simulate_failure = parse_providers(&var("ADKIT_SIMULATE_FAILURE").unwrap_or_default())
            .context("ADKIT_SIMULATE_FAILURE")?;

        let policy = |provider: AdProvider| {
            if optional.contains(&provider) {
                ProviderPolicy::Optional
            } else {
                ProviderPolicy::Required
            }
        };

        let provider_configs = providers
            .iter()
            .map(|provider| match provider {
                AdProvider::Google => ProviderConfig::Google {
                    app_id: var("ADKIT_GOOGLE_APP_ID")
                        .unwrap_or_else(|| DEFAULT_GOOGLE_APP_ID.to_string()),
                    test_device_ids: Vec::new(),
                    policy: policy(AdProvider::Google),
                },
                AdProvider::InMobi => ProviderConfig::InMobi {
                    account_id: var("ADKIT_INMOBI_ACCOUNT_ID")
                        .unwrap_or_else(|| DEFAULT_INMOBI_ACCOUNT_ID.to_string()),
                    gdpr_applies: parse_bool(var("ADKIT_INMOBI_GDPR_APPLIES")),
                    consent_available: true,
                    iab_consent: var("ADKIT_INMOBI_IAB_CONSENT").unwrap_or_default(),
                    policy: policy(AdProvider::InMobi),
                },
            })
            .collect();

        let placements = match var("ADKIT_PLACEMENTS") {
            Some(raw) => parse_placements(&raw).context("ADKIT_PLACEMENTS")?,
            None => providers
                .iter()
                .map(|provider| match provider {
                    AdProvider::Google => PlacementConfig::new(*provider, DEFAULT_GOOGLE_PLACEMENT),
                    AdProvider::InMobi => PlacementConfig::new(*provider, DEFAULT_INMOBI_PLACEMENT),
                })
                .collect(),
        };

        let init_timeout_secs = match var("ADKIT_INIT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("ADKIT_INIT_TIMEOUT_SECS '{}' is not a number", raw))?,
            None => ManagerConfig::default().init_timeout_secs,
        };

        let run_secs = match var("ADKIT_RUN_SECS") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("ADKIT_RUN_SECS '{}' is not a number", raw))?,
            ),
            None => None,
        };

        Ok(Self {
            adkit: AdkitConfig {
                providers: provider_configs,
                placements,
                manager: ManagerConfig {
                    init_timeout_secs,
                    concurrent_init: !parse_bool(var("ADKIT_SEQUENTIAL_INIT")),
                },
            },
            simulate_failure,
            log_level: var("ADKIT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            run_secs,
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.adkit.validate()?;

        for provider in &self.adkit.providers {
            if !compiled_in(provider.provider()) {
                anyhow::bail!(
                    "Ad provider {} is not compiled into this build",
                    provider.provider()
                );
            }
        }

        if self.run_secs == Some(0) {
            anyhow::bail!("ADKIT_RUN_SECS must be greater than 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ADKIT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn parse_providers(raw: &str) -> Result<Vec<AdProvider>> {
    let mut providers = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let provider: AdProvider = name.parse()?;
        if !providers.contains(&provider) {
            providers.push(provider);
        }
    }
    Ok(providers)
}

fn parse_placements(raw: &str) -> Result<Vec<PlacementConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| -> Result<PlacementConfig> {
            let (provider, placement) = entry
                .split_once(':')
                .with_context(|| format!("'{}' is not in provider:placement form", entry))?;
            Ok(PlacementConfig::new(provider.trim().parse()?, placement.trim()))
        })
        .collect()
}

fn parse_bool(raw: Option<String>) -> bool {
    raw.is_some_and(|value| matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn compiled_in(provider: AdProvider) -> bool {
    match provider {
        AdProvider::Google => cfg!(feature = "google"),
        AdProvider::InMobi => cfg!(feature = "inmobi"),
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DemoExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DemoExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DemoExitCode::ConfigError.into();
    }

    info!("Starting adkit-demo");
    info!(
        "Configuration loaded: {} network(s), {} placement(s)",
        config.adkit.providers.len(),
        config.adkit.placements.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DemoExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_demo(config).await {
            error!("Demo error: {:#}", e);
            DemoExitCode::RuntimeError
        } else {
            DemoExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Register one simulated-vendor adapter per configured network
fn register_providers(manager: &AdManager, config: &Config, ctx: &AdContext) -> Result<()> {
    for provider_config in &config.adkit.providers {
        let provider = provider_config.provider();
        let fail = config.simulate_failure.contains(&provider);
        if fail {
            warn!("Simulating initialization failure for {}", provider);
        }

        match provider {
            #[cfg(feature = "google")]
            AdProvider::Google => {
                use adkit_provider_google::sim::{SimConfig, SimInit, SimMobileAds};
                use adkit_provider_google::{GoogleAdSdk, register};

                let mut sim = SimConfig::default();
                if fail {
                    sim = sim.with_init(SimInit::Throw("Simulated initialization failure".to_string()));
                }
                let sdk = GoogleAdSdk::from_config(
                    provider_config,
                    Arc::new(SimMobileAds::new(sim)),
                    ctx.clone(),
                )?;
                register(manager, sdk, provider_config.policy());
            }

            #[cfg(feature = "inmobi")]
            AdProvider::InMobi => {
                use adkit_provider_inmobi::sim::{SimConfig, SimInMobiSdk, SimInit};
                use adkit_provider_inmobi::{InMobiAdSdk, register};

                let mut sim = SimConfig::default();
                if fail {
                    sim = sim.with_init(SimInit::Fail("Simulated initialization failure".to_string()));
                }
                let sdk = InMobiAdSdk::from_config(
                    provider_config,
                    Arc::new(SimInMobiSdk::new(sim)),
                    ctx.clone(),
                )?;
                register(manager, sdk, provider_config.policy());
            }

            #[allow(unreachable_patterns)]
            other => anyhow::bail!("Ad provider {} is not compiled into this build", other),
        }
    }

    Ok(())
}

/// Run the demo
async fn run_demo(config: Config) -> Result<()> {
    let manager = Arc::new(AdManager::new(config.adkit.manager.clone()));
    let ctx = AdContext::new(APPLICATION_ID).with_test_mode(true);

    register_providers(&manager, &config, &ctx)?;

    let mut states = manager.state_stream();
    let watcher = tokio::spawn(async move {
        while let Some(snapshot) = states.next().await {
            let line: Vec<String> = snapshot
                .iter()
                .map(|(provider, state)| format!("{}={}", provider, state))
                .collect();
            debug!("Ad provider states: [{}]", line.join(", "));
        }
    });

    let report = manager.initialize_report(&ctx).await;
    info!(
        "Ready: {:?}, failed: {}",
        report.ready(),
        report.failures().len()
    );

    let mut loads = JoinSet::new();
    let mut cancel_handles: Vec<LoadCancelHandle> = Vec::new();

    for placement in config.adkit.placements.iter().filter(|p| p.enabled) {
        let mut stream = manager.load_ad(placement.provider, &placement.placement_id);
        cancel_handles.push(stream.cancel_handle());

        let provider = placement.provider;
        loads.spawn(async move {
            while let Some(event) = stream.next().await {
                match &event {
                    AdResult::Loading { placement_id } => {
                        info!("[{}] Loading {}", provider, placement_id)
                    }
                    AdResult::Success { placement_id } => {
                        info!("[{}] Ad ready for {}", provider, placement_id)
                    }
                    AdResult::Error {
                        placement_id,
                        message,
                    } => warn!("[{}] Ad failed for {}: {}", provider, placement_id, message),
                }
            }
        });
    }

    let outcome = if report.is_usable() {
        info!("Demo running; waiting for shutdown");
        wait_for_shutdown(config.run_secs.map(Duration::from_secs))
            .await
            .map(|reason| info!("Shutting down: {}", reason))
    } else {
        let failed: Vec<String> = report
            .failures()
            .into_iter()
            .map(|(provider, reason)| format!("{} ({})", provider, reason))
            .collect();
        Err(anyhow::anyhow!(
            "Required ad provider(s) not ready: {}",
            failed.join(", ")
        ))
    };

    for handle in &cancel_handles {
        handle.cancel();
    }
    while loads.join_next().await.is_some() {}

    manager.cleanup();
    watcher.abort();

    info!("adkit-demo stopped");
    outcome
}

/// Wait for SIGTERM/SIGINT, or for `run_for` to elapse when set
#[cfg(unix)]
async fn wait_for_shutdown(run_for: Option<Duration>) -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let timer = async {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = timer => "run time elapsed",
    })
}

/// Wait for CTRL-C, or for `run_for` to elapse when set
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown(run_for: Option<Duration>) -> Result<&'static str> {
    let timer = async {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => result
            .map(|()| "SIGINT")
            .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e)),
        _ = timer => Ok("run time elapsed"),
    }
}
