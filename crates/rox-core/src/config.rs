use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::breaker::BreakerSettings;
use crate::retry::{RetryPolicy, RetryPolicyBuilder};

/// Retry policy parameters for one subsystem (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Linear increase per further attempt, in milliseconds.
    #[serde(default)]
    pub step_ms: u64,
    /// Hard cap on any single delay, in milliseconds (at most 1000).
    pub max_delay_ms: u64,
    /// Symmetric jitter bound, in milliseconds.
    #[serde(default)]
    pub jitter_ms: u64,
    /// Extra codes treated as retryable (e.g. "http-429").
    #[serde(default)]
    pub retryable_codes: Vec<String>,
    /// Codes never retried; wins over `retryable_codes`.
    #[serde(default)]
    pub non_retryable_codes: Vec<String>,
}

impl RetryConfig {
    /// Validate and convert into an immutable policy.
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        let mut builder = RetryPolicy::builder()
            .max_attempts(self.max_attempts)
            .base_delay_ms(self.base_delay_ms)
            .step_ms(self.step_ms)
            .max_delay_ms(self.max_delay_ms)
            .jitter_ms(self.jitter_ms);
        for code in &self.retryable_codes {
            builder = builder.retryable(code.clone());
        }
        for code in &self.non_retryable_codes {
            builder = builder.non_retryable(code.clone());
        }
        Ok(builder.build()?)
    }
}

impl From<&RetryPolicy> for RetryConfig {
    fn from(p: &RetryPolicy) -> Self {
        let mut retryable: Vec<String> = p.retryable_codes().iter().cloned().collect();
        let mut non_retryable: Vec<String> = p.non_retryable_codes().iter().cloned().collect();
        retryable.sort();
        non_retryable.sort();
        Self {
            max_attempts: p.max_attempts(),
            base_delay_ms: p.base_delay_ms(),
            step_ms: p.step_ms(),
            max_delay_ms: p.max_delay_ms(),
            jitter_ms: p.jitter_ms(),
            retryable_codes: retryable,
            non_retryable_codes: non_retryable,
        }
    }
}

/// Circuit breaker parameters shared by all targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures before a target is short-circuited.
    pub failure_threshold: u32,
    /// How long an open target stays open before a probe is allowed, in milliseconds.
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 10_000,
        }
    }
}

impl BreakerConfig {
    pub fn to_settings(&self) -> Result<BreakerSettings> {
        Ok(BreakerSettings::new(
            self.failure_threshold,
            Duration::from_millis(self.cooldown_ms),
        )?)
    }
}

/// Per-subsystem policy overrides; missing entries use the built-in presets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoliciesConfig {
    #[serde(default)]
    pub file: Option<RetryConfig>,
    #[serde(default)]
    pub network: Option<RetryConfig>,
    #[serde(default)]
    pub cache: Option<RetryConfig>,
}

/// Global configuration loaded from `~/.config/rox/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoxConfig {
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub policies: PoliciesConfig,
}

/// Validated policies ready for the executor.
#[derive(Debug, Clone)]
pub struct EffectivePolicies {
    pub file: RetryPolicy,
    pub network: RetryPolicy,
    pub cache: RetryPolicy,
    pub breaker: BreakerSettings,
}

impl RoxConfig {
    /// Validate every section, falling back to presets for missing ones.
    pub fn effective(&self) -> Result<EffectivePolicies> {
        Ok(EffectivePolicies {
            file: resolve(&self.policies.file, RetryPolicy::file_ops()).context("[policies.file]")?,
            network: resolve(&self.policies.network, RetryPolicy::network_fetch())
                .context("[policies.network]")?,
            cache: resolve(&self.policies.cache, RetryPolicy::cache_refresh())
                .context("[policies.cache]")?,
            breaker: self.breaker.to_settings().context("[breaker]")?,
        })
    }
}

fn resolve(section: &Option<RetryConfig>, preset: RetryPolicy) -> Result<RetryPolicy> {
    match section {
        Some(cfg) => cfg.to_policy(),
        None => Ok(RetryPolicyBuilder::from_policy(preset).build()?),
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rox")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RoxConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RoxConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<RoxConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: RoxConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}
