//! Pipeline configuration, loadable from `LEAD_*` environment variables

use envconfig::Envconfig;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Result;
use crate::resilience::{Backoff, CircuitPolicy, RetryPolicy};
use crate::validate::ValidationConfig;

#[derive(Envconfig, Debug, Clone)]
pub struct PipelineConfig {
    /// Log the would-be queue message instead of publishing it
    #[envconfig(from = "LEAD_DRY_RUN", default = "false")]
    pub dry_run: bool,

    /// Use the generic parser for unrecognised emails instead of rejecting them
    #[envconfig(from = "LEAD_FALLBACK_PARSING", default = "true")]
    pub fallback_parsing: bool,

    #[envconfig(from = "LEAD_MAX_EMAIL_BYTES", default = "10485760")]
    pub max_email_bytes: usize,

    /// Bodies shorter than this are rejected; 0 disables the check
    #[envconfig(from = "LEAD_MIN_CONTENT_CHARS", default = "0")]
    pub min_content_chars: usize,

    #[envconfig(nested = true)]
    pub retry: RetryConfig,

    #[envconfig(nested = true)]
    pub circuit: CircuitConfig,

    #[envconfig(nested = true)]
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            fallback_parsing: true,
            max_email_bytes: 10 * 1024 * 1024,
            min_content_chars: 0,
            retry: RetryConfig::default(),
            circuit: CircuitConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::init_from_env()?)
    }
}

#[derive(Envconfig, Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per boundary call, including the first
    #[envconfig(from = "LEAD_RETRY_MAX_ATTEMPTS", default = "3")]
    pub max_attempts: u32,

    #[envconfig(from = "LEAD_RETRY_BASE_DELAY_MS", default = "100")]
    pub base_delay: EnvMsDuration,

    #[envconfig(from = "LEAD_RETRY_MAX_DELAY_MS", default = "5000")]
    pub max_delay: EnvMsDuration,

    /// `fixed`, `exponential` or `exponential_jitter`
    #[envconfig(from = "LEAD_RETRY_BACKOFF", default = "exponential_jitter")]
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(RetryPolicy::default())
    }
}

impl From<RetryPolicy> for RetryConfig {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            base_delay: EnvMsDuration(policy.base_delay),
            max_delay: EnvMsDuration(policy.max_delay),
            backoff: policy.backoff,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay.0,
            max_delay: self.max_delay.0,
            backoff: self.backoff,
        }
    }
}

#[derive(Envconfig, Debug, Clone)]
pub struct CircuitConfig {
    #[envconfig(from = "LEAD_CIRCUIT_FAILURE_THRESHOLD", default = "5")]
    pub failure_threshold: u32,

    #[envconfig(from = "LEAD_CIRCUIT_COOLDOWN_MS", default = "30000")]
    pub cooldown: EnvMsDuration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self::from(CircuitPolicy::default())
    }
}

impl From<CircuitPolicy> for CircuitConfig {
    fn from(policy: CircuitPolicy) -> Self {
        Self {
            failure_threshold: policy.failure_threshold,
            cooldown: EnvMsDuration(policy.cooldown),
        }
    }
}

impl CircuitConfig {
    #[must_use]
    pub const fn policy(&self) -> CircuitPolicy {
        CircuitPolicy {
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown.0,
        }
    }
}

/// Duration read from an integer number of milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvMsDuration(pub Duration);

#[derive(Debug, PartialEq, Eq)]
pub struct ParseEnvMsDurationError;

impl FromStr for EnvMsDuration {
    type Err = ParseEnvMsDurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let ms = s.trim().parse::<u64>().map_err(|_| ParseEnvMsDurationError)?;
        Ok(Self(Duration::from_millis(ms)))
    }
}

impl From<EnvMsDuration> for Duration {
    fn from(value: EnvMsDuration) -> Self {
        value.0
    }
}
