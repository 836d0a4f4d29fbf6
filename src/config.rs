//! Run configuration.
//!
//! A [`ProtocolConfig`] can be built in code with the `with_*` methods or
//! loaded from TOML:
//!
//! ```toml
//! key_length = 64
//! noise_rate = 0.05
//! await_timeout_ms = 2000
//!
//! [acceptance]
//! threshold = 11.0
//! inclusive = true
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::protocols::bb84::AcceptancePolicy;

/// Number of symbols sent per requested key bit.
pub const OVERSAMPLING_FACTOR: usize = 3;

/// Fraction of basis-matched positions disclosed for error estimation.
pub const ESTIMATION_FRACTION: f64 = 0.20;

/// Parameters shared by both parties of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProtocolConfig {
    /// Requested key length in bits.
    pub key_length: usize,
    /// Depolarizing probability applied to every received symbol.
    pub noise_rate: f64,
    /// Probability that an eavesdropper measures and resends a symbol.
    pub intercept_rate: f64,
    /// QBER acceptance rule applied by the responder.
    pub acceptance: AcceptancePolicy,
    /// Discard instead of returning a key shorter than `key_length`.
    pub strict_key_length: bool,
    /// Deadline for every await on a link.
    pub await_timeout_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            key_length: 32,
            noise_rate: 0.0,
            intercept_rate: 0.0,
            acceptance: AcceptancePolicy::default(),
            strict_key_length: true,
            await_timeout_ms: 5_000,
        }
    }
}

impl ProtocolConfig {
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    pub fn with_noise_rate(mut self, noise_rate: f64) -> Self {
        self.noise_rate = noise_rate;
        self
    }

    pub fn with_intercept_rate(mut self, intercept_rate: f64) -> Self {
        self.intercept_rate = intercept_rate;
        self
    }

    pub fn with_acceptance(mut self, acceptance: AcceptancePolicy) -> Self {
        self.acceptance = acceptance;
        self
    }

    pub fn with_strict_key_length(mut self, strict: bool) -> Self {
        self.strict_key_length = strict;
        self
    }

    pub fn with_await_timeout(mut self, timeout: Duration) -> Self {
        self.await_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Symbols transmitted per run.
    pub fn symbol_count(&self) -> usize {
        self.key_length * OVERSAMPLING_FACTOR
    }

    pub fn await_timeout(&self) -> Duration {
        Duration::from_millis(self.await_timeout_ms)
    }

    /// Checks every field is in range.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key_length == 0 {
            return Err(ConfigError::Invalid("key_length must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.noise_rate) {
            return Err(ConfigError::Invalid(format!(
                "noise_rate {} outside [0, 1]",
                self.noise_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.intercept_rate) {
            return Err(ConfigError::Invalid(format!(
                "intercept_rate {} outside [0, 1]",
                self.intercept_rate
            )));
        }
        if !(0.0..=100.0).contains(&self.acceptance.threshold) {
            return Err(ConfigError::Invalid(format!(
                "acceptance threshold {} outside [0, 100]",
                self.acceptance.threshold
            )));
        }
        if self.await_timeout_ms == 0 {
            return Err(ConfigError::Invalid("await_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Parses and validates a TOML document. Missing fields take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
