//! # Upload Settings
//!
//! Tunable knobs for the upload engine, constructed through a validating
//! builder.
//!
//! ## Overview
//!
//! `UploadSettings` holds the concurrency and backoff parameters shared by
//! the orchestrator and the backoff classifier. Validation is fail-fast: a
//! zero-sized worker pool or an inverted backoff schedule is rejected at
//! build time rather than surfacing as a hung or hot-looping upload run.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::UploadSettings;
//!
//! let settings = UploadSettings::builder()
//!     .max_concurrent_uploads(8)
//!     .initial_backoff_ms(500)
//!     .max_backoff_ms(60_000)
//!     .max_retries(10)
//!     .build()
//!     .expect("valid settings");
//! assert_eq!(settings.max_concurrent_uploads, 8);
//! ```

use crate::error::{Error, Result};

/// Settings for the upload engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    /// Maximum concurrent remote upload calls; the sole backpressure knob.
    pub max_concurrent_uploads: usize,

    /// First backoff delay after a retryable failure, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Ceiling on any single backoff delay, in milliseconds.
    pub max_backoff_ms: u64,

    /// Consecutive retryable failures tolerated before giving up. The count
    /// is reset by any successful remote call.
    pub max_retries: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 4,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 120_000,
            max_retries: 10,
        }
    }
}

impl UploadSettings {
    /// Creates a new builder for constructing `UploadSettings`.
    pub fn builder() -> UploadSettingsBuilder {
        UploadSettingsBuilder::default()
    }

    /// Validates the settings and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_uploads == 0 {
            return Err(Error::Config(
                "max_concurrent_uploads must be greater than 0".to_string(),
            ));
        }

        if self.initial_backoff_ms == 0 {
            return Err(Error::Config(
                "initial_backoff_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(Error::Config(format!(
                "max_backoff_ms ({}) is below initial_backoff_ms ({})",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }

        if self.max_retries == 0 {
            return Err(Error::Config(
                "max_retries must be greater than 0; \
                 retryable failures would never be retried"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`UploadSettings`].
#[derive(Debug, Default)]
pub struct UploadSettingsBuilder {
    max_concurrent_uploads: Option<usize>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    max_retries: Option<u32>,
}

impl UploadSettingsBuilder {
    /// Sets the upload worker pool size.
    pub fn max_concurrent_uploads(mut self, count: usize) -> Self {
        self.max_concurrent_uploads = Some(count);
        self
    }

    /// Sets the first backoff delay in milliseconds.
    pub fn initial_backoff_ms(mut self, delay_ms: u64) -> Self {
        self.initial_backoff_ms = Some(delay_ms);
        self
    }

    /// Sets the backoff delay ceiling in milliseconds.
    pub fn max_backoff_ms(mut self, delay_ms: u64) -> Self {
        self.max_backoff_ms = Some(delay_ms);
        self
    }

    /// Sets the consecutive-failure budget.
    pub fn max_retries(mut self, count: u32) -> Self {
        self.max_retries = Some(count);
        self
    }

    /// Builds the final `UploadSettings`, validating the result.
    pub fn build(self) -> Result<UploadSettings> {
        let defaults = UploadSettings::default();
        let settings = UploadSettings {
            max_concurrent_uploads: self
                .max_concurrent_uploads
                .unwrap_or(defaults.max_concurrent_uploads),
            initial_backoff_ms: self
                .initial_backoff_ms
                .unwrap_or(defaults.initial_backoff_ms),
            max_backoff_ms: self.max_backoff_ms.unwrap_or(defaults.max_backoff_ms),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
        };
        settings.validate()?;
        Ok(settings)
    }
}
