//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the upload core:
//! - Logging and tracing initialization
//! - Upload settings with fail-fast validation
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the engine crate depends on. It
//! establishes the logging conventions and the tunable knobs (worker pool
//! size, backoff schedule bounds) used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::UploadSettings;
pub use error::{Error, Result};
