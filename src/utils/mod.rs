//! Utilities Module
//!
//! Settings and the redacting logger shared across the crate.

pub mod config;
pub mod logging;

pub use config::{OfflineSettings, SettingsLevel};
pub use logging::{LogEntry, LogLevel};
