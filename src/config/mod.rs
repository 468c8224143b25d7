//! Deployment Configuration Module
//!
//! Provides site configuration loaded from TOML files, replacing all
//! hardcoded pipeline constants with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `WATCHPOST_CONFIG` environment variable (path to TOML file)
//! 2. `watchpost.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`WatchConfig`] is an explicit immutable value: it is built
//! once in `main` and handed to each component at construction. There is no
//! process-global configuration state.

mod watch_config;
pub mod defaults;

pub use watch_config::*;
