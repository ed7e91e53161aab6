//! Atlas Configuration Module
//!
//! Runtime configuration loaded from TOML, with built-in defaults for every
//! value.
//!
//! ## Loading Order
//!
//! 1. `ATLAS_CONFIG` environment variable (path to TOML file)
//! 2. `atlas_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(AtlasConfig::load());
//! let scope = config::get().state.deletion_scope;
//! ```

mod atlas_config;
pub mod defaults;

pub use atlas_config::*;

use std::sync::OnceLock;

/// Global configuration, initialized once at startup.
static ATLAS_CONFIG: OnceLock<AtlasConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: AtlasConfig) {
    if ATLAS_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration, or the built-in defaults when `init()` has
/// not run (tests, embedding).
pub fn get() -> &'static AtlasConfig {
    ATLAS_CONFIG.get_or_init(AtlasConfig::default)
}
