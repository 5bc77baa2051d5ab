//! Process-wide access to the loaded configuration.
//!
//! Startup publishes the config once; anything in the process can then read
//! it without threading a handle through. Readers get an `Arc` snapshot, so a
//! later `publish` never invalidates what they already hold.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::config::schema::KitConfig;

static CURRENT: ArcSwapOption<KitConfig> = ArcSwapOption::const_empty();

/// Make `config` the process-wide configuration.
pub fn publish(config: Arc<KitConfig>) {
    CURRENT.store(Some(config));
}

/// The published configuration, if startup has loaded one.
pub fn current() -> Option<Arc<KitConfig>> {
    CURRENT.load_full()
}
