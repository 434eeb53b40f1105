//! Store configuration.

use std::time::Duration;

use cashvault_core::constants::DEFAULT_SAVE_DEBOUNCE_MS;
use serde::{Deserialize, Serialize};

/// Key under which the snapshot blob is stored when none is configured.
pub const DEFAULT_SNAPSHOT_KEY: &str = "cashvault.db";

/// Configuration for a [`Store`](crate::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Key of the snapshot blob in the durable byte storage.
    pub snapshot_key: String,
    /// Delay between the first save request of a burst and the write.
    pub save_debounce_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            save_debounce_ms: DEFAULT_SAVE_DEBOUNCE_MS,
        }
    }
}

impl StoreConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}
