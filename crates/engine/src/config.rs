use serde::{Deserialize, Serialize};

/// Tunables of the engine. Every field has a default, so a partial
/// `[engine]` section in the settings file is enough.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transactions requested per gateway page.
    pub page_size: u32,
    /// Safety ceiling on pages fetched in one run.
    pub max_pages: u32,
    /// Range of a sync with no explicit `from`.
    pub default_lookback_days: i64,
    /// Sync results kept per company; older ones are evicted.
    pub sync_history_cap: u64,
    /// Concurrent tasks in bulk syncs and monthly batches.
    pub sync_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 100,
            default_lookback_days: 30,
            sync_history_cap: 100,
            sync_workers: 4,
        }
    }
}
