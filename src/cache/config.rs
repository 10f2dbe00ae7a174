//! Cache layer configuration.
//!
//! Controls partition sizes, dispatch batching and model rebuild offload via
//! the `[cache]` table of `cachefarm.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_PARTITION_LIMIT: usize = 1_000;
const DEFAULT_RUNTIME_LIMIT: usize = 5_000;
const DEFAULT_DISPATCH_BATCH_LIMIT: usize = 500;

/// Cache configuration from `cachefarm.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries per isolated repository partition.
    pub partition_limit: usize,
    /// Maximum entries in the runtime (derived) cache.
    pub runtime_limit: usize,
    /// Maximum events drained from the event bus per dispatch batch.
    pub dispatch_batch_limit: usize,
    /// Merge content/media/member type changed events raised together.
    pub coalesce_type_changes: bool,
    /// Run snapshot type notifications on the background model rebuild worker.
    pub background_model_rebuild: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            partition_limit: DEFAULT_PARTITION_LIMIT,
            runtime_limit: DEFAULT_RUNTIME_LIMIT,
            dispatch_batch_limit: DEFAULT_DISPATCH_BATCH_LIMIT,
            coalesce_type_changes: true,
            background_model_rebuild: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            partition_limit: settings.partition_limit.get(),
            runtime_limit: settings.runtime_limit.get(),
            dispatch_batch_limit: settings.dispatch_batch_limit.get(),
            coalesce_type_changes: settings.coalesce_type_changes,
            background_model_rebuild: settings.background_model_rebuild,
        }
    }
}

impl CacheConfig {
    /// Returns the partition limit as NonZeroUsize, clamping to 1 if zero.
    pub fn partition_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.partition_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the runtime limit as NonZeroUsize, clamping to 1 if zero.
    pub fn runtime_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.runtime_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn dispatch_batch_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.dispatch_batch_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
