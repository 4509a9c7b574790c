//! Round-robin selection of the region warmed on the next invocation.

use crate::regions::{Region, RegionCatalog};
use crate::state::{keys, KvStore, StateError};
use std::sync::Arc;

pub struct RegionRotator {
    store: Arc<dyn KvStore>,
    regions: RegionCatalog,
}

impl RegionRotator {
    pub fn new(store: Arc<dyn KvStore>, regions: RegionCatalog) -> Self {
        Self { store, regions }
    }

    /// Last used index, or -1 when rotation has not started.
    /// Read failures and garbage values count as "not started".
    pub fn current_index(&self) -> i64 {
        match self.store.get(keys::LAST_REGION_INDEX) {
            Ok(Some(raw)) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Unparsable rotation cursor, restarting rotation");
                -1
            }),
            Ok(None) => -1,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read rotation cursor, restarting rotation");
                -1
            }
        }
    }

    /// Advance the cursor and return the region to warm.
    ///
    /// If the new cursor cannot be persisted the first region is returned so the
    /// scheduler never stalls on a broken store.
    pub fn next_region(&self) -> Region {
        let count = self.regions.len() as i64;
        let next = (self.current_index() + 1).rem_euclid(count.max(1));

        // Catalog is validated non-empty at configuration time.
        let chosen = self
            .regions
            .by_index(next as usize)
            .or_else(|| self.regions.first())
            .cloned()
            .unwrap_or_else(|| Region::new("", "", "", &[]));

        match self.store.put(keys::LAST_REGION_INDEX, &next.to_string(), None) {
            Ok(()) => {
                tracing::debug!(region = %chosen.label, index = next, "Rotated to region");
                chosen
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist rotation cursor, falling back to first region");
                self.regions.first().cloned().unwrap_or(chosen)
            }
        }
    }

    /// Restart rotation so the next call yields the first region.
    pub fn reset(&self) -> Result<(), StateError> {
        self.store.put(keys::LAST_REGION_INDEX, "-1", None)?;
        tracing::info!("Rotation cursor reset");
        Ok(())
    }
}
