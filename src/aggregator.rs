//! Persistence and read paths for run results, per-region status and error records.

use crate::config::Config;
use crate::models::{ErrorRecord, HistoryReport, HistoryTotals, RegionStatus, RunResult, StatusReport};
use crate::progress::ProgressCursor;
use crate::regions::RegionCatalog;
use crate::state::{get_json, keys, now_millis, put_json, KvStore, StateError};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub struct ResultStore {
    store: Arc<dyn KvStore>,
    regions: RegionCatalog,
    progress: ProgressCursor,
}

impl ResultStore {
    pub fn new(store: Arc<dyn KvStore>, regions: RegionCatalog) -> Self {
        Self {
            progress: ProgressCursor::new(Arc::clone(&store)),
            store,
            regions,
        }
    }

    pub fn regions(&self) -> &RegionCatalog {
        &self.regions
    }

    /// Append the run under a timestamped key and repoint the region's latest snapshot.
    /// Runs landing on the same millisecond take the next free one.
    pub fn store(&self, result: &RunResult) -> Result<(), StateError> {
        let mut millis = result.epoch_millis();
        let mut key = keys::results(&result.region, millis);
        while self.store.get(&key)?.is_some() {
            millis += 1;
            key = keys::results(&result.region, millis);
        }

        put_json(
            self.store.as_ref(),
            &key,
            result,
            Some(Duration::from_secs(Config::RESULT_RETENTION_SECS)),
        )?;
        put_json(self.store.as_ref(), &keys::latest(&result.region), result, None)?;
        tracing::debug!(key = %key, "Stored run result");
        Ok(())
    }

    /// Latest snapshot and cursor position for every configured region.
    /// A region whose snapshot cannot be read reports `stats: null`.
    pub fn get_status(&self) -> StatusReport {
        let mut regions = BTreeMap::new();

        for region in self.regions.iter() {
            let stats: Option<RunResult> =
                match get_json(self.store.as_ref(), &keys::latest(&region.label)) {
                    Ok(stats) => stats,
                    Err(e) => {
                        tracing::warn!(region = %region.label, error = %e, "Failed to read latest result");
                        None
                    }
                };

            let offset = self.progress.offset(&region.label);
            let current_progress = match &stats {
                Some(latest) => format!("{}/{}", offset, latest.total_urls),
                None => offset.to_string(),
            };

            regions.insert(
                region.label.clone(),
                RegionStatus {
                    stats,
                    current_progress,
                    representative_code: region.representative_code.clone(),
                },
            );
        }

        StatusReport {
            last_updated: Utc::now(),
            regions,
        }
    }

    /// Newest `limit` results per region (all regions when `region` is None),
    /// merged newest-first with cross-run totals. Unreadable entries are skipped.
    pub fn get_history(&self, region: Option<&str>, limit: usize) -> HistoryReport {
        let queried: Vec<String> = match region {
            Some(label) => vec![label.to_string()],
            None => self.regions.labels().map(str::to_string).collect(),
        };

        let mut results = Vec::new();
        for label in &queried {
            let prefix = keys::results_prefix(label);
            let found = match self.store.list_keys(&prefix) {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(region = %label, error = %e, "Failed to list results");
                    continue;
                }
            };

            let mut region_keys: Vec<String> = found
                .into_iter()
                .filter(|key| keys::has_timestamp_suffix(key, &prefix))
                .collect();
            // Timestamps are fixed-width millis, so lexical order is chronological.
            region_keys.sort();
            let skip = region_keys.len().saturating_sub(limit);

            for key in region_keys.into_iter().skip(skip) {
                match get_json::<RunResult>(self.store.as_ref(), &key) {
                    Ok(Some(result)) => results.push(result),
                    Ok(None) => {}
                    Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable result"),
                }
            }
        }

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        HistoryReport {
            totals: HistoryTotals::from_results(&results),
            results,
            regions: queried,
        }
    }

    /// Best-effort error record with short retention; write failures are only logged.
    /// Records landing on the same millisecond take the next free one.
    pub fn log_error(&self, region: &str, message: &str, stack: Option<String>) {
        let record = ErrorRecord {
            region: region.to_string(),
            message: message.to_string(),
            stack,
            timestamp: Utc::now(),
        };
        let mut millis = now_millis();
        let mut key = keys::error(region, millis);
        while matches!(self.store.get(&key), Ok(Some(_))) {
            millis += 1;
            key = keys::error(region, millis);
        }

        if let Err(e) = put_json(
            self.store.as_ref(),
            &key,
            &record,
            Some(Duration::from_secs(Config::ERROR_RETENTION_SECS)),
        ) {
            tracing::warn!(region = %region, error = %e, "Failed to record error");
        }
    }

    /// Most recent error records across all regions, newest first.
    pub fn recent_errors(&self, limit: usize) -> Vec<ErrorRecord> {
        let found = match self.store.list_keys("error_") {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list error records");
                return Vec::new();
            }
        };

        let mut records: Vec<ErrorRecord> = found
            .iter()
            .filter_map(|key| match get_json::<ErrorRecord>(self.store.as_ref(), key) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping unreadable error record");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        records
    }
}
