use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cache outcome reported by the edge for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Expired,
    /// Anything else, including a missing header (DYNAMIC, BYPASS, REVALIDATED...).
    Other,
}

impl CacheStatus {
    pub fn from_header(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("HIT") => CacheStatus::Hit,
            Some("MISS") => CacheStatus::Miss,
            Some("EXPIRED") => CacheStatus::Expired,
            _ => CacheStatus::Other,
        }
    }
}

/// Whether a run warmed a full page or a small smoke-test slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Full,
    Test,
}

/// Outcome of warming a single URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlDetail {
    pub url: String,
    pub status: Option<u16>,
    pub cache_status: Option<CacheStatus>,
    /// Raw trace header as received.
    pub trace: Option<String>,
    pub target_location: String,
    pub observed_location: Option<String>,
    pub location_match: bool,
    pub region_match: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Immutable summary of one warming invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub region: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub mode: RunMode,
    /// Catalog size when the run started.
    pub total_urls: usize,
    pub start_offset: usize,
    pub urls_processed: usize,
    pub cycle_complete: bool,

    pub success: u64,
    pub failed: u64,

    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_expired: u64,
    pub cache_other: u64,
    pub hit_rate: String,

    pub target_location: String,
    pub location_matches: u64,
    pub location_mismatches: u64,
    pub location_match_rate: String,
    pub location_breakdown: BTreeMap<String, u64>,

    pub region_matches: Option<u64>,
    pub region_mismatches: Option<u64>,
    pub region_match_rate: Option<String>,

    #[serde(default)]
    pub details: Vec<UrlDetail>,
}

impl RunResult {
    pub fn epoch_millis(&self) -> u64 {
        self.timestamp.timestamp_millis().max(0) as u64
    }
}

/// A failure worth keeping for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub region: String,
    pub message: String,
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Per-region entry of the status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionStatus {
    pub stats: Option<RunResult>,
    pub current_progress: String,
    pub representative_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub last_updated: DateTime<Utc>,
    pub regions: BTreeMap<String, RegionStatus>,
}

/// Cross-run totals over a history query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTotals {
    pub executions: usize,
    pub total_success: u64,
    pub total_failed: u64,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_expired: u64,
    pub average_hit_rate: String,
}

impl HistoryTotals {
    pub fn from_results(results: &[RunResult]) -> Self {
        let mut totals = HistoryTotals {
            executions: results.len(),
            ..Default::default()
        };
        let mut rate_sum = 0.0;
        let mut rate_count = 0usize;

        for result in results {
            totals.total_success += result.success;
            totals.total_failed += result.failed;
            totals.total_hits += result.cache_hits;
            totals.total_misses += result.cache_misses;
            totals.total_expired += result.cache_expired;
            if let Ok(rate) = result.hit_rate.parse::<f64>() {
                rate_sum += rate;
                rate_count += 1;
            }
        }

        totals.average_hit_rate = if rate_count == 0 {
            format_rate(0, 0)
        } else {
            format!("{:.2}", rate_sum / rate_count as f64)
        };
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryReport {
    pub totals: HistoryTotals,
    pub results: Vec<RunResult>,
    pub regions: Vec<String>,
}

/// `numerator / denominator * 100` to two decimals, clamped to [0, 100].
/// A zero denominator renders as "0.00".
pub fn format_rate(numerator: u64, denominator: u64) -> String {
    if denominator == 0 {
        return "0.00".to_string();
    }
    let rate = (numerator as f64 / denominator as f64 * 100.0).clamp(0.0, 100.0);
    format!("{:.2}", rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result(region: &str, success: u64, hit_rate: &str) -> RunResult {
        RunResult {
            region: region.to_string(),
            timestamp: Utc::now(),
            duration_ms: 0,
            mode: RunMode::Full,
            total_urls: 0,
            start_offset: 0,
            urls_processed: success as usize,
            cycle_complete: false,
            success,
            failed: 0,
            cache_hits: 0,
            cache_misses: 0,
            cache_expired: 0,
            cache_other: 0,
            hit_rate: hit_rate.to_string(),
            target_location: "LHR".to_string(),
            location_matches: 0,
            location_mismatches: 0,
            location_match_rate: "0.00".to_string(),
            location_breakdown: BTreeMap::new(),
            region_matches: None,
            region_mismatches: None,
            region_match_rate: None,
            details: Vec::new(),
        }
    }

    #[test]
    fn test_cache_status_classification() {
        assert_eq!(CacheStatus::from_header(Some("HIT")), CacheStatus::Hit);
        assert_eq!(CacheStatus::from_header(Some("miss")), CacheStatus::Miss);
        assert_eq!(CacheStatus::from_header(Some(" EXPIRED ")), CacheStatus::Expired);
        assert_eq!(CacheStatus::from_header(Some("DYNAMIC")), CacheStatus::Other);
        assert_eq!(CacheStatus::from_header(Some("REVALIDATED")), CacheStatus::Other);
        assert_eq!(CacheStatus::from_header(None), CacheStatus::Other);
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0, 0), "0.00");
        assert_eq!(format_rate(1, 3), "33.33");
        assert_eq!(format_rate(2, 2), "100.00");
        assert_eq!(format_rate(5, 2), "100.00");
    }

    #[test]
    fn test_history_totals() {
        let results = vec![sample_result("A", 10, "80.00"), sample_result("B", 5, "60.00")];
        let totals = HistoryTotals::from_results(&results);
        assert_eq!(totals.executions, 2);
        assert_eq!(totals.total_success, 15);
        assert_eq!(totals.average_hit_rate, "70.00");

        assert_eq!(HistoryTotals::from_results(&[]).average_hit_rate, "0.00");
    }

    #[test]
    fn test_run_result_json_shape() {
        let json = serde_json::to_value(sample_result("Oceania", 3, "66.67")).unwrap();
        assert_eq!(json["hitRate"], "66.67");
        assert_eq!(json["mode"], "full");
        assert!(json["regionMatchRate"].is_null());
        assert!(json.get("locationBreakdown").is_some());
    }
}
