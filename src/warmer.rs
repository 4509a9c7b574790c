//! Regional warming executor: sequential, rate-limited requests with cache and
//! edge-location classification.

use crate::models::{format_rate, CacheStatus, RunMode, RunResult, UrlDetail};
use crate::network::{CacheDirectives, Fetcher, WarmResponse};
use crate::regions::Region;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};

/// Everything a region-pinned worker needs to warm one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmJob {
    pub region: Region,
    pub urls: Vec<String>,
    pub total_urls: usize,
    pub start_offset: usize,
    pub cycle_complete: bool,
    pub mode: RunMode,
    pub rate_limit_ms: u64,
    pub cache_ttl_secs: u64,
    pub not_found_ttl_secs: u64,
}

impl WarmJob {
    pub fn directives(&self) -> CacheDirectives {
        CacheDirectives::new(self.cache_ttl_secs, self.not_found_ttl_secs)
    }
}

/// Location code from a trace header such as `8a1b2c3d4e5f6789-LHR`.
///
/// The code is the segment after the last hyphen. Headers without a hyphen,
/// with an empty segment or with non-alphanumeric codes are treated as unknown.
pub fn parse_trace_location(trace: Option<&str>) -> Option<String> {
    let (ray_id, code) = trace?.trim().rsplit_once('-')?;
    if ray_id.is_empty() || code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(code.to_ascii_uppercase())
}

// Counters accumulated across one run.
#[derive(Debug, Default)]
struct RunTally {
    success: u64,
    failed: u64,
    hits: u64,
    misses: u64,
    expired: u64,
    other: u64,
    location_matches: u64,
    location_mismatches: u64,
    region_matches: u64,
    region_mismatches: u64,
    breakdown: BTreeMap<String, u64>,
    details: Vec<UrlDetail>,
}

impl RunTally {
    fn record_response(&mut self, region: &Region, url: &str, response: &WarmResponse) {
        let cache_status = CacheStatus::from_header(response.cache_status.as_deref());
        let observed = parse_trace_location(response.trace.as_deref());
        let location_match = observed.as_deref().map(|c| region.is_exact_match(c)).unwrap_or(false);
        let region_match = observed.as_deref().map(|c| region.is_regional_match(c)).unwrap_or(false);

        let error = if response.is_success() {
            self.success += 1;
            match cache_status {
                CacheStatus::Hit => self.hits += 1,
                CacheStatus::Miss => self.misses += 1,
                CacheStatus::Expired => self.expired += 1,
                CacheStatus::Other => self.other += 1,
            }

            // Unknown locations stay out of the breakdown and the exact-match denominator...
            if let Some(code) = &observed {
                *self.breakdown.entry(code.clone()).or_insert(0) += 1;
                if location_match {
                    self.location_matches += 1;
                } else {
                    self.location_mismatches += 1;
                }
            }
            // ...but a regional match needs a known, listed code.
            if region_match {
                self.region_matches += 1;
            } else {
                self.region_mismatches += 1;
            }
            None
        } else {
            self.failed += 1;
            Some(format!("HTTP {}", response.status_code))
        };

        self.details.push(UrlDetail {
            url: url.to_string(),
            status: Some(response.status_code),
            cache_status: Some(cache_status),
            trace: response.trace.clone(),
            target_location: region.representative_code.clone(),
            observed_location: observed,
            location_match,
            region_match,
            error,
            timestamp: Utc::now(),
        });
    }

    fn record_failure(&mut self, region: &Region, url: &str, message: String) {
        self.failed += 1;
        self.details.push(UrlDetail {
            url: url.to_string(),
            status: None,
            cache_status: None,
            trace: None,
            target_location: region.representative_code.clone(),
            observed_location: None,
            location_match: false,
            region_match: false,
            error: Some(message),
            timestamp: Utc::now(),
        });
    }

    fn finish(self, job: &WarmJob, started: chrono::DateTime<Utc>, elapsed: Duration) -> RunResult {
        let tracks_region = !job.region.acceptable_codes.is_empty();
        let region_total = self.region_matches + self.region_mismatches;

        RunResult {
            region: job.region.label.clone(),
            timestamp: started,
            duration_ms: elapsed.as_millis() as u64,
            mode: job.mode,
            total_urls: job.total_urls,
            start_offset: job.start_offset,
            urls_processed: self.details.len(),
            cycle_complete: job.cycle_complete,
            success: self.success,
            failed: self.failed,
            cache_hits: self.hits,
            cache_misses: self.misses,
            cache_expired: self.expired,
            cache_other: self.other,
            hit_rate: format_rate(self.hits + self.expired, self.success),
            target_location: job.region.representative_code.clone(),
            location_matches: self.location_matches,
            location_mismatches: self.location_mismatches,
            location_match_rate: format_rate(
                self.location_matches,
                self.location_matches + self.location_mismatches,
            ),
            location_breakdown: self.breakdown,
            region_matches: tracks_region.then_some(self.region_matches),
            region_mismatches: tracks_region.then_some(self.region_mismatches),
            region_match_rate: tracks_region.then(|| format_rate(self.region_matches, region_total)),
            details: self.details,
        }
    }
}

pub struct WarmingExecutor {
    http: Arc<dyn Fetcher>,
}

impl WarmingExecutor {
    pub fn new(http: Arc<dyn Fetcher>) -> Self {
        Self { http }
    }

    /// Warm every URL of `job` in order, pausing `rate_limit_ms` between requests.
    /// A failing URL is recorded and never aborts the run.
    pub async fn warm(&self, job: &WarmJob) -> RunResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let directives = job.directives();
        let delay = Duration::from_millis(job.rate_limit_ms);
        let mut tally = RunTally::default();

        tracing::info!(
            region = %job.region.label,
            urls = job.urls.len(),
            offset = job.start_offset,
            "Starting warming run"
        );

        for (index, url) in job.urls.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                sleep(delay).await;
            }

            match self.http.warm(url, &directives).await {
                Ok(response) => {
                    tracing::debug!(
                        url = %url,
                        status = response.status_code,
                        cache = ?response.cache_status,
                        "Warmed URL"
                    );
                    tally.record_response(&job.region, url, &response);
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Warming request failed");
                    tally.record_failure(&job.region, url, e.to_string());
                }
            }
        }

        let result = tally.finish(job, started_at, clock.elapsed());
        tracing::info!(
            region = %result.region,
            success = result.success,
            failed = result.failed,
            hit_rate = %result.hit_rate,
            location_match_rate = %result.location_match_rate,
            duration_ms = result.duration_ms,
            "Warming run finished"
        );
        result
    }
}
