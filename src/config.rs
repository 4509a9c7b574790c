// Global configuration constants plus runtime settings read from the environment.

use crate::regions::{Region, RegionCatalog};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub struct Config;

impl Config {
    // Warming defaults
    pub const MAX_URLS_PER_RUN: usize = 500;
    pub const RATE_LIMIT_MS: u64 = 100;
    pub const CACHE_TTL_SECS: u64 = 86_400;
    pub const NOT_FOUND_TTL_SECS: u64 = 60;
    pub const TEST_MODE_URLS: usize = 5;

    // HTTP/Network config
    pub const USER_AGENT: &'static str = "SitemapWarmer/1.0";
    pub const TIMEOUT_SECS: u64 = 30;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const POOL_IDLE_PER_HOST: usize = 4;
    pub const POOL_IDLE_TIMEOUT_SECS: u64 = 30;
    pub const MAX_REDIRECTS: usize = 5;

    // Headers the edge exposes and the warmer sends
    pub const CACHE_STATUS_HEADER: &'static str = "cf-cache-status";
    pub const TRACE_HEADER: &'static str = "cf-ray";
    pub const WARMER_HEADER: &'static str = "x-cache-warmer";
    pub const TTL_DIRECTIVE_HEADER: &'static str = "x-cache-ttl-by-status";

    // Sitemap discovery
    pub const MAX_SITEMAP_DEPTH: usize = 5;

    // Retention
    pub const RESULT_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;
    pub const ERROR_RETENTION_SECS: u64 = 7 * 24 * 60 * 60;
    pub const HISTORY_DEFAULT_LIMIT: usize = 10;

    // Scheduling
    pub const SCHEDULE_INTERVAL_SECS: u64 = 6 * 60 * 60;

    // Label used for error records not tied to a region
    pub const SYSTEM_REGION: &'static str = "system";
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("No regions configured")]
    NoRegions,

    #[error("Region '{region}' in {key} is not part of WARMER_REGIONS")]
    UnknownRegion { key: &'static str, region: String },

    #[error("Region '{0}' has no built-in defaults and no location code was configured")]
    MissingCode(String),

    #[error("Duplicate region '{0}' in WARMER_REGIONS")]
    DuplicateRegion(String),
}

/// Runtime settings for one warmer process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub max_urls_per_run: usize,
    pub rate_limit_ms: u64,
    pub cache_ttl_secs: u64,
    pub not_found_ttl_secs: u64,
    pub sitemaps: Vec<String>,
    pub regions: RegionCatalog,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub schedule_interval: Duration,
    /// Placement hint -> base URL of a worker deployed near that hint.
    pub worker_endpoints: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_urls_per_run: Config::MAX_URLS_PER_RUN,
            rate_limit_ms: Config::RATE_LIMIT_MS,
            cache_ttl_secs: Config::CACHE_TTL_SECS,
            not_found_ttl_secs: Config::NOT_FOUND_TTL_SECS,
            sitemaps: Vec::new(),
            regions: RegionCatalog::builtin(),
            user_agent: Config::USER_AGENT.to_string(),
            timeout_secs: Config::TIMEOUT_SECS,
            schedule_interval: Duration::from_secs(Config::SCHEDULE_INTERVAL_SECS),
            worker_endpoints: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let max_urls_per_run = parse_or(&lookup, "WARMER_MAX_URLS_PER_RUN", defaults.max_urls_per_run)?;
        if max_urls_per_run == 0 {
            return Err(ConfigError::Zero("WARMER_MAX_URLS_PER_RUN"));
        }
        let timeout_secs = parse_or(&lookup, "WARMER_TIMEOUT_SECS", defaults.timeout_secs)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Zero("WARMER_TIMEOUT_SECS"));
        }
        let interval_secs = parse_or(
            &lookup,
            "WARMER_SCHEDULE_INTERVAL_SECS",
            Config::SCHEDULE_INTERVAL_SECS,
        )?;
        if interval_secs == 0 {
            return Err(ConfigError::Zero("WARMER_SCHEDULE_INTERVAL_SECS"));
        }

        let sitemaps = lookup("WARMER_SITEMAPS")
            .map(|raw| split_list(&raw, ','))
            .unwrap_or_default();
        for sitemap in &sitemaps {
            require_http_url("WARMER_SITEMAPS", sitemap)?;
        }

        let regions = match lookup("WARMER_REGIONS") {
            Some(raw) => build_regions(&split_list(&raw, ','), &lookup)?,
            None => {
                let labels: Vec<String> = defaults.regions.labels().map(str::to_string).collect();
                build_regions(&labels, &lookup)?
            }
        };

        let worker_endpoints = lookup("WARMER_WORKER_ENDPOINTS")
            .map(|raw| parse_pairs("WARMER_WORKER_ENDPOINTS", &raw))
            .transpose()?
            .unwrap_or_default()
            .into_iter()
            .map(|(hint, url)| {
                require_http_url("WARMER_WORKER_ENDPOINTS", &url)?;
                Ok((hint, url.trim_end_matches('/').to_string()))
            })
            .collect::<Result<HashMap<_, _>, ConfigError>>()?;

        Ok(Self {
            max_urls_per_run,
            rate_limit_ms: parse_or(&lookup, "WARMER_RATE_LIMIT_MS", defaults.rate_limit_ms)?,
            cache_ttl_secs: parse_or(&lookup, "WARMER_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            not_found_ttl_secs: parse_or(
                &lookup,
                "WARMER_NOT_FOUND_TTL_SECS",
                defaults.not_found_ttl_secs,
            )?,
            sitemaps,
            regions,
            user_agent: lookup("WARMER_USER_AGENT").unwrap_or(defaults.user_agent),
            timeout_secs,
            schedule_interval: Duration::from_secs(interval_secs),
            worker_endpoints,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn require_http_url(key: &str, raw: &str) -> Result<(), ConfigError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Parses `Label=value;Label=value`.
fn parse_pairs(key: &str, raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut pairs = HashMap::new();
    for entry in split_list(raw, ';') {
        let (label, value) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: entry.clone(),
        })?;
        pairs.insert(label.trim().to_string(), value.trim().to_string());
    }
    Ok(pairs)
}

fn build_regions<F>(labels: &[String], lookup: &F) -> Result<RegionCatalog, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if labels.is_empty() {
        return Err(ConfigError::NoRegions);
    }

    let hints = override_map(lookup, "WARMER_REGION_HINTS", labels)?;
    let codes = override_map(lookup, "WARMER_REGION_CODES", labels)?;
    let acceptable = override_map(lookup, "WARMER_REGION_ACCEPTABLE", labels)?;
    let builtin = RegionCatalog::builtin();

    let mut regions = Vec::with_capacity(labels.len());
    for label in labels {
        if regions.iter().any(|r: &Region| &r.label == label) {
            return Err(ConfigError::DuplicateRegion(label.clone()));
        }

        let base = builtin.get(label).cloned();
        let representative_code = match (codes.get(label), &base) {
            (Some(code), _) => code.to_uppercase(),
            (None, Some(region)) => region.representative_code.clone(),
            (None, None) => return Err(ConfigError::MissingCode(label.clone())),
        };
        let placement_hint = hints
            .get(label)
            .cloned()
            .or_else(|| base.as_ref().map(|r| r.placement_hint.clone()))
            .unwrap_or_else(|| label.to_lowercase().replace(' ', "-"));
        let acceptable_codes = match acceptable.get(label) {
            Some(raw) => split_list(raw, '|').into_iter().map(|c| c.to_uppercase()).collect(),
            None => base.map(|r| r.acceptable_codes).unwrap_or_default(),
        };

        regions.push(Region {
            label: label.clone(),
            placement_hint,
            representative_code,
            acceptable_codes,
        });
    }

    Ok(RegionCatalog::new(regions))
}

fn override_map<F>(
    lookup: &F,
    key: &'static str,
    labels: &[String],
) -> Result<HashMap<String, String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let map = match lookup(key) {
        Some(raw) => parse_pairs(key, &raw)?,
        None => return Ok(HashMap::new()),
    };
    if let Some(unknown) = map.keys().find(|label| !labels.contains(label)) {
        return Err(ConfigError::UnknownRegion {
            key,
            region: unknown.clone(),
        });
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.max_urls_per_run, Config::MAX_URLS_PER_RUN);
        assert_eq!(settings.rate_limit_ms, Config::RATE_LIMIT_MS);
        assert!(settings.sitemaps.is_empty());
        assert_eq!(settings.regions.len(), RegionCatalog::builtin().len());
        assert_eq!(settings.schedule_interval, Duration::from_secs(21_600));
    }

    #[test]
    fn test_overrides_and_region_order() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("WARMER_MAX_URLS_PER_RUN", "50"),
            ("WARMER_SITEMAPS", "https://a.test/sitemap.xml, https://b.test/sitemap.xml"),
            ("WARMER_REGIONS", "Oceania,Western Europe"),
            ("WARMER_REGION_CODES", "Oceania=mel"),
            ("WARMER_REGION_ACCEPTABLE", "Oceania=MEL|SYD"),
        ]))
        .unwrap();

        assert_eq!(settings.max_urls_per_run, 50);
        assert_eq!(settings.sitemaps.len(), 2);
        let labels: Vec<&str> = settings.regions.labels().collect();
        assert_eq!(labels, vec!["Oceania", "Western Europe"]);

        let oceania = settings.regions.get("Oceania").unwrap();
        assert_eq!(oceania.representative_code, "MEL");
        assert_eq!(oceania.acceptable_codes, vec!["MEL", "SYD"]);
        assert_eq!(oceania.placement_hint, "oc");
    }

    #[test]
    fn test_custom_region_requires_code() {
        let err = Settings::from_lookup(lookup_from(&[("WARMER_REGIONS", "Mars")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingCode("Mars".to_string()));

        let settings = Settings::from_lookup(lookup_from(&[
            ("WARMER_REGIONS", "Mars Base"),
            ("WARMER_REGION_CODES", "Mars Base=MRS"),
        ]))
        .unwrap();
        let mars = settings.regions.get("Mars Base").unwrap();
        assert_eq!(mars.placement_hint, "mars-base");
        assert!(mars.acceptable_codes.is_empty());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            Settings::from_lookup(lookup_from(&[("WARMER_RATE_LIMIT_MS", "fast")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(
            Settings::from_lookup(lookup_from(&[("WARMER_MAX_URLS_PER_RUN", "0")])).unwrap_err(),
            ConfigError::Zero("WARMER_MAX_URLS_PER_RUN")
        );
        assert_eq!(
            Settings::from_lookup(lookup_from(&[("WARMER_REGIONS", " , ")])).unwrap_err(),
            ConfigError::NoRegions
        );
        assert!(matches!(
            Settings::from_lookup(lookup_from(&[("WARMER_SITEMAPS", "sitemap.xml")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup_from(&[("WARMER_WORKER_ENDPOINTS", "oc=ftp://w.test")])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup_from(&[
                ("WARMER_REGIONS", "Oceania"),
                ("WARMER_REGION_HINTS", "Asia Pacific=apac"),
            ])),
            Err(ConfigError::UnknownRegion { .. })
        ));
    }

    #[test]
    fn test_worker_endpoints() {
        let settings = Settings::from_lookup(lookup_from(&[(
            "WARMER_WORKER_ENDPOINTS",
            "weur=https://weur.workers.test/;enam=https://enam.workers.test",
        )]))
        .unwrap();
        assert_eq!(settings.worker_endpoints["weur"], "https://weur.workers.test");
        assert_eq!(settings.worker_endpoints.len(), 2);
    }
}
