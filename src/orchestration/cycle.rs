//! One warming invocation: rotate, discover, page, dispatch, persist.

use crate::aggregator::ResultStore;
use crate::config::{Config, Settings};
use crate::dispatch::{DispatchError, LocalDispatcher, RegionDispatcher};
use crate::models::{RunMode, RunResult};
use crate::network::Fetcher;
use crate::progress::ProgressCursor;
use crate::rotation::RegionRotator;
use crate::sitemap_seeder::SitemapSeeder;
use crate::state::{KvStore, StateError};
use crate::warmer::{WarmJob, WarmingExecutor};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Warming run for region '{region}' could not be dispatched")]
    Dispatch {
        region: String,
        #[source]
        source: DispatchError,
    },
}

/// Message followed by each `source()` in the chain, one per line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

pub struct WarmingCycle {
    settings: Settings,
    store: Arc<dyn KvStore>,
    rotator: RegionRotator,
    seeder: SitemapSeeder,
    progress: ProgressCursor,
    dispatcher: Arc<dyn RegionDispatcher>,
    local: LocalDispatcher,
    results: ResultStore,
}

impl WarmingCycle {
    pub fn new(
        settings: Settings,
        store: Arc<dyn KvStore>,
        fetcher: Arc<dyn Fetcher>,
        dispatcher: Arc<dyn RegionDispatcher>,
    ) -> Self {
        Self {
            rotator: RegionRotator::new(Arc::clone(&store), settings.regions.clone()),
            seeder: SitemapSeeder::new(Arc::clone(&fetcher)),
            progress: ProgressCursor::new(Arc::clone(&store)),
            local: LocalDispatcher::new(Arc::new(WarmingExecutor::new(fetcher))),
            results: ResultStore::new(Arc::clone(&store), settings.regions.clone()),
            dispatcher,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Warm the next page for the next region in rotation.
    ///
    /// Only a dispatch failure is fatal: it is recorded under the system label
    /// and returned. Persistence problems after a successful run are logged.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, mode: RunMode) -> Result<RunResult, CycleError> {
        match self.store.purge_expired() {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Purged expired records"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired records"),
        }

        let region = self.rotator.next_region();
        let catalog = self.seeder.discover(&self.settings.sitemaps).await;

        let page_size = match mode {
            RunMode::Full => self.settings.max_urls_per_run,
            RunMode::Test => Config::TEST_MODE_URLS,
        };
        let slice = self.progress.plan(&region.label, &catalog, page_size);

        tracing::info!(
            region = %region.label,
            hint = %region.placement_hint,
            catalog = catalog.len(),
            offset = slice.start_offset,
            urls = slice.urls.len(),
            "Dispatching page"
        );

        let job = WarmJob {
            region: region.clone(),
            urls: slice.urls.clone(),
            total_urls: catalog.len(),
            start_offset: slice.start_offset,
            cycle_complete: slice.cycle_complete,
            mode,
            rate_limit_ms: self.settings.rate_limit_ms,
            cache_ttl_secs: self.settings.cache_ttl_secs,
            not_found_ttl_secs: self.settings.not_found_ttl_secs,
        };

        let result = match self.dispatcher.run_in_region(&region.placement_hint, job).await {
            Ok(result) => result,
            Err(source) => {
                let err = CycleError::Dispatch {
                    region: region.label.clone(),
                    source,
                };
                let stack = error_chain(&err);
                tracing::error!(region = %region.label, error = %stack, "Warming run failed");
                self.results
                    .log_error(Config::SYSTEM_REGION, &err.to_string(), Some(stack));
                return Err(err);
            }
        };

        if let Err(e) = self.results.store(&result) {
            tracing::error!(region = %region.label, error = %e, "Failed to persist run result");
        }

        // Smoke-test runs leave the cursor where it was.
        if mode == RunMode::Full {
            if let Err(e) = self.progress.commit(&region.label, &slice) {
                tracing::error!(region = %region.label, error = %e, "Failed to persist progress offset");
            }
        }

        Ok(result)
    }

    /// Execute a job handed over by a remote dispatcher in this process.
    pub async fn run_local(&self, job: WarmJob) -> Result<RunResult, DispatchError> {
        let hint = job.region.placement_hint.clone();
        self.local.run_in_region(&hint, job).await
    }

    pub fn reset_region(&self) -> Result<(), StateError> {
        self.rotator.reset()
    }

    /// Current catalog, without warming anything.
    pub async fn discover(&self) -> Vec<String> {
        self.seeder.discover(&self.settings.sitemaps).await
    }
}
