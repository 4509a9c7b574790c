//! Fixed-interval trigger running full warming cycles independently of HTTP.

use crate::models::RunMode;
use crate::orchestration::{error_chain, WarmingCycle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Run a full cycle every `period` until `shutdown` flips to true.
///
/// The first run happens one period after start. A failed cycle has already
/// been recorded by the cycle itself; here it is only logged.
#[tracing::instrument(skip(cycle, shutdown))]
pub async fn run_scheduler(
    cycle: Arc<WarmingCycle>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match cycle.run(RunMode::Full).await {
                    Ok(result) => tracing::info!(
                        region = %result.region,
                        success = result.success,
                        failed = result.failed,
                        "Scheduled run complete"
                    ),
                    Err(e) => tracing::error!(error = %error_chain(&e), "Scheduled run failed"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Scheduler stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::dispatch::LocalDispatcher;
    use crate::network::{CacheDirectives, FetchError, FetchResult, Fetcher, WarmResponse};
    use crate::regions::{Region, RegionCatalog};
    use crate::state::MemoryStore;
    use crate::warmer::WarmingExecutor;
    use async_trait::async_trait;

    struct EmptySite;

    #[async_trait]
    impl Fetcher for EmptySite {
        async fn fetch(&self, _url: &str) -> Result<FetchResult, FetchError> {
            Ok(FetchResult {
                content: "<urlset></urlset>".to_string(),
                status_code: 200,
                content_type: None,
            })
        }

        async fn warm(&self, _url: &str, _d: &CacheDirectives) -> Result<WarmResponse, FetchError> {
            Err(FetchError::Timeout)
        }
    }

    fn cycle() -> Arc<WarmingCycle> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(EmptySite);
        let settings = Settings {
            sitemaps: vec!["https://site.test/sitemap.xml".to_string()],
            regions: RegionCatalog::new(vec![
                Region::new("A", "a", "AAA", &[]),
                Region::new("B", "b", "BBB", &[]),
                Region::new("C", "c", "CCC", &[]),
            ]),
            ..Settings::default()
        };
        let local = LocalDispatcher::new(Arc::new(WarmingExecutor::new(Arc::clone(&fetcher))));
        Arc::new(WarmingCycle::new(
            settings,
            Arc::new(MemoryStore::new()),
            fetcher,
            Arc::new(local),
        ))
    }

    fn executions(cycle: &WarmingCycle) -> usize {
        cycle.results().get_history(None, 10).totals.executions
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_run_waits_one_period() {
        let cycle = cycle();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_scheduler(Arc::clone(&cycle), Duration::from_secs(60), rx));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(executions(&cycle), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(executions(&cycle), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(executions(&cycle), 2);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_sender_dropped() {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_scheduler(cycle(), Duration::from_secs(3600), rx));
        drop(tx);
        handle.await.unwrap();
    }
}
