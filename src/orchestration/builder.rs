//! Wires the store, HTTP client and dispatcher into a warming cycle.

use crate::config::Settings;
use crate::dispatch::{DispatchError, LocalDispatcher, RegionDispatcher, RemoteDispatcher};
use crate::network::Fetcher;
use crate::state::KvStore;
use crate::warmer::WarmingExecutor;
use std::sync::Arc;

use super::cycle::WarmingCycle;

/// Builds a cycle that dispatches remotely when worker endpoints are configured
/// and runs everything in-process otherwise.
#[tracing::instrument(skip_all, fields(regions = settings.regions.len(), workers = settings.worker_endpoints.len()))]
pub fn build_cycle(
    settings: Settings,
    store: Arc<dyn KvStore>,
    fetcher: Arc<dyn Fetcher>,
) -> Result<WarmingCycle, DispatchError> {
    let local = LocalDispatcher::new(Arc::new(WarmingExecutor::new(Arc::clone(&fetcher))));

    let dispatcher: Arc<dyn RegionDispatcher> = if settings.worker_endpoints.is_empty() {
        Arc::new(local)
    } else {
        tracing::info!("Remote dispatch enabled for registered placement hints");
        Arc::new(RemoteDispatcher::new(
            settings.worker_endpoints.clone(),
            &settings.user_agent,
            local,
        )?)
    };

    Ok(WarmingCycle::new(settings, store, fetcher, dispatcher))
}
