pub mod aggregator;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod logging;
pub mod models;
pub mod network;
pub mod orchestration;
pub mod parser;
pub mod progress;
pub mod regions;
pub mod rotation;
pub mod scheduler;
pub mod server;
pub mod sitemap_seeder;
pub mod state;
pub mod warmer;

// Re-export main types for library usage
pub use aggregator::ResultStore;
pub use config::{Config, ConfigError, Settings};
pub use dispatch::{DispatchError, LocalDispatcher, RegionDispatcher, RemoteDispatcher};
pub use models::{RunMode, RunResult};
pub use network::{FetchError, FetchResult, Fetcher, HttpClient};
pub use orchestration::{build_cycle, CycleError, WarmingCycle};
pub use parser::extract_locs;
pub use regions::{Region, RegionCatalog};
pub use state::{KvStore, MemoryStore, RedbStore, StateError};
pub use warmer::{WarmJob, WarmingExecutor};
