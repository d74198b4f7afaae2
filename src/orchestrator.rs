//! Cache lifecycle orchestration
//!
//! Wires the TTL store to the data-access layer at startup: configures the
//! store, preloads the hot dataset through a caller-supplied closure, and
//! arms a recurring background refresh that re-runs the preload once the hot
//! data has aged past 80% of its TTL. Also produces the cache health report
//! shown by the diagnostics command.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheCategory, CacheConfig, CacheStats, TtlCache};
use crate::data::events::{HOT_DATA_PATTERN, TROY_EVENTS_KEY};

/// Memory footprint above which the health report recommends shrinking the cache
const MEMORY_WARN_BYTES: usize = 10 * 1024 * 1024;

/// Async closure that (re)loads the hot dataset via the data-access layer
pub type PreloadFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Whether to preload the hot dataset during initialization
    pub preload_hot_data: bool,
    /// Whether to arm the recurring background refresh
    pub background_refresh: bool,
    /// How often the background task checks whether a refresh is due
    pub refresh_interval: Duration,
    /// Store configuration applied at initialization
    pub cache: CacheConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            preload_hot_data: true,
            background_refresh: true,
            refresh_interval: Duration::from_secs(30 * 60),
            cache: startup_cache_config(),
        }
    }
}

/// Store settings applied at startup: a little more room than the store's
/// own defaults, and longer TTLs for the hot and character categories
fn startup_cache_config() -> CacheConfig {
    let mut category_ttls = HashMap::new();
    category_ttls.insert(CacheCategory::Hot, Duration::from_secs(20 * 60));
    category_ttls.insert(CacheCategory::Character, Duration::from_secs(15 * 60));

    CacheConfig {
        max_entries: 150,
        default_ttl: Duration::from_secs(5 * 60),
        category_ttls,
    }
}

/// Overall cache health verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHealthStatus {
    Healthy,
    Warning,
    Error,
}

/// Snapshot produced by [`CacheOrchestrator::health_report`]
#[derive(Debug)]
pub struct HealthReport {
    pub status: CacheHealthStatus,
    pub stats: CacheStats,
    /// Human-readable tuning suggestions derived from the stats
    pub recommendations: Vec<String>,
}

struct LifecycleState {
    initialized: bool,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

/// Owns cache startup, background refresh, and health reporting
pub struct CacheOrchestrator {
    cache: Arc<TtlCache>,
    preload: PreloadFn,
    config: OrchestratorConfig,
    state: Mutex<LifecycleState>,
}

impl CacheOrchestrator {
    /// Creates an orchestrator with the default configuration
    pub fn new(cache: Arc<TtlCache>, preload: PreloadFn) -> Self {
        Self::with_config(cache, preload, OrchestratorConfig::default())
    }

    /// Creates an orchestrator with a custom configuration
    pub fn with_config(cache: Arc<TtlCache>, preload: PreloadFn, config: OrchestratorConfig) -> Self {
        Self {
            cache,
            preload,
            config,
            state: Mutex::new(LifecycleState {
                initialized: false,
                shutdown_tx: None,
            }),
        }
    }

    fn locked(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configures the store, preloads hot data, and arms the refresh timer.
    ///
    /// Idempotent: a second call is a no-op.
    pub async fn initialize(&self) {
        if self.locked().initialized {
            debug!("cache system already initialized");
            return;
        }

        info!("initializing cache system");
        self.cache.configure(self.config.cache.clone());

        if self.config.preload_hot_data {
            (self.preload)().await;
            let stats = self.cache.stats();
            info!(
                entries = stats.total_entries,
                hot_data_cached = stats.hot_data_cached,
                "cache after preload"
            );
        }

        let mut state = self.locked();
        if self.config.background_refresh && state.shutdown_tx.is_none() {
            state.shutdown_tx = Some(self.spawn_refresh());
            info!(
                interval_secs = self.config.refresh_interval.as_secs(),
                "background refresh armed"
            );
        }
        state.initialized = true;
    }

    /// Spawns the recurring refresh task; returns its shutdown handle
    fn spawn_refresh(&self) -> mpsc::Sender<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let cache = Arc::clone(&self.cache);
        let preload = Arc::clone(&self.preload);
        let period = self.config.refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Skip the first tick (immediate)
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if cache.refresh_due(TROY_EVENTS_KEY) {
                            info!("background refresh: hot data stale, reloading");
                            preload().await;
                        } else {
                            debug!("background refresh: hot data still fresh");
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Invalidates the hot entries and re-runs the preload, regardless of age
    pub async fn force_refresh(&self) {
        let removed = self.cache.invalidate(HOT_DATA_PATTERN);
        info!(removed, "force refresh: invalidated hot entries");
        (self.preload)().await;
    }

    /// Produces the cache health verdict with tuning recommendations
    pub fn health_report(&self) -> HealthReport {
        let stats = self.cache.stats();

        let low_hit_rate = stats.hit_rate_percent < 50.0 && stats.total_entries > 10;
        let status = if stats.total_entries == 0 {
            CacheHealthStatus::Error
        } else if !stats.hot_data_cached || low_hit_rate {
            CacheHealthStatus::Warning
        } else {
            CacheHealthStatus::Healthy
        };

        let mut recommendations = Vec::new();
        if stats.total_entries == 0 {
            recommendations.push("Cache is empty - run the preload or check connectivity".to_string());
        }
        if !stats.hot_data_cached {
            recommendations.push("Hot dataset not cached - consider preloading".to_string());
        }
        if low_hit_rate {
            recommendations.push("Low cache hit rate - consider longer TTL values".to_string());
        }
        if stats.estimated_memory_bytes > MEMORY_WARN_BYTES {
            recommendations.push("High memory usage - consider reducing cache size".to_string());
        }
        if stats.total_entries > 100 {
            recommendations.push("Large cache size - monitoring recommended".to_string());
        }
        if recommendations.is_empty() {
            recommendations.push("Cache performance is optimal".to_string());
        }

        HealthReport {
            status,
            stats,
            recommendations,
        }
    }

    /// Cancels the background refresh; used when the app goes to background
    pub async fn stop(&self) {
        let shutdown_tx = self.locked().shutdown_tx.take();
        if let Some(tx) = shutdown_tx {
            if tx.send(()).await.is_err() {
                warn!("background refresh task was already gone");
            } else {
                info!("background refresh stopped");
            }
        }
    }

    /// Re-arms the background refresh after a [`stop`](Self::stop)
    #[allow(dead_code)]
    pub async fn restart(&self) {
        self.stop().await;
        if self.config.background_refresh {
            let mut state = self.locked();
            state.shutdown_tx = Some(self.spawn_refresh());
            info!("background refresh restarted");
        }
    }

    /// Whether [`initialize`](Self::initialize) has completed
    #[allow(dead_code)]
    pub fn is_initialized(&self) -> bool {
        self.locked().initialized
    }

    /// Whether the background refresh task is currently armed
    pub fn background_refresh_active(&self) -> bool {
        self.locked().shutdown_tx.is_some()
    }
}
