use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::classroom::ClassroomClientFactory;
use crate::config::AppConfig;
use crate::services::cache::TtlCache;
use crate::services::sync_service::SyncService;

/// Periodic sync loop. Disabled by default (manual sync only); the
/// import-once guard in the sync service makes the scheduled runs cheap
/// no-ops once data exists.
pub struct SyncScheduler {
    db: SqlitePool,
    classroom: Arc<dyn ClassroomClientFactory>,
    cache: Arc<TtlCache>,
    config: Arc<AppConfig>,
    /// Shared with the HTTP sync endpoints: at most one sync at a time,
    /// whoever starts it.
    sync_lock: Arc<Mutex<()>>,
    interval: Duration,
}

impl SyncScheduler {
    pub fn new(
        db: SqlitePool,
        classroom: Arc<dyn ClassroomClientFactory>,
        cache: Arc<TtlCache>,
        config: Arc<AppConfig>,
        sync_lock: Arc<Mutex<()>>,
    ) -> Self {
        let interval = Duration::from_secs(config.sync_interval_secs);
        Self { db, classroom, cache, config, sync_lock, interval }
    }

    pub async fn start(self) {
        info!("starting auto-sync scheduler (interval: {:?})", self.interval);

        loop {
            tokio::time::sleep(self.interval).await;
            self.tick().await;
        }
    }

    /// One scheduled run. If a manual sync already holds the lock the tick is
    /// skipped rather than queued; the next tick will catch up.
    pub async fn tick(&self) {
        let Ok(_guard) = self.sync_lock.try_lock() else {
            info!("a sync is already running, skipping scheduled run");
            return;
        };

        let service = SyncService::new(
            self.db.clone(),
            self.classroom.clone(),
            self.cache.clone(),
            self.config.sync_accounts.clone(),
            self.config.enable_assignments_sync,
        );

        match service.run_sync().await {
            Ok(report) => {
                info!(
                    "scheduled sync finished: {} courses, {} assignments, {} submissions",
                    report.stats.courses_updated,
                    report.stats.assignments_updated,
                    report.stats.submissions_updated
                );
            }
            Err(e) => {
                // The loop keeps going; a failed run is retried at the
                // next tick.
                warn!("scheduled sync failed: {:?}", e);
            }
        }
    }
}
