use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use classboard_backend::classroom::{ClassroomClient, ClassroomClientFactory, NoopClassroomClient};
use classboard_backend::config::AppConfig;
use classboard_backend::error::AppError;
use classboard_backend::services::SyncScheduler;
use classboard_backend::services::cache::TtlCache;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::sync::Mutex;

async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        database_url: "sqlite::memory:".to_string(),
        sync_accounts: vec!["admin@school.edu".to_string()],
        institute_name: "default".to_string(),
        service_account_key_path: None,
        enable_assignments_sync: false,
        enable_auto_sync: true,
        sync_interval_secs: 1,
        insights_worker_url: None,
        insights_api_key: None,
    })
}

/// Factory that counts how often a sync run actually starts.
struct CountingFactory {
    calls: Arc<AtomicUsize>,
}

impl ClassroomClientFactory for CountingFactory {
    fn client_for(&self, _subject: &str) -> Result<Arc<dyn ClassroomClient>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(NoopClassroomClient))
    }
}

#[tokio::test]
async fn tick_skips_while_manual_sync_holds_the_lock() {
    let pool = test_pool().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let lock = Arc::new(Mutex::new(()));

    let scheduler = SyncScheduler::new(
        pool,
        Arc::new(CountingFactory { calls: calls.clone() }),
        Arc::new(TtlCache::new(Duration::from_secs(60))),
        test_config(),
        lock.clone(),
    );

    // Simulate a manual sync in progress.
    let guard = lock.lock().await;
    scheduler.tick().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    drop(guard);
    scheduler.tick().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
