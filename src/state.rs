use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::classroom::ClassroomClientFactory;
use crate::config::AppConfig;
use crate::services::cache::TtlCache;
use crate::services::insights::InsightsClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub classroom: Arc<dyn ClassroomClientFactory>,
    pub cache: Arc<TtlCache>,
    pub insights: Arc<InsightsClient>,
    pub config: Arc<AppConfig>,
    /// Held for the duration of a sync run. The store is only safe under "at
    /// most one sync at a time"; a second request gets a 409.
    pub sync_lock: Arc<Mutex<()>>,
}
