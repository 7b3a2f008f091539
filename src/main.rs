use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use classboard_backend::api::router;
use classboard_backend::classroom::auth::ServiceAccountAuth;
use classboard_backend::classroom::{GoogleClassroomFactory, NoopClassroomFactory};
use classboard_backend::config::AppConfig;
use classboard_backend::services::SyncScheduler;
use classboard_backend::services::cache::TtlCache;
use classboard_backend::services::insights::InsightsClient;
use classboard_backend::state::AppState;

const CACHE_TTL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "classboard_backend=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let classroom: Arc<dyn classboard_backend::classroom::ClassroomClientFactory> =
        match &config.service_account_key_path {
            Some(path) => {
                let auth = ServiceAccountAuth::from_key_file(path)?;
                info!("classroom client authorized as {}", auth.client_email());
                Arc::new(GoogleClassroomFactory::new(auth)?)
            }
            None => {
                warn!("GOOGLE_SERVICE_ACCOUNT_KEY not set; classroom sync is disabled");
                Arc::new(NoopClassroomFactory)
            }
        };

    // One lock for every sync path: HTTP endpoints and the scheduler.
    let sync_lock = Arc::new(Mutex::new(()));

    let state = AppState {
        db: pool.clone(),
        classroom: classroom.clone(),
        cache: Arc::new(TtlCache::new(CACHE_TTL)),
        insights: Arc::new(InsightsClient::new(
            config.insights_worker_url.clone(),
            config.insights_api_key.clone(),
        )),
        config: config.clone(),
        sync_lock: sync_lock.clone(),
    };

    if config.enable_auto_sync {
        let scheduler = SyncScheduler::new(
            pool.clone(),
            classroom.clone(),
            state.cache.clone(),
            config.clone(),
            sync_lock.clone(),
        );
        tokio::spawn(scheduler.start());
    }

    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
