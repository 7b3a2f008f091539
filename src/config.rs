use std::env;

use crate::error::AppError;

/// Deployment configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    /// Staff accounts to impersonate during an institute-wide sync, in the
    /// order they are processed. Single-account mode is a list of one.
    pub sync_accounts: Vec<String>,
    pub institute_name: String,
    pub service_account_key_path: Option<String>,
    /// Coursework/submission sync is feature-flagged: rosters alone are
    /// enough for several dashboards and cost far fewer API calls.
    pub enable_assignments_sync: bool,
    pub enable_auto_sync: bool,
    pub sync_interval_secs: u64,
    pub insights_worker_url: Option<String>,
    pub insights_api_key: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://classboard.db".to_string());

        // SYNC_ACCOUNTS is a comma-separated list; GOOGLE_IMPERSONATED_USER
        // is the single-account fallback.
        let sync_accounts: Vec<String> = match env::var("SYNC_ACCOUNTS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => env::var("GOOGLE_IMPERSONATED_USER")
                .ok()
                .into_iter()
                .collect(),
        };

        let sync_interval_secs = match env::var("SYNC_INTERVAL_SECS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AppError::Config("SYNC_INTERVAL_SECS is not a number".to_string()))?,
            Err(_) => 86_400,
        };

        Ok(Self {
            database_url,
            sync_accounts,
            institute_name: env::var("INSTITUTE_NAME").unwrap_or_else(|_| "default".to_string()),
            service_account_key_path: env::var("GOOGLE_SERVICE_ACCOUNT_KEY").ok(),
            enable_assignments_sync: flag("ENABLE_ASSIGNMENTS_SYNC"),
            enable_auto_sync: flag("ENABLE_AUTO_SYNC"),
            sync_interval_secs,
            insights_worker_url: env::var("LLM_WORKER_URL").ok(),
            insights_api_key: env::var("LLM_WORKER_API_KEY").ok(),
        })
    }
}

fn flag(name: &str) -> bool {
    env::var(name).map(|v| v == "true").unwrap_or(false)
}
