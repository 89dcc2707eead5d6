use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use siren_engine::rules::RuleCache;
use siren_engine::service::AlertService;
use siren_storage::AlertStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AlertService>,
    pub store: Arc<dyn AlertStore>,
    pub rules: Arc<RuleCache>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
