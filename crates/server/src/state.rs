//! Shared application state

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::{auth::JwtManager, config::Config, ws::HubState};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub jwt: JwtManager,
    pub hub: HubState,
}

impl AppState {
    /// Build application state; starts the hub's background tasks
    pub fn new(config: Config, pool: PgPool) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        let hub = HubState::new(Duration::from_millis(config.typing_expiry_ms));

        Self {
            pool,
            config: Arc::new(config),
            jwt,
            hub,
        }
    }
}
