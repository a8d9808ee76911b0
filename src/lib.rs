pub mod api;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;

pub use db::DbPool;

use auth::TokenService;
use config::Config;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub tokens: TokenService,
}

impl AppState {
    /// Build the shared state. The signing secret is resolved once here and
    /// stays fixed for the life of the process.
    pub fn new(config: Config, db: DbPool) -> Self {
        let tokens = TokenService::from_config(&config.auth);
        Self { config, db, tokens }
    }
}
