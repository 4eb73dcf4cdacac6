pub mod settings;

pub use settings::{log_level_from_env, Config, StoreBackend};

use crate::error::NrssError;
use std::sync::Arc;

/// Loads and returns the application configuration as an `Arc<Config>`.
/// Reads `.env` when present, then the process environment.
pub fn load_config() -> Result<Arc<Config>, NrssError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();

    if config.store_backend == StoreBackend::Redis && config.redis_url.is_empty() {
        return Err(NrssError::ConfigError("REDIS_URL cannot be empty".to_string()));
    }
    if config.events_key.is_empty() {
        return Err(NrssError::ConfigError("EVENTS_KEY cannot be empty".to_string()));
    }
    url::Url::parse(&config.nrk_api_base_url)?;

    config.validate_and_log();

    Ok(Arc::new(config))
}
