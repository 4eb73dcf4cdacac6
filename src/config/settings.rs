use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl StoreBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(StoreBackend::Redis),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub events_key: String,
    pub sync_interval_secs: u64,
    pub max_series_bytes: usize,
    pub series_fetch_lock_ttl_secs: u64,
    pub series_progress_ttl_secs: u64,
    pub series_queue_claim_ttl_secs: u64,
    pub series_queue_kick_ttl_secs: u64,
    pub series_fetch_concurrency: usize,
    pub series_fetch_cooldown_secs: u64,
    pub nrk_api_base_url: String,
    pub nrk_fetch_batch_size: usize,
    pub nrk_fetch_batch_delay_ms: u64,
    pub nrk_update_batch_size: usize,
    pub nrk_fetch_delay_ms: u64,
    pub nrk_fetch_delay_jitter: f64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1/".to_string(),
            events_key: "nrss:events".to_string(),
            sync_interval_secs: 3600,
            max_series_bytes: 65_536,
            series_fetch_lock_ttl_secs: 1800,
            series_progress_ttl_secs: 3600,
            series_queue_claim_ttl_secs: 1800,
            series_queue_kick_ttl_secs: 15,
            series_fetch_concurrency: 1,
            series_fetch_cooldown_secs: 60,
            nrk_api_base_url: "https://psapi.nrk.no".to_string(),
            nrk_fetch_batch_size: 10,
            nrk_fetch_batch_delay_ms: 10_000,
            nrk_update_batch_size: 20,
            nrk_fetch_delay_ms: 0,
            nrk_fetch_delay_jitter: 0.5,
            log_level: "info".to_string(),
        }
    }
}

/// `LOG_LEVEL`, readable before the rest of the configuration so logging can
/// be up when the config is validated.
pub fn log_level_from_env() -> String {
    env::var("LOG_LEVEL")
        .ok()
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let batch_size: i64 = parse_env("NRK_FETCH_BATCH_SIZE", defaults.nrk_fetch_batch_size as i64);
        let update_batch_size: i64 =
            parse_env("NRK_UPDATE_BATCH_SIZE", defaults.nrk_update_batch_size as i64);
        let batch_delay_ms: i64 =
            parse_env("NRK_FETCH_BATCH_DELAY_MS", defaults.nrk_fetch_batch_delay_ms as i64);
        let fetch_delay_ms: i64 = parse_env("NRK_FETCH_DELAY_MS", defaults.nrk_fetch_delay_ms as i64);
        let jitter: f64 = parse_env("NRK_FETCH_DELAY_JITTER", defaults.nrk_fetch_delay_jitter);
        let fetch_concurrency: i64 =
            parse_env("SERIES_FETCH_CONCURRENCY", defaults.series_fetch_concurrency as i64);

        Config {
            store_backend: env::var("STORE_BACKEND")
                .ok()
                .and_then(|v| StoreBackend::parse(&v))
                .unwrap_or(defaults.store_backend),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            events_key: env::var("EVENTS_KEY").unwrap_or(defaults.events_key),
            sync_interval_secs: parse_env("SYNC_INTERVAL_SECS", defaults.sync_interval_secs),
            max_series_bytes: parse_env("MAX_SERIES_BYTES", defaults.max_series_bytes),
            series_fetch_lock_ttl_secs: parse_env(
                "SERIES_FETCH_LOCK_TTL_SEC",
                defaults.series_fetch_lock_ttl_secs,
            ),
            series_progress_ttl_secs: parse_env(
                "SERIES_PROGRESS_TTL_SEC",
                defaults.series_progress_ttl_secs,
            ),
            series_queue_claim_ttl_secs: parse_env(
                "SERIES_QUEUE_CLAIM_TTL_SEC",
                defaults.series_queue_claim_ttl_secs,
            ),
            series_queue_kick_ttl_secs: parse_env(
                "SERIES_QUEUE_KICK_TTL_SEC",
                defaults.series_queue_kick_ttl_secs,
            ),
            series_fetch_concurrency: if fetch_concurrency > 0 {
                fetch_concurrency as usize
            } else {
                defaults.series_fetch_concurrency
            },
            series_fetch_cooldown_secs: parse_env(
                "SERIES_FETCH_COOLDOWN_SEC",
                defaults.series_fetch_cooldown_secs,
            ),
            nrk_api_base_url: env::var("NRK_API_BASE_URL").unwrap_or(defaults.nrk_api_base_url),
            // Non-positive batch sizes fall back to the defaults; a non-positive delay disables pacing.
            nrk_fetch_batch_size: if batch_size > 0 {
                batch_size as usize
            } else {
                defaults.nrk_fetch_batch_size
            },
            nrk_fetch_batch_delay_ms: batch_delay_ms.max(0) as u64,
            nrk_update_batch_size: if update_batch_size > 0 {
                update_batch_size as usize
            } else {
                defaults.nrk_update_batch_size
            },
            nrk_fetch_delay_ms: fetch_delay_ms.max(0) as u64,
            nrk_fetch_delay_jitter: if jitter.is_finite() {
                jitter.clamp(0.0, 1.0)
            } else {
                defaults.nrk_fetch_delay_jitter
            },
            log_level: log_level_from_env(),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn fetch_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.series_fetch_lock_ttl_secs)
    }

    pub fn progress_ttl(&self) -> Duration {
        Duration::from_secs(self.series_progress_ttl_secs)
    }

    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.series_queue_claim_ttl_secs)
    }

    pub fn kick_ttl(&self) -> Duration {
        Duration::from_secs(self.series_queue_kick_ttl_secs)
    }

    /// `None` when the per-series on-demand cooldown is disabled.
    pub fn fetch_cooldown(&self) -> Option<Duration> {
        (self.series_fetch_cooldown_secs > 0).then(|| Duration::from_secs(self.series_fetch_cooldown_secs))
    }

    /// `None` when inter-batch pacing is disabled.
    pub fn batch_delay(&self) -> Option<Duration> {
        (self.nrk_fetch_batch_delay_ms > 0).then(|| Duration::from_millis(self.nrk_fetch_batch_delay_ms))
    }

    pub fn validate_and_log(&self) {
        log::info!("Application Configuration Loaded: {:?}", self);
        if self.max_series_bytes == 0 {
            log::warn!("MAX_SERIES_BYTES is 0; every stored series will be trimmed to no episodes");
        }
    }
}
