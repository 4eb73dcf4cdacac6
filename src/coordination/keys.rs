//! Store key layout shared by every process.

pub const SERIES_PREFIX: &str = "series:";
pub const SERIES_LOCK_PREFIX: &str = "series-lock:";
pub const SERIES_PROGRESS_PREFIX: &str = "series-progress:";
pub const SERIES_FETCH_RATE_PREFIX: &str = "series-fetch-rate:";
pub const SERIES_QUEUE: &str = "series-queue";
pub const SERIES_QUEUE_ACTIVE: &str = "series-queue-active";
pub const SERIES_QUEUE_KICK: &str = "series-queue-kick";

pub fn series(id: &str) -> String {
    format!("{}{}", SERIES_PREFIX, id)
}

pub fn series_lock(id: &str) -> String {
    format!("{}{}", SERIES_LOCK_PREFIX, id)
}

pub fn series_progress(id: &str) -> String {
    format!("{}{}", SERIES_PROGRESS_PREFIX, id)
}

pub fn series_fetch_rate(id: &str) -> String {
    format!("{}{}", SERIES_FETCH_RATE_PREFIX, id)
}
