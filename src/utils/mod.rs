// src/utils/mod.rs
use chrono::{DateTime, TimeZone, Utc};
use log::info;

pub mod timing;

pub use timing::{delay_with_jitter, Timer};

pub fn setup_logging(level: &str) -> Result<(), fern::InitError> {
    let level = level.parse::<log::LevelFilter>().unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .level_for("redis", log::LevelFilter::Warn)
        .chain(std::io::stderr())
        .apply()?;
    info!("Logging initialized.");
    Ok(())
}

/// Sorted-set score for an enqueue happening at `at`.
pub fn score_for(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64
}

/// Inverse of [`score_for`]; out-of-range scores clamp to the epoch.
pub fn time_from_score(score: f64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(score as i64).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_round_trips_to_millisecond() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(time_from_score(score_for(at)), at);
    }
}
