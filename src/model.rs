//! Persisted series snapshots.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    /// Playable media URL
    pub url: String,
    pub share_link: String,
    pub date: DateTime<Utc>,
    pub duration_in_seconds: u64,
}

/// Complete state for one catalog series. Always written whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub link: String,
    pub image_url: String,
    pub last_fetched_at: DateTime<Utc>,
    /// Newest first
    pub episodes: Vec<Episode>,
}

impl Series {
    pub fn sort_episodes(&mut self) {
        self.episodes.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
    }

    /// Drops the oldest episodes until the serialized snapshot fits in `max_bytes`.
    ///
    /// Returns the number of episodes removed. A snapshot already within budget is
    /// left untouched.
    pub fn trim_to_size(&mut self, max_bytes: usize) -> usize {
        let mut removed = 0;
        while self.serialized_len() > max_bytes && self.episodes.pop().is_some() {
            removed += 1;
        }
        if removed > 0 {
            debug!(
                "Trimmed {} oldest episodes from {} to fit {} bytes",
                removed, self.id, max_bytes
            );
        }
        removed
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.last_fetched_at)
    }

    /// Stale once strictly more than `window` has passed since the last fetch.
    pub fn is_stale_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => self.age_at(now) > window,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn episode(id: &str, day: u32) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("Episode {}", id),
            subtitle: None,
            url: format!("https://media.example/{}.mp3", id),
            share_link: format!("https://radio.example/{}", id),
            date: Utc.with_ymd_and_hms(2025, 1, day, 6, 0, 0).unwrap(),
            duration_in_seconds: 1800,
        }
    }

    pub(crate) fn series(episodes: Vec<Episode>) -> Series {
        Series {
            id: "abels-taarn".to_string(),
            title: "Abels tårn".to_string(),
            subtitle: Some("Vitenskap".to_string()),
            link: "https://radio.nrk.no/podkast/abels-taarn".to_string(),
            image_url: "https://img.example/abels.jpg".to_string(),
            last_fetched_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            episodes,
        }
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let json = serde_json::to_value(series(vec![episode("e1", 1)])).unwrap();
        assert!(json.get("lastFetchedAt").is_some());
        assert!(json.get("imageUrl").is_some());
        assert!(json["episodes"][0].get("shareLink").is_some());
        assert!(json["episodes"][0].get("durationInSeconds").is_some());
    }

    #[test]
    fn test_trim_removes_from_tail_until_within_budget() {
        let mut s = series((1..=20).rev().map(|d| episode(&format!("e{}", d), d)).collect());
        let full = s.serialized_len();
        let budget = full - 1;

        let removed = s.trim_to_size(budget);

        assert!(removed >= 1);
        assert!(s.serialized_len() <= budget);
        assert_eq!(s.episodes.first().unwrap().id, "e20");
        assert_eq!(s.episodes.len(), 20 - removed);
        // The newest survivors are kept in order.
        assert_eq!(s.episodes.last().unwrap().id, format!("e{}", 1 + removed));
    }

    #[test]
    fn test_trim_is_noop_within_budget() {
        let mut s = series(vec![episode("e2", 2), episode("e1", 1)]);
        let before = s.clone();
        assert_eq!(s.trim_to_size(s.serialized_len()), 0);
        assert_eq!(s, before);
    }

    #[test]
    fn test_trim_stops_when_no_episodes_remain() {
        let mut s = series(vec![episode("e1", 1)]);
        assert_eq!(s.trim_to_size(10), 1);
        assert!(s.episodes.is_empty());
    }

    #[test]
    fn test_staleness_boundary() {
        let s = series(vec![]);
        let window = Duration::from_secs(3600);
        let at_61 = s.last_fetched_at + chrono::Duration::minutes(61);
        let at_59 = s.last_fetched_at + chrono::Duration::minutes(59);
        let at_60 = s.last_fetched_at + chrono::Duration::minutes(60);
        assert!(s.is_stale_at(at_61, window));
        assert!(!s.is_stale_at(at_59, window));
        assert!(!s.is_stale_at(at_60, window));
    }

    #[test]
    fn test_sort_episodes_newest_first() {
        let mut s = series(vec![episode("e1", 1), episode("e3", 3), episode("e2", 2)]);
        s.sort_episodes();
        let ids: Vec<&str> = s.episodes.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e3", "e2", "e1"]);
    }
}
