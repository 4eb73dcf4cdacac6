//! In-process doubles for the upstream catalog and the pacing primitive.
//!
//! Paired with [`MemoryStore`](crate::store::memory::MemoryStore) and
//! [`ChannelEventBus`](crate::events::ChannelEventBus) these run the whole
//! pipeline without Redis or NRK.

use crate::catalog::{Catalog, CatalogClient, CatalogKind, CatalogMetadata, EntryReference};
use crate::error::{NrssError, Result};
use crate::model::Episode;
use crate::orchestrator::Pacer;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// How the mock answers `fetch_catalog` for a given series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Transport-level error.
    Error,
    /// Panics inside the call.
    Panic,
}

/// Scriptable [`CatalogClient`] that counts its calls.
#[derive(Default)]
pub struct MockCatalog {
    catalogs: Mutex<HashMap<String, Catalog>>,
    unresolvable: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<String, MockFailure>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetched: Mutex<Vec<String>>,
    podcast_ids: Mutex<Vec<String>>,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    update_calls: AtomicUsize,
    resolve_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(self, series_id: &str, entries: Vec<EntryReference>) -> Self {
        self.insert_series(series_id, entries);
        self
    }

    /// Replaces the catalog served for `series_id`.
    pub fn insert_series(&self, series_id: &str, entries: Vec<EntryReference>) {
        lock(&self.catalogs).insert(series_id.to_string(), catalog(series_id, entries));
    }

    /// Episodes with these ids never resolve to a playable URL.
    pub fn set_unresolvable(&self, entry_ids: &[&str]) {
        lock(&self.unresolvable).extend(entry_ids.iter().map(|id| id.to_string()));
    }

    pub fn set_failure(&self, series_id: &str, failure: MockFailure) {
        lock(&self.failures).insert(series_id.to_string(), failure);
    }

    /// Every `fetch_catalog` call sleeps this long first.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *lock(&self.fetch_delay) = Some(delay);
    }

    /// Ids served by `list_podcast_ids`, duplicates included.
    pub fn set_podcast_ids(&self, ids: &[&str]) {
        *lock(&self.podcast_ids) = ids.iter().map(|id| id.to_string()).collect();
    }

    /// Highest number of `fetch_catalog` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    /// Series ids passed to `fetch_catalog`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }

    fn check_failure(&self, series_id: &str) -> Result<()> {
        let failure = lock(&self.failures).get(series_id).copied();
        match failure {
            Some(MockFailure::Error) => Err(NrssError::UpstreamError(format!("mock failure for {}", series_id))),
            Some(MockFailure::Panic) => panic!("mock catalog panicked for {}", series_id),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn fetch_catalog(&self, series_id: &str) -> Result<Option<Catalog>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.fetched).push(series_id.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = *lock(&self.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.check_failure(series_id)?;
        Ok(lock(&self.catalogs).get(series_id).cloned())
    }

    async fn resolve_playback_batch(&self, entries: &[EntryReference], _kind: CatalogKind) -> Vec<Episode> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let unresolvable = lock(&self.unresolvable).clone();
        entries
            .iter()
            .filter(|entry| !unresolvable.contains(&entry.id))
            .map(|entry| entry.resolve(format!("https://cdn.test/{}.mp3", entry.id)))
            .collect()
    }

    async fn fetch_catalog_updates(
        &self,
        series_id: &str,
        known_ids: &HashSet<String>,
    ) -> Result<Option<Catalog>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(series_id)?;
        Ok(lock(&self.catalogs).get(series_id).cloned().map(|mut catalog| {
            catalog.entries.retain(|entry| !known_ids.contains(&entry.id));
            catalog
        }))
    }

    async fn list_podcast_ids(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let ids = lock(&self.podcast_ids).clone();
        Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
    }
}

/// [`Pacer`] that records each suspension and returns immediately.
#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<(String, Duration)>>,
    fail: Mutex<bool>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Step names in the order they were paused on.
    pub fn steps(&self) -> Vec<String> {
        lock(&self.pauses).iter().map(|(step, _)| step.clone()).collect()
    }

    pub fn pauses(&self) -> Vec<(String, Duration)> {
        lock(&self.pauses).clone()
    }

    /// Makes subsequent pauses fail as an interrupted suspension would.
    pub fn fail_pauses(&self) {
        *lock(&self.fail) = true;
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, step: &str, duration: Duration) -> Result<()> {
        debug!("⏸️ {} for {:?} (skipped)", step, duration);
        lock(&self.pauses).push((step.to_string(), duration));
        if *lock(&self.fail) {
            return Err(NrssError::Unexpected(format!("suspension {} interrupted", step)));
        }
        Ok(())
    }
}

/// Episode reference dated `day` days into 2024, so later days sort first.
pub fn entry(id: &str, day: u32) -> EntryReference {
    EntryReference {
        id: id.to_string(),
        title: format!("Episode {}", id),
        subtitle: None,
        share_link: format!("https://radio.nrk.no/podkast/test/{}", id),
        date: Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
            + chrono::Duration::days(i64::from(day)),
        duration_in_seconds: 1800,
    }
}

/// `count` entries named `{prefix}-{n}`, newest first.
pub fn entries(prefix: &str, count: u32) -> Vec<EntryReference> {
    (0..count)
        .rev()
        .map(|n| entry(&format!("{}-{}", prefix, n), n))
        .collect()
}

pub fn catalog(series_id: &str, entries: Vec<EntryReference>) -> Catalog {
    Catalog {
        kind: CatalogKind::Podcast,
        metadata: CatalogMetadata {
            id: series_id.to_string(),
            title: format!("Series {}", series_id),
            subtitle: Some("Test series".to_string()),
            image_url: format!("https://gfx.test/{}.jpg", series_id),
        },
        entries,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
