//! Upstream podcast catalog collaborator.

pub mod nrk;

pub use nrk::NrkClient;

use crate::error::Result;
use crate::model::{Episode, Series};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Which catalog namespace a series lives in upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Podcast,
    Series,
}

impl CatalogKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Podcast => "podcast",
            CatalogKind::Series => "series",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMetadata {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
}

/// An episode listed by the catalog whose playable URL is not yet known.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryReference {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub share_link: String,
    pub date: DateTime<Utc>,
    pub duration_in_seconds: u64,
}

impl EntryReference {
    pub fn resolve(&self, url: String) -> Episode {
        Episode {
            id: self.id.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            url,
            share_link: self.share_link.clone(),
            date: self.date,
            duration_in_seconds: self.duration_in_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub kind: CatalogKind,
    pub metadata: CatalogMetadata,
    pub entries: Vec<EntryReference>,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Metadata plus every episode reference. `None` when upstream has no such series.
    async fn fetch_catalog(&self, series_id: &str) -> Result<Option<Catalog>>;

    /// Resolves playable URLs. Episodes that fail to resolve are dropped, so the
    /// result may be shorter than `entries`.
    async fn resolve_playback_batch(&self, entries: &[EntryReference], kind: CatalogKind) -> Vec<Episode>;

    /// Like [`fetch_catalog`](Self::fetch_catalog) but only lists episodes whose ids
    /// are not in `known_ids`.
    async fn fetch_catalog_updates(
        &self,
        series_id: &str,
        known_ids: &HashSet<String>,
    ) -> Result<Option<Catalog>>;

    /// Every podcast series id in the upstream category listing, deduplicated,
    /// in listing order.
    async fn list_podcast_ids(&self) -> Result<Vec<String>>;
}

pub fn series_link(series_id: &str) -> String {
    format!("https://radio.nrk.no/podkast/{}", series_id)
}

/// Assembles a full snapshot stamped as fetched now, newest episode first.
pub fn build_series(metadata: &CatalogMetadata, episodes: Vec<Episode>) -> Series {
    let mut series = Series {
        id: metadata.id.clone(),
        title: metadata.title.clone(),
        subtitle: metadata.subtitle.clone(),
        link: series_link(&metadata.id),
        image_url: metadata.image_url.clone(),
        last_fetched_at: Utc::now(),
        episodes,
    };
    series.sort_episodes();
    series
}
