//! NRK podcast API client.
//!
//! Series live under either the podcast or the series namespace; the podcast
//! endpoints are tried first. Umbrella series list their episodes per season.

use super::{Catalog, CatalogClient, CatalogKind, CatalogMetadata, EntryReference};
use crate::config::Config;
use crate::error::{NrssError, Result};
use crate::model::Episode;
use crate::utils::delay_with_jitter;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

const EPISODES_PAGE_SIZE: usize = 50;
const CATEGORY_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Titles {
    title: String,
    #[serde(default)]
    subtitle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageVariant {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeriesViewModel {
    id: String,
    titles: Titles,
    #[serde(default)]
    square_image: Vec<ImageVariant>,
}

#[derive(Debug, Deserialize)]
struct HalLink {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogLinks {
    #[serde(default)]
    seasons: Vec<HalLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSeriesResponse {
    series: Option<SeriesViewModel>,
    #[serde(default)]
    series_type: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(rename = "_links", default)]
    links: CatalogLinks,
}

#[derive(Debug, Default, Deserialize)]
struct EpisodeLinks {
    #[serde(default)]
    share: Option<HalLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeResource {
    episode_id: String,
    date: DateTime<Utc>,
    titles: Titles,
    #[serde(default)]
    duration_in_seconds: u64,
    #[serde(rename = "_links", default)]
    links: EpisodeLinks,
}

impl EpisodeResource {
    fn into_reference(self) -> EntryReference {
        EntryReference {
            id: self.episode_id,
            title: self.titles.title,
            subtitle: self.titles.subtitle,
            share_link: self.links.share.map(|l| l.href).unwrap_or_default(),
            date: self.date,
            duration_in_seconds: self.duration_in_seconds,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct EpisodeList {
    #[serde(default)]
    episodes: Vec<EpisodeResource>,
}

#[derive(Debug, Default, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<HalLink>,
}

#[derive(Debug, Deserialize)]
struct EpisodesResponse {
    #[serde(rename = "_embedded", default)]
    embedded: EpisodeList,
    #[serde(rename = "_links", default)]
    links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct SeasonEmbedded {
    #[serde(default)]
    episodes: SeasonEpisodes,
}

#[derive(Debug, Default, Deserialize)]
struct SeasonEpisodes {
    #[serde(rename = "_embedded", default)]
    embedded: EpisodeList,
}

#[derive(Debug, Deserialize)]
struct SeasonResponse {
    #[serde(rename = "_embedded", default)]
    embedded: SeasonEmbedded,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategorySeriesItem {
    #[serde(default)]
    series_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl CategorySeriesItem {
    fn into_id(self) -> Option<String> {
        self.series_id.or(self.id).filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct CategoryResponse {
    #[serde(default)]
    series: Option<Vec<CategorySeriesItem>>,
}

#[derive(Debug, Deserialize)]
struct PlaybackAsset {
    url: String,
}

#[derive(Debug, Deserialize)]
struct Playable {
    #[serde(default)]
    assets: Vec<PlaybackAsset>,
}

#[derive(Debug, Deserialize)]
struct PlaybackManifest {
    #[serde(default)]
    playable: Option<Playable>,
}

#[derive(Debug, Clone)]
pub struct NrkClient {
    http: reqwest::Client,
    base_url: Url,
    request_delay: Duration,
    request_jitter: f64,
}

impl NrkClient {
    pub fn new(base_url: &str, request_delay: Duration, request_jitter: f64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            request_delay,
            request_jitter,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.nrk_api_base_url,
            Duration::from_millis(config.nrk_fetch_delay_ms),
            config.nrk_fetch_delay_jitter,
        )
    }

    fn url(&self, path_or_href: &str) -> Result<Url> {
        Ok(self.base_url.join(path_or_href)?)
    }

    /// GETs JSON, returning `None` for non-200 responses or unparseable bodies.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = self.http.get(url.clone()).send().await;
        let outcome = match response {
            Ok(resp) if resp.status() == StatusCode::OK => match resp.json::<T>().await {
                Ok(body) => Ok(Some(body)),
                Err(e) => {
                    debug!("Unparseable body from {}: {}", url, e);
                    Ok(None)
                }
            },
            Ok(resp) => {
                debug!("{} -> {}", url, resp.status());
                Ok(None)
            }
            Err(e) => Err(NrssError::UpstreamError(format!("GET {} failed: {}", url, e))),
        };
        self.pace().await;
        outcome
    }

    async fn pace(&self) {
        let delay = delay_with_jitter(self.request_delay, self.request_jitter);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn series_metadata(&self, series_id: &str) -> Result<Option<(CatalogSeriesResponse, bool)>> {
        let podcast = self
            .get_json::<CatalogSeriesResponse>(self.url(&format!("/radio/catalog/podcast/{}", series_id))?)
            .await?;
        if let Some(body) = podcast.filter(|b| b.series.is_some()) {
            return Ok(Some((body, true)));
        }
        debug!("{}: trying series endpoints...", series_id);
        let series = self
            .get_json::<CatalogSeriesResponse>(self.url(&format!("/radio/catalog/series/{}", series_id))?)
            .await?;
        Ok(series.filter(|b| b.series.is_some()).map(|b| (b, false)))
    }

    /// Pages through the flat episode listing. With `known_ids`, stops at the
    /// first already-known episode.
    async fn list_episodes(
        &self,
        series_id: &str,
        is_podcast: bool,
        known_ids: Option<&HashSet<String>>,
    ) -> Result<Vec<EpisodeResource>> {
        let namespace = if is_podcast { "podcast" } else { "series" };
        let base = format!("/radio/catalog/{}/{}/episodes", namespace, series_id);
        let mut all: Vec<EpisodeResource> = Vec::new();
        let mut page = 1;
        let mut next = Some(self.url(&format!("{}?pageSize={}&page={}", base, EPISODES_PAGE_SIZE, page))?);

        while let Some(url) = next.take() {
            let Some(body) = self.get_json::<EpisodesResponse>(url).await? else {
                break;
            };
            let page_len = body.embedded.episodes.len();
            let mut reached_known = false;
            for episode in body.embedded.episodes {
                if known_ids.map_or(false, |known| known.contains(&episode.episode_id)) {
                    reached_known = true;
                    break;
                }
                all.push(episode);
            }
            if reached_known {
                break;
            }
            debug!("{}: catalog {} episodes", series_id, all.len());

            next = match body.links.next {
                Some(link) => Some(self.url(&link.href)?),
                None if page_len >= EPISODES_PAGE_SIZE => {
                    page += 1;
                    Some(self.url(&format!("{}?pageSize={}&page={}", base, EPISODES_PAGE_SIZE, page))?)
                }
                None => None,
            };
        }
        Ok(all)
    }

    /// Lists every season in full, dropping already-known episodes.
    async fn list_seasons(
        &self,
        seasons: &[HalLink],
        known_ids: Option<&HashSet<String>>,
    ) -> Result<Vec<EpisodeResource>> {
        let mut all = Vec::new();
        for season in seasons {
            let Some(body) = self.get_json::<SeasonResponse>(self.url(&season.href)?).await? else {
                continue;
            };
            all.extend(
                body.embedded
                    .episodes
                    .embedded
                    .episodes
                    .into_iter()
                    .filter(|ep| known_ids.map_or(true, |known| !known.contains(&ep.episode_id))),
            );
        }
        Ok(all)
    }

    async fn catalog(&self, series_id: &str, known_ids: Option<&HashSet<String>>) -> Result<Option<Catalog>> {
        let Some((body, is_podcast)) = self.series_metadata(series_id).await? else {
            info!("NRK has no series data for {}", series_id);
            return Ok(None);
        };
        let Some(view) = body.series else {
            return Ok(None);
        };
        let kind = match body.kind.as_deref() {
            Some("series") => CatalogKind::Series,
            _ => CatalogKind::Podcast,
        };

        let umbrella = body.series_type.as_deref() == Some("umbrella") && !body.links.seasons.is_empty();
        let resources = if umbrella {
            debug!("{}: umbrella with {} seasons", series_id, body.links.seasons.len());
            self.list_seasons(&body.links.seasons, known_ids).await?
        } else {
            self.list_episodes(series_id, is_podcast, known_ids).await?
        };

        let metadata = CatalogMetadata {
            id: view.id,
            title: view.titles.title,
            subtitle: view.titles.subtitle,
            image_url: view.square_image.last().map(|img| img.url.clone()).unwrap_or_default(),
        };
        Ok(Some(Catalog {
            kind,
            metadata,
            entries: resources.into_iter().map(EpisodeResource::into_reference).collect(),
        }))
    }

    /// Pages the podcast category listing until a short or empty page.
    async fn list_category(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        let mut skip = 0;
        loop {
            let url = self.url(&format!(
                "/radio/search/categories/podcast?take={}&skip={}",
                CATEGORY_PAGE_SIZE, skip
            ))?;
            let page = match self.get_json::<CategoryResponse>(url).await? {
                Some(CategoryResponse { series: Some(series) }) => series,
                _ => break,
            };
            if page.is_empty() {
                break;
            }
            let page_len = page.len();
            ids.extend(
                page.into_iter()
                    .filter_map(CategorySeriesItem::into_id)
                    .filter(|id| seen.insert(id.clone())),
            );
            if page_len < CATEGORY_PAGE_SIZE {
                break;
            }
            skip += CATEGORY_PAGE_SIZE;
        }
        info!("📋 NRK podcast category lists {} series", ids.len());
        Ok(ids)
    }

    /// Tries the namespace matching `kind` first, then the other one, then the generic manifest.
    async fn playback_url(&self, episode_id: &str, kind: CatalogKind) -> Option<String> {
        let (first, second) = match kind {
            CatalogKind::Podcast => ("podcast", "program"),
            CatalogKind::Series => ("program", "podcast"),
        };
        let paths = [
            format!("/playback/manifest/{}/{}", first, episode_id),
            format!("/playback/manifest/{}/{}", second, episode_id),
            format!("/playback/manifest/{}", episode_id),
        ];
        for path in &paths {
            let url = match self.url(path) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Invalid playback URL for {}: {}", episode_id, e);
                    return None;
                }
            };
            match self.get_json::<PlaybackManifest>(url).await {
                Ok(Some(manifest)) => {
                    let asset = manifest
                        .playable
                        .and_then(|p| p.assets.into_iter().next())
                        .map(|a| a.url);
                    if asset.is_some() {
                        return asset;
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("Playback lookup failed for {}: {}", episode_id, e),
            }
        }
        None
    }
}

#[async_trait]
impl CatalogClient for NrkClient {
    async fn fetch_catalog(&self, series_id: &str) -> Result<Option<Catalog>> {
        self.catalog(series_id, None).await
    }

    async fn resolve_playback_batch(&self, entries: &[EntryReference], kind: CatalogKind) -> Vec<Episode> {
        let resolved = join_all(entries.iter().map(|entry| async move {
            self.playback_url(&entry.id, kind).await.map(|url| entry.resolve(url))
        }))
        .await;
        let episodes: Vec<Episode> = resolved.into_iter().flatten().collect();
        if episodes.len() < entries.len() {
            debug!("Skipped {} non-playable in batch", entries.len() - episodes.len());
        }
        episodes
    }

    async fn fetch_catalog_updates(
        &self,
        series_id: &str,
        known_ids: &HashSet<String>,
    ) -> Result<Option<Catalog>> {
        self.catalog(series_id, Some(known_ids)).await
    }

    async fn list_podcast_ids(&self) -> Result<Vec<String>> {
        self.list_category().await
    }
}
