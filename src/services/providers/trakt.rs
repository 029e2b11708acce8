//! Trakt watch-history provider
//!
//! API Flow:
//! 1. Recent history: /users/{user}/history/{movies|shows}?start_at=... → seed titles
//! 2. Full library: /users/{user}/watched/{movies|shows} → deny list
//!
//! Both calls run concurrently. Only public profiles are readable with a
//! client id alone.
use crate::{
    cache::{Cache, CacheKey},
    cached,
    error::{AppError, AppResult},
    models::{normalize_title, MediaType, UserConfig, WatchHistory, WatchedItem},
    services::providers::{ensure_success, HistoryProvider},
};
use chrono::{SecondsFormat, Utc};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const HISTORY_CACHE_TTL: Duration = Duration::from_secs(30 * 60);
const HISTORY_CACHE_CAPACITY: usize = 100;
/// Seed titles handed to the suggestion stage
const SEED_LIMIT: usize = 5;
/// Page size for the history endpoint (Trakt defaults to 10)
const HISTORY_PAGE_LIMIT: u32 = 50;
const TRAKT_API_VERSION: &str = "2";

/// One row of a history or watched listing
#[derive(Debug, Clone, Deserialize)]
pub struct TraktEntry {
    #[serde(default)]
    pub movie: Option<TraktMedia>,
    #[serde(default)]
    pub show: Option<TraktMedia>,
}

impl TraktEntry {
    fn media(&self, media_type: MediaType) -> Option<&TraktMedia> {
        match media_type {
            MediaType::Movie => self.movie.as_ref(),
            MediaType::Series => self.show.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraktMedia {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub ids: TraktIds,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraktIds {
    #[serde(default)]
    pub trakt: Option<u64>,
    #[serde(default)]
    pub imdb: Option<String>,
}

#[derive(Clone)]
pub struct TraktProvider {
    http_client: HttpClient,
    api_url: String,
    window_days: i64,
    cache: Cache,
}

impl TraktProvider {
    pub fn new(http_client: HttpClient, api_url: String, window_days: i64) -> Self {
        Self {
            http_client,
            api_url,
            window_days,
            cache: Cache::new("history", HISTORY_CACHE_CAPACITY),
        }
    }

    /// Lower bound for the history query, e.g. `2026-09-16T10:00:00.000Z`
    fn start_at(&self) -> String {
        (Utc::now() - chrono::Duration::days(self.window_days))
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    async fn get_entries(
        &self,
        url: &str,
        client_id: &str,
        query: &[(&str, String)],
    ) -> AppResult<Vec<TraktEntry>> {
        let response = self
            .http_client
            .get(url)
            .header("Content-Type", "application/json")
            .header("trakt-api-version", TRAKT_API_VERSION)
            .header("trakt-api-key", client_id)
            .query(query)
            .send()
            .await?;

        let response = ensure_success("Trakt", response).await?;
        Ok(response.json().await?)
    }
}

/// Folds history and library rows into seed and deny lists
///
/// History rows come newest first. Every title lands in the deny list;
/// the first `SEED_LIMIT` distinct titles of the history become seeds.
pub fn build_history(
    media_type: MediaType,
    history: &[TraktEntry],
    watched: &[TraktEntry],
) -> WatchHistory {
    let mut recent = Vec::new();
    let mut seed_keys = HashSet::new();
    let mut all_watched = Vec::new();
    let mut denied = HashSet::new();

    for media in history.iter().filter_map(|e| e.media(media_type)) {
        let Some(title) = media.title.as_deref().filter(|t| !t.trim().is_empty()) else {
            continue;
        };

        let normalized = normalize_title(title);
        if denied.insert(normalized.clone()) {
            all_watched.push(normalized.clone());
        }

        if recent.len() >= SEED_LIMIT {
            continue;
        }

        let seed_key = match media.ids.trakt {
            Some(id) => format!("trakt:{}", id),
            None => format!("{}:{:?}", normalized, media.year),
        };
        if seed_keys.insert(seed_key) {
            recent.push(WatchedItem {
                title: title.to_string(),
                year: media.year,
                trakt_id: media.ids.trakt,
                imdb_id: media.ids.imdb.clone(),
            });
        }
    }

    for media in watched.iter().filter_map(|e| e.media(media_type)) {
        if let Some(title) = media.title.as_deref().filter(|t| !t.trim().is_empty()) {
            let normalized = normalize_title(title);
            if denied.insert(normalized.clone()) {
                all_watched.push(normalized);
            }
        }
    }

    WatchHistory {
        recent,
        all_watched,
    }
}

#[async_trait::async_trait]
impl HistoryProvider for TraktProvider {
    async fn watch_history(
        &self,
        credentials: &UserConfig,
        media_type: MediaType,
    ) -> AppResult<WatchHistory> {
        let username = credentials
            .trakt_username()
            .ok_or(AppError::MissingCredentials("trakt_username"))?;
        let client_id = credentials
            .trakt_client_id()
            .ok_or(AppError::MissingCredentials("trakt_client_id"))?;

        cached!(
            self.cache,
            CacheKey::History {
                media_type,
                username: username.to_string(),
            },
            HISTORY_CACHE_TTL,
            async move {
                let segment = media_type.trakt_segment();
                let history_url =
                    format!("{}/users/{}/history/{}", self.api_url, username, segment);
                let watched_url =
                    format!("{}/users/{}/watched/{}", self.api_url, username, segment);
                let history_query = [
                    ("start_at", self.start_at()),
                    ("limit", HISTORY_PAGE_LIMIT.to_string()),
                ];

                let (history, watched) = tokio::try_join!(
                    self.get_entries(&history_url, client_id, &history_query),
                    self.get_entries(&watched_url, client_id, &[]),
                )?;

                let result = build_history(media_type, &history, &watched);

                tracing::info!(
                    media_type = %media_type,
                    history_rows = history.len(),
                    library_rows = watched.len(),
                    seeds = result.recent.len(),
                    denied = result.all_watched.len(),
                    provider = "trakt",
                    "Watch history fetched"
                );

                Ok::<_, AppError>(result)
            }
        )
    }

    async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn name(&self) -> &'static str {
        "trakt"
    }
}
