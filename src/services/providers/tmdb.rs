//! TMDB metadata provider
//!
//! Resolves a suggested title to a catalog entry with an IMDb id and artwork.
//!
//! API Flow:
//! 1. Search: /search/{movie|tv}?query=..&year=.. → TMDB id (retried without year)
//! 2. External ids: /{movie|tv}/{id}/external_ids → IMDb id
use crate::{
    cache::{Cache, CacheKey},
    cached,
    error::{AppError, AppResult},
    models::{MediaType, Meta, Suggestion, UserConfig},
    services::providers::{ensure_success, MetadataProvider},
};
use reqwest::{Client as HttpClient, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

const METADATA_CACHE_TTL: Duration = Duration::from_secs(72 * 60 * 60);
const METADATA_CACHE_CAPACITY: usize = 500;
/// v4 read tokens are long JWTs; v3 keys are 32 hex chars
const BEARER_TOKEN_MIN_LEN: usize = 50;
const SEARCH_LANGUAGE: &str = "en-US";
const POSTER_SIZE: &str = "w500";
const BACKGROUND_SIZE: &str = "original";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<TmdbResult>,
}

/// Search hit from /search/movie or /search/tv
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbResult {
    pub id: u64,
    /// Movies carry `title`, TV shows carry `name`
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExternalIds {
    #[serde(default)]
    imdb_id: Option<String>,
}

/// How the user's key is presented to TMDB
#[derive(Debug, Clone, Copy, PartialEq)]
enum TmdbAuth<'a> {
    Bearer(&'a str),
    ApiKey(&'a str),
}

impl<'a> TmdbAuth<'a> {
    fn from_key(key: &'a str) -> Self {
        if key.len() > BEARER_TOKEN_MIN_LEN {
            TmdbAuth::Bearer(key)
        } else {
            TmdbAuth::ApiKey(key)
        }
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            TmdbAuth::Bearer(token) => builder.bearer_auth(token),
            TmdbAuth::ApiKey(key) => builder.query(&[("api_key", key)]),
        }
    }
}

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_url: String,
    image_url: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(http_client: HttpClient, api_url: String, image_url: String) -> Self {
        Self {
            http_client,
            api_url,
            image_url,
            cache: Cache::new("metadata", METADATA_CACHE_CAPACITY),
        }
    }

    async fn search(
        &self,
        auth: TmdbAuth<'_>,
        media_type: MediaType,
        title: &str,
        year: Option<i32>,
    ) -> AppResult<Vec<TmdbResult>> {
        let url = format!("{}/search/{}", self.api_url, media_type.tmdb_segment());

        let mut query = vec![
            ("query", title.to_string()),
            ("language", SEARCH_LANGUAGE.to_string()),
        ];
        if let Some(year) = year {
            query.push(("year", year.to_string()));
        }

        let request = auth.apply(self.http_client.get(&url).query(&query));
        let response = ensure_success("TMDB", request.send().await?).await?;
        let search: SearchResponse = response.json().await?;

        Ok(search.results)
    }

    async fn imdb_id(
        &self,
        auth: TmdbAuth<'_>,
        media_type: MediaType,
        tmdb_id: u64,
    ) -> AppResult<Option<String>> {
        let url = format!(
            "{}/{}/{}/external_ids",
            self.api_url,
            media_type.tmdb_segment(),
            tmdb_id
        );

        let request = auth.apply(self.http_client.get(&url));
        let response = ensure_success("TMDB", request.send().await?).await?;
        let ids: ExternalIds = response.json().await?;

        Ok(ids.imdb_id.filter(|id| !id.trim().is_empty()))
    }

    fn image(&self, size: &str, path: Option<&str>) -> Option<String> {
        path.filter(|p| !p.is_empty())
            .map(|p| format!("{}/{}{}", self.image_url, size, p))
    }

    /// Builds the catalog entry for a search hit
    pub fn to_meta(&self, media_type: MediaType, result: TmdbResult, imdb_id: String) -> Meta {
        let (name, date) = match media_type {
            MediaType::Movie => (result.title.or(result.name), result.release_date),
            MediaType::Series => (result.name.or(result.title), result.first_air_date),
        };

        Meta {
            id: imdb_id,
            media_type,
            name: name.unwrap_or_default(),
            poster: self.image(POSTER_SIZE, result.poster_path.as_deref()),
            background: self.image(BACKGROUND_SIZE, result.backdrop_path.as_deref()),
            description: result.overview.filter(|o| !o.is_empty()),
            release_info: date.and_then(|d| d.get(..4).map(str::to_string)),
        }
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn resolve(
        &self,
        suggestion: &Suggestion,
        media_type: MediaType,
        credentials: &UserConfig,
    ) -> AppResult<Option<Meta>> {
        let api_key = credentials
            .tmdb_api_key()
            .ok_or(AppError::MissingCredentials("tmdb_api_key"))?;
        let auth = TmdbAuth::from_key(api_key);

        cached!(
            self.cache,
            CacheKey::Metadata {
                media_type,
                title: suggestion.title.clone(),
                year: suggestion.year,
            },
            METADATA_CACHE_TTL,
            async move {
                let title = suggestion.title.as_str();
                let mut results = self.search(auth, media_type, title, suggestion.year).await?;

                // Suggested years are often off by a season or a festival run
                if results.is_empty() && suggestion.year.is_some() {
                    results = self.search(auth, media_type, title, None).await?;
                }

                let Some(first) = results.into_iter().next() else {
                    tracing::warn!(title = %title, year = ?suggestion.year, "No TMDB match");
                    return Ok::<_, AppError>(None);
                };

                let Some(imdb_id) = self.imdb_id(auth, media_type, first.id).await? else {
                    tracing::warn!(
                        title = %title,
                        tmdb_id = first.id,
                        "TMDB match has no IMDb id, skipping"
                    );
                    return Ok(None);
                };

                tracing::debug!(title = %title, imdb_id = %imdb_id, "Suggestion resolved");
                Ok(Some(self.to_meta(media_type, first, imdb_id)))
            }
        )
    }

    async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}
