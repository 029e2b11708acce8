use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    models::{
        CatalogExtra, CatalogResponse, MediaType, Meta, Suggestion, SuggestionRequest, UserConfig,
        WatchHistory,
    },
    services::providers::{
        http_client, GeminiProvider, HistoryProvider, MetadataProvider, SuggestionProvider,
        TmdbProvider, TraktProvider,
    },
};

/// Client-side cache for a successful catalog
const CACHE_MAX_AGE: u64 = 72 * 60 * 60;
const STALE_REVALIDATE: u64 = 24 * 60 * 60;
/// Client-side cache for the error card, short so the client retries soon
const ERROR_CACHE_MAX_AGE: u64 = 5 * 60;
const ERROR_POSTER: &str =
    "https://placehold.co/500x750/1a1d24/8b5cf6?text=Recommendations%5CnUnavailable";

/// Composes history, suggestions and metadata into one catalog
///
/// Every stage failure is logged and treated as an empty result; a catalog
/// request always produces a response.
pub struct Recommender {
    history: Arc<dyn HistoryProvider>,
    suggestions: Arc<dyn SuggestionProvider>,
    metadata: Arc<dyn MetadataProvider>,
}

impl Recommender {
    pub fn new(
        history: Arc<dyn HistoryProvider>,
        suggestions: Arc<dyn SuggestionProvider>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            history,
            suggestions,
            metadata,
        }
    }

    /// Wires the Trakt, Gemini and TMDB providers from configuration
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = http_client(config.http_timeout())?;

        let history = TraktProvider::new(
            client.clone(),
            config.trakt_api_url.clone(),
            config.history_window_days,
        );
        let suggestions = GeminiProvider::new(
            client.clone(),
            config.gemini_api_url.clone(),
            config.gemini_models.clone(),
        );
        let metadata = TmdbProvider::new(
            client,
            config.tmdb_api_url.clone(),
            config.tmdb_image_url.clone(),
        );

        tracing::info!(
            history = history.name(),
            suggestions = suggestions.name(),
            metadata = metadata.name(),
            models = ?config.gemini_models,
            "Recommender initialised"
        );

        Ok(Self::new(
            Arc::new(history),
            Arc::new(suggestions),
            Arc::new(metadata),
        ))
    }

    /// Media type served by a catalog, if the type and id belong together
    pub fn catalog_media_type(media_type: &str, catalog_id: &str) -> Option<MediaType> {
        let media_type: MediaType = media_type.parse().ok()?;
        (media_type.catalog_id() == catalog_id).then_some(media_type)
    }

    /// Builds the catalog for one request
    ///
    /// Only the first page is generated; later pages are empty.
    pub async fn catalog(
        &self,
        media_type: &str,
        catalog_id: &str,
        extra: &CatalogExtra,
        credentials: &UserConfig,
    ) -> CatalogResponse {
        let Some(media_type) = Self::catalog_media_type(media_type, catalog_id) else {
            tracing::debug!(media_type = %media_type, catalog_id = %catalog_id, "Unknown catalog");
            return CatalogResponse::empty();
        };

        if extra.skip() > 0 {
            return CatalogResponse::empty();
        }

        tracing::info!(media_type = %media_type, genre = ?extra.genre, "Building recommendations");

        let history = self.load_history(credentials, media_type).await;
        let metas = if history.is_empty() {
            Vec::new()
        } else {
            self.recommend(&history, media_type, extra.genre.clone(), credentials)
                .await
        };

        if metas.is_empty() {
            tracing::warn!(media_type = %media_type, "No recommendations, serving error card");
            return CatalogResponse {
                metas: vec![error_card(media_type)],
                cache_max_age: Some(ERROR_CACHE_MAX_AGE),
                stale_revalidate: None,
            };
        }

        tracing::info!(media_type = %media_type, count = metas.len(), "Recommendations ready");

        CatalogResponse {
            metas,
            cache_max_age: Some(CACHE_MAX_AGE),
            stale_revalidate: Some(STALE_REVALIDATE),
        }
    }

    /// Suggestion and resolution stages, with one fresh retry
    ///
    /// The retry reuses the history already fetched.
    async fn recommend(
        &self,
        history: &WatchHistory,
        media_type: MediaType,
        genre: Option<String>,
        credentials: &UserConfig,
    ) -> Vec<Meta> {
        let request = SuggestionRequest {
            media_type,
            history: history.recent.clone(),
            exclude: history.all_watched.clone(),
            genre,
        };

        let suggestions = self.suggest(&request, credentials, false).await;
        let metas = self
            .resolve_all(unwatched(history, &suggestions), media_type, credentials)
            .await;

        if !metas.is_empty() || suggestions.is_empty() {
            return metas;
        }

        tracing::warn!(
            media_type = %media_type,
            suggestions = suggestions.len(),
            "No suggestion resolved, retrying with fresh suggestions"
        );

        let fresh = self.suggest(&request, credentials, true).await;
        self.resolve_all(unwatched(history, &fresh), media_type, credentials)
            .await
    }

    async fn load_history(&self, credentials: &UserConfig, media_type: MediaType) -> WatchHistory {
        match self.history.watch_history(credentials, media_type).await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!(
                    media_type = %media_type,
                    error = %e,
                    "Failed to fetch watch history"
                );
                WatchHistory::default()
            }
        }
    }

    async fn suggest(
        &self,
        request: &SuggestionRequest,
        credentials: &UserConfig,
        force_refresh: bool,
    ) -> Vec<Suggestion> {
        match self
            .suggestions
            .suggest(request, credentials, force_refresh)
            .await
        {
            Ok(suggestions) => suggestions,
            Err(e) => {
                tracing::error!(
                    media_type = %request.media_type,
                    force_refresh,
                    error = %e,
                    "Failed to generate suggestions"
                );
                Vec::new()
            }
        }
    }

    /// Resolves every suggestion in parallel, keeping suggestion order
    async fn resolve_all(
        &self,
        suggestions: Vec<Suggestion>,
        media_type: MediaType,
        credentials: &UserConfig,
    ) -> Vec<Meta> {
        let mut tasks = Vec::with_capacity(suggestions.len());

        for suggestion in suggestions {
            let provider = Arc::clone(&self.metadata);
            let credentials = credentials.clone();
            let task = tokio::spawn(async move {
                let result = provider.resolve(&suggestion, media_type, &credentials).await;
                (suggestion, result)
            });
            tasks.push(task);
        }

        let mut metas = Vec::new();
        let mut seen = HashSet::new();
        let mut unresolved = 0;
        let mut errors = 0;

        for task in tasks {
            match task.await {
                Ok((_, Ok(Some(meta)))) => {
                    if seen.insert(meta.id.clone()) {
                        metas.push(meta);
                    }
                }
                Ok((_, Ok(None))) => unresolved += 1,
                Ok((suggestion, Err(e))) => {
                    tracing::error!(
                        title = %suggestion.title,
                        error = %e,
                        "Metadata lookup failed"
                    );
                    errors += 1;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Task join error");
                    errors += 1;
                }
            }
        }

        if unresolved > 0 || errors > 0 {
            tracing::warn!(
                resolved = metas.len(),
                unresolved,
                errors,
                "Partial metadata resolution"
            );
        }

        metas
    }

    /// Empties every stage cache
    pub async fn clear_caches(&self) {
        self.history.clear_cache().await;
        self.suggestions.clear_cache().await;
        self.metadata.clear_cache().await;
    }
}

/// Drops suggestions the user has already watched
fn unwatched(history: &WatchHistory, suggestions: &[Suggestion]) -> Vec<Suggestion> {
    suggestions
        .iter()
        .filter(|s| !history.has_watched(&s.title))
        .cloned()
        .collect()
}

/// Placeholder entry shown when nothing could be recommended
pub fn error_card(media_type: MediaType) -> Meta {
    Meta {
        id: format!("recommendations-error-{}", Utc::now().timestamp_millis()),
        media_type,
        name: "Recommendations unavailable".to_string(),
        poster: Some(ERROR_POSTER.to_string()),
        background: None,
        description: Some(
            "No recommendations could be generated. Your recent watch history may be too short, \
             one of your API keys may be wrong, or the AI service may be overloaded on its free \
             tier. Please try again in a few minutes."
                .to_string(),
        ),
        release_info: Some("Error".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::WatchedItem;
    use crate::services::providers::{
        MockHistoryProvider, MockMetadataProvider, MockSuggestionProvider,
    };
    use mockall::predicate::eq;

    fn history() -> WatchHistory {
        WatchHistory {
            recent: vec![WatchedItem {
                title: "Inception".to_string(),
                year: Some(2010),
                trakt_id: Some(1),
                imdb_id: Some("tt1375666".to_string()),
            }],
            all_watched: vec!["inception".to_string(), "heat".to_string()],
        }
    }

    fn suggestion(title: &str) -> Suggestion {
        Suggestion {
            title: title.to_string(),
            year: Some(2000),
        }
    }

    fn meta(id: &str, title: &str) -> Meta {
        Meta {
            id: id.to_string(),
            media_type: MediaType::Movie,
            name: title.to_string(),
            poster: None,
            background: None,
            description: None,
            release_info: None,
        }
    }

    fn recommender(
        history: MockHistoryProvider,
        suggestions: MockSuggestionProvider,
        metadata: MockMetadataProvider,
    ) -> Recommender {
        Recommender::new(Arc::new(history), Arc::new(suggestions), Arc::new(metadata))
    }

    fn history_returning(result: fn() -> AppResult<WatchHistory>) -> MockHistoryProvider {
        let mut mock = MockHistoryProvider::new();
        mock.expect_watch_history()
            .times(1)
            .returning(move |_, _| result());
        mock
    }

    async fn movie_catalog(recommender: &Recommender) -> CatalogResponse {
        recommender
            .catalog(
                "movie",
                "gemini-movie-recommendations",
                &CatalogExtra::default(),
                &UserConfig::default(),
            )
            .await
    }

    #[test]
    fn test_catalog_media_type() {
        assert_eq!(
            Recommender::catalog_media_type("movie", "gemini-movie-recommendations"),
            Some(MediaType::Movie)
        );
        assert_eq!(
            Recommender::catalog_media_type("series", "gemini-series-recommendations"),
            Some(MediaType::Series)
        );
        assert_eq!(
            Recommender::catalog_media_type("series", "gemini-movie-recommendations"),
            None
        );
        assert_eq!(Recommender::catalog_media_type("tv", "anything"), None);
    }

    #[test]
    fn test_error_card() {
        let card = error_card(MediaType::Series);
        assert!(card.id.starts_with("recommendations-error-"));
        assert_eq!(card.media_type, MediaType::Series);
        assert_eq!(card.release_info.as_deref(), Some("Error"));
        assert!(card.poster.is_some());
    }

    #[test]
    fn test_unwatched_filters_deny_list() {
        let kept = unwatched(&history(), &[suggestion("Heat"), suggestion("Alien")]);
        assert_eq!(kept, vec![suggestion("Alien")]);
    }

    #[tokio::test]
    async fn test_resolves_in_suggestion_order_with_cache_hints() {
        let history = history_returning(|| Ok(history()));

        let mut suggestions = MockSuggestionProvider::new();
        suggestions
            .expect_suggest()
            .withf(|request, _, refresh| {
                !*refresh && request.exclude.len() == 2 && request.history.len() == 1
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    suggestion("Alien"),
                    suggestion("Heat"),
                    suggestion("Arrival"),
                ])
            });

        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_resolve()
            .withf(|s, _, _| s.title != "Heat")
            .times(2)
            .returning(|s, _, _| {
                let id = if s.title == "Alien" {
                    "tt0078748"
                } else {
                    "tt2543164"
                };
                Ok(Some(meta(id, &s.title)))
            });

        let response = movie_catalog(&recommender(history, suggestions, metadata)).await;

        let names: Vec<&str> = response.metas.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alien", "Arrival"]);
        assert_eq!(response.cache_max_age, Some(CACHE_MAX_AGE));
        assert_eq!(response.stale_revalidate, Some(STALE_REVALIDATE));
    }

    #[tokio::test]
    async fn test_genre_is_forwarded() {
        let history = history_returning(|| Ok(history()));

        let mut suggestions = MockSuggestionProvider::new();
        suggestions
            .expect_suggest()
            .withf(|request, _, _| request.genre.as_deref() == Some("Horror"))
            .times(1)
            .returning(|_, _, _| Ok(vec![suggestion("Alien")]));

        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_resolve()
            .returning(|s, _, _| Ok(Some(meta("tt0078748", &s.title))));

        let extra = CatalogExtra {
            skip: None,
            genre: Some("Horror".to_string()),
        };
        let response = recommender(history, suggestions, metadata)
            .catalog(
                "movie",
                "gemini-movie-recommendations",
                &extra,
                &UserConfig::default(),
            )
            .await;

        assert_eq!(response.metas.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_once_with_fresh_suggestions() {
        let history = history_returning(|| Ok(history()));

        let mut suggestions = MockSuggestionProvider::new();
        suggestions
            .expect_suggest()
            .withf(|_, _, refresh| !*refresh)
            .times(1)
            .returning(|_, _, _| Ok(vec![suggestion("Unfindable")]));
        suggestions
            .expect_suggest()
            .withf(|_, _, refresh| *refresh)
            .times(1)
            .returning(|_, _, _| Ok(vec![suggestion("Arrival")]));

        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_resolve()
            .returning(|s, _, _| match s.title.as_str() {
                "Arrival" => Ok(Some(meta("tt2543164", "Arrival"))),
                _ => Ok(None),
            });

        let response = movie_catalog(&recommender(history, suggestions, metadata)).await;

        assert_eq!(response.metas.len(), 1);
        assert_eq!(response.metas[0].id, "tt2543164");
        assert_eq!(response.cache_max_age, Some(CACHE_MAX_AGE));
    }

    #[tokio::test]
    async fn test_error_card_after_failed_retry() {
        let history = history_returning(|| Ok(history()));

        let mut suggestions = MockSuggestionProvider::new();
        suggestions
            .expect_suggest()
            .times(2)
            .returning(|_, _, _| Ok(vec![suggestion("Unfindable")]));

        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_resolve()
            .times(2)
            .returning(|_, _, _| Err(AppError::ExternalApi("TMDB down".to_string())));

        let response = movie_catalog(&recommender(history, suggestions, metadata)).await;

        assert_eq!(response.metas.len(), 1);
        assert!(response.metas[0].id.starts_with("recommendations-error-"));
        assert_eq!(response.cache_max_age, Some(ERROR_CACHE_MAX_AGE));
        assert_eq!(response.stale_revalidate, None);
    }

    #[tokio::test]
    async fn test_no_retry_when_no_suggestions() {
        let history = history_returning(|| Ok(history()));

        let mut suggestions = MockSuggestionProvider::new();
        suggestions
            .expect_suggest()
            .times(1)
            .returning(|_, _, _| Err(AppError::QuotaExceeded("all models".to_string())));

        let response = movie_catalog(&recommender(
            history,
            suggestions,
            MockMetadataProvider::new(),
        ))
        .await;

        assert!(response.metas[0].id.starts_with("recommendations-error-"));
    }

    #[tokio::test]
    async fn test_empty_history_skips_suggestions() {
        let history = history_returning(|| Ok(WatchHistory::default()));

        let response = movie_catalog(&recommender(
            history,
            MockSuggestionProvider::new(),
            MockMetadataProvider::new(),
        ))
        .await;

        assert_eq!(response.metas.len(), 1);
        assert_eq!(response.cache_max_age, Some(ERROR_CACHE_MAX_AGE));
    }

    #[tokio::test]
    async fn test_history_error_degrades_to_error_card() {
        let history = history_returning(|| Err(AppError::MissingCredentials("trakt_username")));

        let response = movie_catalog(&recommender(
            history,
            MockSuggestionProvider::new(),
            MockMetadataProvider::new(),
        ))
        .await;

        assert!(response.metas[0].id.starts_with("recommendations-error-"));
    }

    #[tokio::test]
    async fn test_duplicate_ids_are_dropped() {
        let history = history_returning(|| Ok(history()));

        let mut suggestions = MockSuggestionProvider::new();
        suggestions
            .expect_suggest()
            .returning(|_, _, _| Ok(vec![suggestion("Alien"), suggestion("ALIEN")]));

        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_resolve()
            .times(2)
            .returning(|_, _, _| Ok(Some(meta("tt0078748", "Alien"))));

        let response = movie_catalog(&recommender(history, suggestions, metadata)).await;

        assert_eq!(response.metas.len(), 1);
    }

    #[tokio::test]
    async fn test_series_catalog_uses_series_type() {
        let mut history = MockHistoryProvider::new();
        history
            .expect_watch_history()
            .with(mockall::predicate::always(), eq(MediaType::Series))
            .times(1)
            .returning(|_, _| Ok(WatchHistory::default()));

        let response = recommender(
            history,
            MockSuggestionProvider::new(),
            MockMetadataProvider::new(),
        )
        .catalog(
            "series",
            "gemini-series-recommendations",
            &CatalogExtra::default(),
            &UserConfig::default(),
        )
        .await;

        assert_eq!(response.metas[0].media_type, MediaType::Series);
    }

    #[tokio::test]
    async fn test_later_pages_and_unknown_catalogs_are_empty() {
        let recommender = recommender(
            MockHistoryProvider::new(),
            MockSuggestionProvider::new(),
            MockMetadataProvider::new(),
        );

        let extra = CatalogExtra {
            skip: Some(100),
            genre: None,
        };
        let paged = recommender
            .catalog(
                "movie",
                "gemini-movie-recommendations",
                &extra,
                &UserConfig::default(),
            )
            .await;
        assert_eq!(paged, CatalogResponse::empty());

        let unknown = recommender
            .catalog(
                "movie",
                "gemini-series-recommendations",
                &CatalogExtra::default(),
                &UserConfig::default(),
            )
            .await;
        assert_eq!(unknown, CatalogResponse::empty());
    }

    #[tokio::test]
    async fn test_clear_caches_reaches_every_stage() {
        let mut history = MockHistoryProvider::new();
        history.expect_clear_cache().times(1).return_const(());
        let mut suggestions = MockSuggestionProvider::new();
        suggestions.expect_clear_cache().times(1).return_const(());
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_clear_cache().times(1).return_const(());

        recommender(history, suggestions, metadata)
            .clear_caches()
            .await;
    }
}
