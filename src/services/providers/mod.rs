//! External data providers
//!
//! Each pipeline stage talks to one third-party API through a trait so the
//! recommender can be exercised with mocks. Providers own their stage cache.
use crate::{
    error::AppResult,
    models::{MediaType, Meta, Suggestion, SuggestionRequest, UserConfig, WatchHistory},
};

pub mod gemini;
pub mod tmdb;
pub mod trakt;

pub use gemini::GeminiProvider;
pub use tmdb::TmdbProvider;
pub use trakt::TraktProvider;

/// Source of a user's watch history
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Recent seed titles plus the full deny list for one media type
    async fn watch_history(
        &self,
        credentials: &UserConfig,
        media_type: MediaType,
    ) -> AppResult<WatchHistory>;

    async fn clear_cache(&self);

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Generative source of title suggestions
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Suggest titles for a seed history
    ///
    /// `force_refresh` skips any cached answer for the same seed; the fresh
    /// answer replaces it.
    async fn suggest(
        &self,
        request: &SuggestionRequest,
        credentials: &UserConfig,
        force_refresh: bool,
    ) -> AppResult<Vec<Suggestion>>;

    async fn clear_cache(&self);

    fn name(&self) -> &'static str;
}

/// Resolves free-text suggestions to canonical catalog entries
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` means the title could not be matched to an IMDb id
    async fn resolve(
        &self,
        suggestion: &Suggestion,
        media_type: MediaType,
        credentials: &UserConfig,
    ) -> AppResult<Option<Meta>>;

    async fn clear_cache(&self);

    fn name(&self) -> &'static str;
}

/// Turns a non-success response into an `ExternalApi` error carrying the body
pub(crate) async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(crate::error::AppError::ExternalApi(format!(
        "{} API returned status {}: {}",
        provider, status, body
    )))
}

/// Builds the shared outbound HTTP client
pub(crate) fn http_client(timeout: std::time::Duration) -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}
