//! Gemini suggestion provider
//!
//! Sends one prompt per request to `generateContent` and walks a list of
//! models from best to cheapest, moving on only when a model is over quota.
use crate::{
    cache::{Cache, CacheKey},
    cached,
    error::{AppError, AppResult},
    models::{MediaType, Suggestion, SuggestionRequest, UserConfig},
    services::providers::SuggestionProvider,
};
use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SUGGESTION_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 60);
const SUGGESTION_CACHE_CAPACITY: usize = 100;
/// Deny-list titles quoted in the prompt
const EXCLUDE_LIMIT: usize = 50;
const SUGGESTION_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Clone)]
pub struct GeminiProvider {
    http_client: HttpClient,
    api_url: String,
    models: Vec<String>,
    cache: Cache,
}

impl GeminiProvider {
    pub fn new(http_client: HttpClient, api_url: String, models: Vec<String>) -> Self {
        Self {
            http_client,
            api_url,
            models,
            cache: Cache::new("suggestions", SUGGESTION_CACHE_CAPACITY),
        }
    }

    /// Calls one model and returns its raw text answer
    async fn generate(&self, model: &str, api_key: &str, prompt: &str) -> AppResult<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_url, model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "responseMimeType": "application/json" }
        });

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || body.to_lowercase().contains("quota") {
                return Err(AppError::QuotaExceeded(format!(
                    "model {} returned status {}",
                    model, status
                )));
            }
            return Err(AppError::ExternalApi(format!(
                "Gemini API returned status {}: {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .text()
            .ok_or_else(|| AppError::ExternalApi(format!("model {} returned no text", model)))
    }

    /// Tries each configured model in order until one answers
    async fn generate_with_fallback(
        &self,
        api_key: &str,
        prompt: &str,
        media_type: MediaType,
    ) -> AppResult<Vec<Suggestion>> {
        let mut last_error = None;

        for model in &self.models {
            tracing::info!(model = %model, media_type = %media_type, "Calling Gemini");

            let outcome = match self.generate(model, api_key, prompt).await {
                Ok(text) => parse_suggestions(&text),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(suggestions) => {
                    tracing::info!(
                        model = %model,
                        suggestions = suggestions.len(),
                        provider = "gemini",
                        "Suggestions generated"
                    );
                    return Ok(suggestions);
                }
                Err(e) if e.is_quota() => {
                    tracing::warn!(model = %model, error = %e, "Model over quota, trying next");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!("Every Gemini model is over quota");
        Err(last_error
            .unwrap_or_else(|| AppError::Internal("No Gemini models configured".to_string())))
    }
}

/// Builds the instruction sent to the model
pub fn build_prompt(request: &SuggestionRequest) -> String {
    let (noun, similarity) = match request.media_type {
        MediaType::Movie => (
            "movies",
            "Consider movies with similar themes, genres, lead actors, or directors.",
        ),
        MediaType::Series => (
            "TV series",
            "Consider shows with similar themes, genres, or actors.",
        ),
    };
    let example = match request.media_type {
        MediaType::Movie => {
            r#"[{"title": "Inception", "year": 2010}, {"title": "The Matrix", "year": 1999}]"#
        }
        MediaType::Series => concat!(
            r#"[{"title": "Breaking Bad", "year": 2008}, "#,
            r#"{"title": "Stranger Things", "year": 2016}]"#
        ),
    };

    let genre_instruction = match &request.genre {
        Some(genre) => format!(
            "ALL recommendations MUST strictly belong to the {} genre.",
            genre
        ),
        None => similarity.to_string(),
    };

    let exclude = if request.exclude.is_empty() {
        String::new()
    } else {
        let titles: Vec<&str> = request
            .exclude
            .iter()
            .take(EXCLUDE_LIMIT)
            .map(String::as_str)
            .collect();
        format!(
            "\nDo NOT include any of these titles, I have already watched them:\n- {}",
            titles.join("\n- ")
        )
    };

    format!(
        "Based on the following {noun} I recently watched:\n\
         {history}\n\
         Recommend {count} popular, widely-known {noun} I might like. {genre}\n\
         Only recommend well-known titles that are easy to find in databases like IMDb or TMDB.\n\
         Do not include the {noun} I already watched.{exclude}\n\
         Output ONLY a JSON array of objects, with no markdown and no explanations. \
         Each object must have exactly two properties:\n\
         - \"title\": the English title (string)\n\
         - \"year\": the release year (number)\n\
         Example: {example}",
        noun = noun,
        history = request.history_text(),
        count = SUGGESTION_COUNT,
        genre = genre_instruction,
        exclude = exclude,
        example = example,
    )
}

/// Removes a surrounding markdown code fence (```json ... ```)
pub fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = trimmed.trim_end().strip_suffix("```") {
        trimmed = rest;
    }

    trimmed.trim()
}

/// One array entry as the model wrote it
#[derive(Debug, Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "crate::models::lenient_year")]
    year: Option<i32>,
}

/// Parses the model's JSON array
///
/// Entries that are not objects or carry no usable title are dropped; the
/// rest of the array is kept.
pub fn parse_suggestions(text: &str) -> AppResult<Vec<Suggestion>> {
    let entries: Vec<Value> = serde_json::from_str(strip_code_fences(text))?;
    let total = entries.len();

    let suggestions: Vec<Suggestion> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawSuggestion>(entry).ok())
        .filter_map(|raw| {
            let title = raw.title?.trim().to_string();
            (!title.is_empty()).then_some(Suggestion {
                title,
                year: raw.year,
            })
        })
        .collect();

    if suggestions.len() < total {
        tracing::warn!(
            kept = suggestions.len(),
            dropped = total - suggestions.len(),
            "Dropped malformed suggestions"
        );
    }

    Ok(suggestions)
}

#[async_trait::async_trait]
impl SuggestionProvider for GeminiProvider {
    async fn suggest(
        &self,
        request: &SuggestionRequest,
        credentials: &UserConfig,
        force_refresh: bool,
    ) -> AppResult<Vec<Suggestion>> {
        let api_key = credentials
            .gemini_api_key()
            .ok_or(AppError::MissingCredentials("gemini_api_key"))?;

        if request.history.is_empty() {
            return Ok(Vec::new());
        }

        let key = CacheKey::Suggestions {
            media_type: request.media_type,
            genre: request.genre.clone(),
            seed: request.history_text(),
        };

        cached!(
            self.cache,
            key,
            SUGGESTION_CACHE_TTL,
            refresh = force_refresh,
            async move {
                let prompt = build_prompt(request);
                self.generate_with_fallback(api_key, &prompt, request.media_type)
                    .await
            }
        )
    }

    async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
