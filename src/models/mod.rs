use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt::Display, str::FromStr};

pub mod catalog;
pub mod credentials;

pub use catalog::{CatalogExtra, CatalogResponse, Meta};
pub use credentials::UserConfig;

/// Kind of title a catalog serves
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    /// Catalog id the client uses to request this media type
    pub fn catalog_id(&self) -> &'static str {
        match self {
            MediaType::Movie => "gemini-movie-recommendations",
            MediaType::Series => "gemini-series-recommendations",
        }
    }

    /// Path segment used by the history service
    pub fn trakt_segment(&self) -> &'static str {
        match self {
            MediaType::Movie => "movies",
            MediaType::Series => "shows",
        }
    }

    /// Path segment used by the metadata service
    pub fn tmdb_segment(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "tv",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Series => write!(f, "series"),
        }
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "series" => Ok(MediaType::Series),
            other => Err(format!("unsupported media type: {}", other)),
        }
    }
}

/// A title from the user's watch history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchedItem {
    pub title: String,
    pub year: Option<i32>,
    pub trakt_id: Option<u64>,
    pub imdb_id: Option<String>,
}

impl WatchedItem {
    /// `Title (Year)`, or just the title when the year is unknown
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}

/// History split into a short seed list and a full deny list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WatchHistory {
    /// Most recently watched unique titles, newest first
    pub recent: Vec<WatchedItem>,
    /// Every known watched title, lowercased and trimmed
    pub all_watched: Vec<String>,
}

impl WatchHistory {
    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Whether a title already appears in the deny list
    pub fn has_watched(&self, title: &str) -> bool {
        let needle = normalize_title(title);
        self.all_watched.iter().any(|t| *t == needle)
    }
}

/// Lowercased, trimmed form used for deny-list comparisons
pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// A title proposed by the suggestion service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub title: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
}

/// Accepts `2010`, `"2010"`, `null` or a missing field
pub(crate) fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// What the suggestion service is asked for
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionRequest {
    pub media_type: MediaType,
    pub history: Vec<WatchedItem>,
    pub exclude: Vec<String>,
    pub genre: Option<String>,
}

impl SuggestionRequest {
    /// Seed text sent to the model and used in the cache key
    pub fn history_text(&self) -> String {
        self.history
            .iter()
            .map(WatchedItem::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
