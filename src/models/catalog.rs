use serde::{Deserialize, Serialize};

use super::MediaType;

/// One catalog entry as the media client renders it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// IMDb id, e.g. `tt1375666`
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_info: Option<String>,
}

/// Optional catalog arguments (`skip`, `genre`)
///
/// `skip` stays `None` unless the request names it, so an explicit
/// `skip=0` in the path still overrides the query string.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CatalogExtra {
    #[serde(default)]
    pub skip: Option<u32>,
    #[serde(default)]
    pub genre: Option<String>,
}

impl CatalogExtra {
    /// Parses the `skip=20&genre=Action` path form.
    ///
    /// Unknown keys and an unparsable skip are ignored.
    pub fn from_path_segment(segment: &str) -> Self {
        let mut extra = Self::default();
        let segment = segment.strip_suffix(".json").unwrap_or(segment);

        for pair in segment.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key {
                "skip" => extra.skip = value.parse().ok(),
                "genre" if !value.is_empty() => extra.genre = Some(value.to_string()),
                _ => {}
            }
        }

        extra
    }

    /// Path extras win over query-string extras
    pub fn merged_over(self, fallback: CatalogExtra) -> Self {
        Self {
            skip: self.skip.or(fallback.skip),
            genre: self.genre.or(fallback.genre),
        }
    }

    /// Number of items the client has already shown
    pub fn skip(&self) -> u32 {
        self.skip.unwrap_or(0)
    }
}

/// Catalog response body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub metas: Vec<Meta>,
    /// Seconds the client may cache the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_max_age: Option<u64>,
    /// Seconds a stale response may be served while revalidating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_revalidate: Option<u64>,
}

impl CatalogResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `Cache-Control` header value matching the cache hints, if any
    pub fn cache_control(&self) -> Option<String> {
        let max_age = self.cache_max_age?;
        let mut value = format!("max-age={}", max_age);
        if let Some(stale) = self.stale_revalidate {
            value.push_str(&format!(", stale-while-revalidate={}", stale));
        }
        value.push_str(", public");
        Some(value)
    }
}
