use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Per-user API credentials carried in the install URL
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserConfig {
    #[serde(default)]
    pub trakt_username: Option<String>,
    #[serde(default)]
    pub trakt_client_id: Option<String>,
    #[serde(default)]
    pub tmdb_api_key: Option<String>,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
}

impl UserConfig {
    /// Decodes the JSON config segment of a catalog URL.
    ///
    /// The router has already percent-decoded the segment.
    pub fn from_path_segment(segment: &str) -> AppResult<Self> {
        serde_json::from_str(segment)
            .map_err(|e| AppError::InvalidInput(format!("Invalid config segment: {}", e)))
    }

    pub fn trakt_username(&self) -> Option<&str> {
        non_blank(&self.trakt_username)
    }

    pub fn trakt_client_id(&self) -> Option<&str> {
        non_blank(&self.trakt_client_id)
    }

    pub fn tmdb_api_key(&self) -> Option<&str> {
        non_blank(&self.tmdb_api_key)
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        non_blank(&self.gemini_api_key)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
