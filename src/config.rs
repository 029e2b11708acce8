use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables
///
/// User credentials are not part of this: they arrive with every catalog
/// request inside the install URL.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Trakt API base URL
    #[serde(default = "default_trakt_api_url")]
    pub trakt_api_url: String,

    /// TMDB API base URL
    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    /// TMDB image CDN base URL (size segment is appended per image)
    #[serde(default = "default_tmdb_image_url")]
    pub tmdb_image_url: String,

    /// Gemini API base URL
    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    /// Gemini models tried in order when a model is over quota
    #[serde(default = "default_gemini_models")]
    pub gemini_models: Vec<String>,

    /// Timeout applied to every outbound request
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// How far back the recent watch history reaches
    #[serde(default = "default_history_window_days")]
    pub history_window_days: i64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7005
}

fn default_trakt_api_url() -> String {
    "https://api.trakt.tv".to_string()
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_url() -> String {
    "https://image.tmdb.org/t/p".to_string()
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_models() -> Vec<String> {
    [
        "gemini-2.5-flash",
        "gemini-2.5-flash-lite",
        "gemini-2.0-flash-lite-001",
        "gemini-flash-lite-latest",
        "gemini-pro-latest",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_history_window_days() -> i64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            trakt_api_url: default_trakt_api_url(),
            tmdb_api_url: default_tmdb_api_url(),
            tmdb_image_url: default_tmdb_image_url(),
            gemini_api_url: default_gemini_api_url(),
            gemini_models: default_gemini_models(),
            http_timeout_secs: default_http_timeout_secs(),
            history_window_days: default_history_window_days(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Outbound request timeout
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Config pointing every upstream at a single base URL, used by tests
    /// that stand up a fake upstream server.
    pub fn with_upstream(base_url: &str) -> Self {
        Self {
            trakt_api_url: base_url.to_string(),
            tmdb_api_url: base_url.to_string(),
            tmdb_image_url: format!("{}/img", base_url),
            gemini_api_url: base_url.to_string(),
            http_timeout_secs: 5,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_environment() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 7005);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.gemini_models.len(), 5);
        assert_eq!(config.gemini_models[0], "gemini-2.5-flash");
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_models_parsed_from_comma_separated_list() {
        let vars = vec![
            ("GEMINI_MODELS".to_string(), "model-a,model-b".to_string()),
            ("PORT".to_string(), "8080".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.gemini_models, vec!["model-a", "model-b"]);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_with_upstream_rewrites_all_base_urls() {
        let config = Config::with_upstream("http://127.0.0.1:9999");
        assert_eq!(config.trakt_api_url, "http://127.0.0.1:9999");
        assert_eq!(config.tmdb_api_url, "http://127.0.0.1:9999");
        assert_eq!(config.gemini_api_url, "http://127.0.0.1:9999");
        assert_eq!(config.tmdb_image_url, "http://127.0.0.1:9999/img");
    }
}
