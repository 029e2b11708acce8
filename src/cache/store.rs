use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{AppError, AppResult};
use crate::models::MediaType;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    History {
        media_type: MediaType,
        username: String,
    },
    Suggestions {
        media_type: MediaType,
        genre: Option<String>,
        seed: String,
    },
    Metadata {
        media_type: MediaType,
        title: String,
        year: Option<i32>,
    },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::History {
                media_type,
                username,
            } => write!(f, "history:{}:{}", media_type, username.to_lowercase()),
            CacheKey::Suggestions {
                media_type,
                genre,
                seed,
            } => write!(
                f,
                "suggest:{}:{}:{}",
                media_type,
                genre.as_deref().unwrap_or("all"),
                seed
            ),
            CacheKey::Metadata {
                media_type,
                title,
                year,
            } => match year {
                Some(year) => write!(f, "meta:{}:{}:{}", media_type, title.to_lowercase(), year),
                None => write!(f, "meta:{}:{}:-", media_type, title.to_lowercase()),
            },
        }
    }
}

struct Entry {
    value: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_fresh(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

#[derive(Default)]
struct Store {
    entries: HashMap<String, Entry>,
    /// Keys in insertion order, oldest first
    order: VecDeque<String>,
}

/// Bounded in-memory cache with per-entry TTL and oldest-first eviction
///
/// Values are kept as JSON so a single cache type can back every pipeline
/// stage. Cloning shares the underlying store.
#[derive(Clone)]
pub struct Cache {
    name: &'static str,
    capacity: usize,
    store: Arc<RwLock<Store>>,
}

impl Cache {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity: capacity.max(1),
            store: Arc::new(RwLock::new(Store::default())),
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Expired entries read as a miss; they stay in the store until evicted
    /// or overwritten.
    pub async fn get_from_cache<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let store = self.store.read().await;

        match store.entries.get(&key.to_string()) {
            Some(entry) if entry.is_fresh() => {
                let data = serde_json::from_str(&entry.value).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })?;
                tracing::debug!(cache = self.name, key = %key, "Cache hit");
                Ok(Some(data))
            }
            _ => {
                tracing::debug!(cache = self.name, key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Stores a value, evicting the oldest entry when the cache is full
    ///
    /// Overwriting an existing key refreshes its value and timestamp but keeps
    /// its place in the eviction order.
    pub async fn insert<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(cache = self.name, error = %e, "Cache serialization error");
                return;
            }
        };

        let key = key.to_string();
        let entry = Entry {
            value: json,
            inserted_at: Instant::now(),
            ttl,
        };

        let mut store = self.store.write().await;

        if let Some(existing) = store.entries.get_mut(&key) {
            *existing = entry;
            return;
        }

        while store.entries.len() >= self.capacity {
            let Some(oldest) = store.order.pop_front() else {
                break;
            };
            store.entries.remove(&oldest);
            tracing::debug!(cache = self.name, key = %oldest, "Evicted oldest cache entry");
        }

        store.order.push_back(key.clone());
        store.entries.insert(key, entry);
    }

    /// Drops every entry
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let dropped = store.entries.len();
        store.entries.clear();
        store.order.clear();
        tracing::info!(cache = self.name, dropped, "Cache cleared");
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
