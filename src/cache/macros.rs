/// A macro to simplify caching logic around an in-memory [`Cache`](crate::cache::Cache).
///
/// Checks the cache first. On a miss it awaits the block, stores the result
/// under the key and returns it. Errors from the block propagate and are
/// never cached.
///
/// The `refresh = <bool>` form skips the lookup when the flag is set but
/// still stores the freshly computed value.
///
/// # Arguments
/// * `$cache`: The cache instance; must have `get_from_cache` and `insert`.
/// * `$key`: The [`CacheKey`](crate::cache::CacheKey) for the value.
/// * `$ttl`: Time-to-live for the stored value, as a `Duration`.
/// * `$block`: The future to await when the value is not cached.
///
/// # Example
/// ```rust,ignore
/// let titles = cached!(self.cache, key, TTL, async move {
///     fetch_titles().await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, refresh = $refresh:expr, $block:expr) => {{
        let cached = if $refresh {
            None
        } else {
            $cache.get_from_cache(&$key).await?
        };
        if let Some(cached) = cached {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.insert(&$key, &value, $ttl).await;
            Ok(value)
        }
    }};
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.insert(&$key, &value, $ttl).await;
            Ok(value)
        }
    }};
}
