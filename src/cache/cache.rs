use std::{fmt, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    constants::CATALOG_CACHE_KEY,
    error::{ApiError, CacheError},
    schema::Id,
};

// Caching - keys

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheKey {
    TagList,
    Tag(Id),
    IngredientSearch(String),
    Ingredient(Id),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::TagList => write!(f, "tags"),
            CacheKey::Tag(id) => write!(f, "tag-{id}"),
            CacheKey::IngredientSearch(query) => {
                write!(f, "ingredients-{}", query.to_lowercase())
            }
            CacheKey::Ingredient(id) => write!(f, "ingredient-{id}"),
        }
    }
}

impl CacheKey {
    pub fn lifetime(&self) -> CacheLifetime {
        match self {
            CacheKey::TagList
            | CacheKey::Tag(_)
            | CacheKey::IngredientSearch(_)
            | CacheKey::Ingredient(_) => CacheLifetime::BindCatalogCache,
        }
    }
}

// Cache - wrappers

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CacheLifetime {
    /// Valid until the catalog bind token is rotated.
    BindCatalogCache,
}

impl CacheLifetime {
    async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, CacheError> {
        match self {
            CacheLifetime::BindCatalogCache => {
                match get_cache_value::<&str, String>(CATALOG_CACHE_KEY, cache).await? {
                    Some(bind) => Ok(Some(bind)),
                    None => {
                        let bind = Uuid::new_v4().to_string();
                        set_cache_value(CATALOG_CACHE_KEY, bind.as_str(), cache).await?;
                        Ok(Some(bind))
                    }
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug)]
pub struct RedisValue {
    pub value: serde_json::Value,
    _bind: Option<String>,
}

/// Read-through cache for the tag and ingredient catalog. Disabled when no redis URL is configured.
#[derive(Clone, Default)]
pub struct Cache {
    connection: Option<MultiplexedConnection>,
}

impl Cache {
    pub fn disabled() -> Self {
        Self { connection: None }
    }

    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            connection: Some(connection),
        })
    }

    /// Returns the cached value or runs `callback` and stores its result.
    /// Cache failures are logged and fall through to `callback`.
    pub async fn get_or<T, F, Fut>(&self, key: CacheKey, callback: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut cache = match &self.connection {
            Some(connection) => connection.clone(),
            None => return callback().await,
        };

        let lifetime = key.lifetime();
        let bind = match lifetime.get_cache_bind(&mut cache).await {
            Ok(bind) => bind,
            Err(e) => {
                log::warn!("> Cache unavailable, reading {key} from the database: {e}");
                return callback().await;
            }
        };

        if let Some(value) = self.lookup::<T>(&key, &bind, &mut cache).await {
            return Ok(value);
        }

        log::trace!("> Fetching {key}");
        let value = callback().await?;

        match serde_json::to_value(&value) {
            Ok(json) => {
                let stored = RedisValue {
                    value: json,
                    _bind: bind,
                };
                if let Err(e) = set_cache_value(key.to_string(), stored, &mut cache).await {
                    log::warn!("> Failed to cache {key}: {e}");
                }
            }
            Err(e) => log::error!("> Failed to serialize {key}: {e}"),
        }

        Ok(value)
    }

    async fn lookup<T: DeserializeOwned>(
        &self,
        key: &CacheKey,
        bind: &Option<String>,
        cache: &mut MultiplexedConnection,
    ) -> Option<T> {
        let stored = match get_cache_value::<String, RedisValue>(key.to_string(), cache).await {
            Ok(stored) => stored?,
            Err(e) => {
                log::error!("> Failed to read cached value {key}, deleting it: {e}");
                if let Err(e) = delete_cache_value(key.to_string(), cache).await {
                    log::error!("> Failed to delete cached value! {e}");
                }
                return None;
            }
        };

        if &stored._bind != bind {
            log::trace!("> Invalidated {key}");
            return None;
        }

        match serde_json::from_value(stored.value) {
            Ok(value) => {
                log::trace!("> Found {key}");
                Some(value)
            }
            Err(e) => {
                log::error!("> Cached value {key} has an unexpected shape: {e}");
                None
            }
        }
    }

    /// Rotates the catalog bind token, invalidating every catalog entry at once.
    pub async fn invalidate_catalog(&self) -> Result<(), CacheError> {
        if let Some(connection) = &self.connection {
            let mut cache = connection.clone();
            let bind = Uuid::new_v4().to_string();
            set_cache_value(CATALOG_CACHE_KEY, bind.as_str(), &mut cache).await?;
            log::info!("Catalog cache invalidated");
        }
        Ok(())
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), CacheError> {
    let _: () = cache.set(key, value).await?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), CacheError> {
    let _: () = cache.del(key).await?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, CacheError> {
    let value: Option<V> = cache.get(key).await?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(CacheKey::TagList.to_string(), "tags");
        assert_eq!(CacheKey::Tag(3).to_string(), "tag-3");
        assert_eq!(
            CacheKey::IngredientSearch(String::from("Salt")).to_string(),
            "ingredients-salt"
        );
        assert_eq!(CacheKey::Ingredient(8).to_string(), "ingredient-8");
    }

    #[test]
    fn catalog_keys_bind_to_catalog_cache() {
        assert_eq!(
            CacheKey::Ingredient(1).lifetime(),
            CacheLifetime::BindCatalogCache
        );
    }

    #[tokio::test]
    async fn disabled_cache_runs_callback() {
        let cache = Cache::disabled();

        let value: Vec<i32> = cache
            .get_or(CacheKey::TagList, || async { Ok(vec![1, 2, 3]) })
            .await
            .unwrap();

        assert_eq!(value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn disabled_cache_propagates_errors() {
        let cache = Cache::disabled();
        let result: Result<Vec<i32>, ApiError> = cache
            .get_or(CacheKey::TagList, || async { Err(ApiError::not_found()) })
            .await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn invalidating_disabled_cache_is_a_no_op() {
        assert!(Cache::disabled().invalidate_catalog().await.is_ok());
    }
}
