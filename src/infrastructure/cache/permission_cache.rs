//! Permission Cache
//!
//! Caches the outcome of "may this user manage this project" checks.
//! Redis is optional: without it every check goes to the database.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use super::keys;
use crate::shared::error::AppError;

/// Cached project manager permission lookups.
#[async_trait]
pub trait ManagerPermissionCache: Send + Sync {
    async fn get(&self, user_id: i64, project_id: i64) -> Result<Option<bool>, AppError>;

    async fn put(&self, user_id: i64, project_id: i64, permitted: bool) -> Result<(), AppError>;
}

/// Redis-backed cache. Values are stored as "1"/"0" with a TTL.
#[derive(Clone)]
pub struct RedisPermissionCache {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPermissionCache {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }
}

#[async_trait]
impl ManagerPermissionCache for RedisPermissionCache {
    async fn get(&self, user_id: i64, project_id: i64) -> Result<Option<bool>, AppError> {
        let key = keys::project_permission(user_id, project_id);
        let mut conn = self.redis.clone();
        let value: Option<String> = conn.get(&key).await?;
        Ok(value.map(|v| v == "1"))
    }

    async fn put(&self, user_id: i64, project_id: i64, permitted: bool) -> Result<(), AppError> {
        let key = keys::project_permission(user_id, project_id);
        let value = if permitted { "1" } else { "0" };
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, value, self.ttl_secs).await?;
        Ok(())
    }
}

/// Used when no Redis URL is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPermissionCache;

#[async_trait]
impl ManagerPermissionCache for NoPermissionCache {
    async fn get(&self, _user_id: i64, _project_id: i64) -> Result<Option<bool>, AppError> {
        Ok(None)
    }

    async fn put(&self, _user_id: i64, _project_id: i64, _permitted: bool) -> Result<(), AppError> {
        Ok(())
    }
}

/// Cache failures must never fail a request; log and fall through to the store.
pub async fn cached_or_else<C, F, Fut>(
    cache: &C,
    user_id: i64,
    project_id: i64,
    compute: F,
) -> Result<bool, AppError>
where
    C: ManagerPermissionCache + ?Sized,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<bool, AppError>>,
{
    match cache.get(user_id, project_id).await {
        Ok(Some(permitted)) => return Ok(permitted),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "permission cache read failed"),
    }

    let permitted = compute().await?;
    if let Err(e) = cache.put(user_id, project_id, permitted).await {
        warn!(error = %e, "permission cache write failed");
    }
    Ok(permitted)
}
