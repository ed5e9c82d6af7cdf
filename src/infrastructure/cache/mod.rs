//! Cache Module
//!
//! Redis connection management and the project permission cache.
//!
//! ```text
//! +----------------------------+
//! |  ProjectAdminService       |
//! +----------------------------+
//!          |
//!          v
//! +----------------------------+
//! | ManagerPermissionCache     |  <-- Abstract interface
//! +----------------------------+
//!          |                \
//!          v                 v
//! +-------------------+   +-------------------+
//! | RedisPermission   |   | NoPermissionCache |
//! | Cache             |   | (redis.url unset) |
//! +-------------------+   +-------------------+
//! ```

mod permission_cache;

pub use permission_cache::{
    cached_or_else, ManagerPermissionCache, NoPermissionCache, RedisPermissionCache,
};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

/// Creates a Redis connection manager with automatic reconnection.
///
/// # Errors
/// Returns `redis::RedisError` if the URL is invalid or the server is unreachable.
#[instrument(skip(url))]
pub async fn create_redis_client(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key builders.
pub mod keys {
    /// Prefix for permission cache (e.g., "perms:user_id:resource")
    pub const PERMISSIONS: &str = "perms:";

    /// Key for a user's manager permission on a project
    #[inline]
    pub fn project_permission(user_id: i64, project_id: i64) -> String {
        format!("{}{}:project:{}", PERMISSIONS, user_id, project_id)
    }

    #[cfg(test)]
    mod tests {
        #[test]
        fn test_project_permission_key() {
            assert_eq!(super::project_permission(7, 42), "perms:7:project:42");
        }
    }
}
