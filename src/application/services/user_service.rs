//! User Service
//!
//! User lookups and mapper level promotion.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::TaskSettings;
use crate::domain::{MapperLevel, TaskRepository, User, UserRepository};
use crate::shared::error::AppError;

/// User service trait
#[async_trait]
pub trait UserService: Send + Sync {
    async fn get_user_by_id(&self, user_id: i64) -> Result<User, UserError>;

    /// Get a user by username
    async fn get_user_by_username(&self, username: &str) -> Result<User, UserError>;

    /// Promote the user when their mapped task count reaches the next level.
    ///
    /// Levels are never lowered. Returns the user's level after the check.
    async fn check_and_update_mapper_level(&self, user_id: i64) -> Result<MapperLevel, UserError>;
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("UserNotFound-User not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => AppError::not_found(UserError::NotFound),
            UserError::Store(e) => e,
        }
    }
}

/// UserService implementation
pub struct UserServiceImpl<U, T>
where
    U: UserRepository,
    T: TaskRepository,
{
    user_repo: Arc<U>,
    task_repo: Arc<T>,
    settings: TaskSettings,
}

impl<U, T> UserServiceImpl<U, T>
where
    U: UserRepository,
    T: TaskRepository,
{
    pub fn new(user_repo: Arc<U>, task_repo: Arc<T>, settings: TaskSettings) -> Self {
        Self {
            user_repo,
            task_repo,
            settings,
        }
    }

    /// Level earned by a mapped task count.
    fn level_for(&self, mapped: i64) -> MapperLevel {
        if mapped >= self.settings.advanced_level_tasks {
            MapperLevel::Advanced
        } else if mapped >= self.settings.intermediate_level_tasks {
            MapperLevel::Intermediate
        } else {
            MapperLevel::Beginner
        }
    }
}

#[async_trait]
impl<U, T> UserService for UserServiceImpl<U, T>
where
    U: UserRepository + 'static,
    T: TaskRepository + 'static,
{
    async fn get_user_by_id(&self, user_id: i64) -> Result<User, UserError> {
        self.user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, UserError> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or(UserError::NotFound)
    }

    async fn check_and_update_mapper_level(&self, user_id: i64) -> Result<MapperLevel, UserError> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound)?;

        let mapped = self.task_repo.count_mapped_by(user_id).await?;
        let earned = self.level_for(mapped);
        if earned <= user.mapping_level {
            return Ok(user.mapping_level);
        }

        self.user_repo.update_mapping_level(user_id, earned).await?;
        info!(user_id, level = earned.as_str(), "Mapper level raised");
        Ok(earned)
    }
}
