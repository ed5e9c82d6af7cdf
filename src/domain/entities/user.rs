//! User entity and repository trait.
//!
//! Maps to the `users` and `user_licenses` tables.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// User role matching the SMALLINT `role` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    ReadOnly,
    #[default]
    Mapper,
    Admin,
}

impl UserRole {
    pub fn from_i16(value: i16) -> Self {
        match value {
            -1 => Self::ReadOnly,
            1 => Self::Admin,
            _ => Self::Mapper,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::ReadOnly => -1,
            Self::Mapper => 0,
            Self::Admin => 1,
        }
    }
}

/// Mapper experience level; ordered from least to most experienced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapperLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl MapperLevel {
    pub fn from_i16(value: i16) -> Self {
        match value {
            2 => Self::Intermediate,
            3 => Self::Advanced,
            _ => Self::Beginner,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Beginner => 1,
            Self::Intermediate => 2,
            Self::Advanced => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "BEGINNER",
            Self::Intermediate => "INTERMEDIATE",
            Self::Advanced => "ADVANCED",
        }
    }
}

/// A registered mapper.
///
/// `username` is the OSM display name and acts as the user's public identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: UserRole,
    pub mapping_level: MapperLevel,
    /// Licenses the user has accepted
    pub accepted_licenses: Vec<i64>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn has_accepted_license(&self, license_id: i64) -> bool {
        self.accepted_licenses.contains(&license_id)
    }
}

/// Repository trait for User data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find a user by username (case-insensitive).
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Persist a new mapper level.
    async fn update_mapping_level(&self, id: i64, level: MapperLevel) -> Result<(), AppError>;
}
