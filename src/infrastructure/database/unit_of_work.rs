//! Unit of Work Pattern Implementation
//!
//! Provides transactional boundaries for database operations.
//! Ensures all writes of a task action succeed or fail together.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::shared::error::AppError;

/// Transaction context that wraps a SQLx transaction.
pub struct TransactionContext {
    tx: Transaction<'static, Postgres>,
}

impl TransactionContext {
    /// Begin a new transaction on the pool.
    pub async fn begin(pool: &PgPool) -> Result<Self, AppError> {
        let tx = pool.begin().await.map_err(AppError::Database)?;
        Ok(Self { tx })
    }

    /// Connection to run queries on inside the transaction.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Commit the transaction.
    pub async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(AppError::Database)
    }

    /// Rollback the transaction. Dropping an uncommitted context does the same.
    pub async fn rollback(self) -> Result<(), AppError> {
        self.tx.rollback().await.map_err(AppError::Database)
    }
}
