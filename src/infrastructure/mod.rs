//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL, plus in-memory stores)
//! - Permission cache (Redis)
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
