//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod health;
pub mod partner;
pub mod task_actions;
