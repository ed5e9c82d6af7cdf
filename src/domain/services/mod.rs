//! # Domain Services
//!
//! Domain services encapsulate business rules that don't naturally belong
//! to a single entity.
//!
//! - **TaskStateRules**: status a task returns to, derived from its history

mod task_rules;

pub use task_rules::*;
