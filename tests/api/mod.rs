//! REST API endpoint tests

mod health_tests;
mod partner_tests;
mod task_actions_tests;
