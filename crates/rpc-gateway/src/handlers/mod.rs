//! HTTP request handlers for the RPC gateway.

pub mod categories;
pub mod greet;
pub mod health;
pub mod metrics;

pub use categories::{
    create_category, list_categories, select_category_by_id, select_category_by_short_name,
};
pub use greet::greet;
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
