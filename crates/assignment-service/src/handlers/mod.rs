//! HTTP request handlers for the assignment service.

pub mod assignments;
pub mod health;
pub mod metrics;
pub mod token;

pub use assignments::{
    create_assignment, delete_assignment, get_assignment, list_assignments,
    list_assignments_for_owner, list_my_assignments,
};
pub use health::{health_check, root};
pub use metrics::metrics_handler;
pub use token::{admin_token, user_token};
