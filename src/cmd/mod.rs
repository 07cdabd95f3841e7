//! Command-line entry points.

pub mod extract;
pub mod health;
pub mod schema;
