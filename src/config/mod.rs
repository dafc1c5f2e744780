//! Configuration
//!
//! Loaded once at startup from an optional JSON file; CLI flags and
//! `ROVER_*` environment variables override individual fields in `main`.

mod schema;
mod store;

pub use schema::*;
pub use store::{load_config, load_or_default};
