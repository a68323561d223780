//! Shared utilities: identifiers and timestamps.

mod ids;
mod time;

pub use ids::{generate_run_id, generate_step_id};
pub use time::{iso_timestamp, now_utc, Timestamp};
