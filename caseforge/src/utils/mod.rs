//! Shared utilities.

pub mod canonical;
pub mod timestamps;

pub use canonical::{canonical_json, fingerprint, value_at_path};
pub use timestamps::{iso_timestamp, now_utc, Timestamp};
