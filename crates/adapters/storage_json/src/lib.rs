//! # geohub-adapter-storage-json
//!
//! JSON file persistence for the geofence configuration.
//!
//! ## Responsibilities
//! - Implement [`ConfigStore`](geohub_app::ports::ConfigStore) on top of a single JSON document
//! - Write the whole document on every save, through a temporary file and a rename
//! - Offload writes to a background task so callers never wait on the disk
//!
//! ## Dependency rule
//! Depends on `geohub-app` (for the port trait) and `geohub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod json_store;
pub mod writer;

pub use json_store::JsonConfigStore;
pub use writer::ConfigWriter;
