//! Snapshot persistence for the roadmap engine.
//!
//! This crate provides a trait-based snapshot store with a JSON file
//! implementation, so the last published snapshot survives restarts.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;

pub use trait_::{SnapshotStore, SnapshotMeta, StorageError, Result};
pub use json_storage::JsonSnapshotStore;
