//! # Shardlane
//! A routing layer that spreads one logical table across multiple physical
//! backing stores and presents a single, store-agnostic CRUD interface.
//!
//! This is a convenience package which includes all of the sub-projects
//! within Shardlane:
//!
//! ### Features
//! - `shardlane-router` - The core: shard registry, RANGE/LIST resolution,
//!   fan-out execution and the per-entity gateway.
//! - `shardlane-sqlite` - An implementation of the
//!   `shardlane_router::StoreClient` trait using SQLite, one database per
//!   shard.

#[cfg(feature = "shardlane-router")]
pub use shardlane_router as router;
#[cfg(feature = "shardlane-sqlite")]
pub use shardlane_sqlite as sqlite;
