//! # Shardlane Router
//! Shard resolution and fan-out execution for spreading one logical table
//! across multiple physical backing stores, behind a single store-agnostic
//! CRUD interface.
//!
//! The moving parts, bottom up:
//!
//! - A [StoreClient] implementation wraps one physical store connection and
//!   executes conventional single-store CRUD. The router never talks to a
//!   store any other way.
//! - A [ShardRegistry] holds the ordered set of shard stores, which one is
//!   the default, and a lookup by shard key. Topology is fixed at startup;
//!   destroying the registry closes every store.
//! - A [ShardingStrategy] binds an entity type to its routing rule: `RANGE`
//!   derives the shard from the primary key, `LIST` matches an explicit,
//!   caller-supplied sharding key against the configured shards. Bindings
//!   live in a write-once [StrategyRegistry] keyed by entity type.
//! - The [EntityGateway] is the public face: each call resolves its target
//!   shard(s), fans the operation out concurrently, and reduces the
//!   per-store results with the operation's merge rule (concatenation for
//!   `find`, summation for `count`, first-match for `find_one`, and so on).
//!
//! Writes across independent stores are not atomic: if one shard of a
//! fan-out fails, the operation fails, and effects already applied on other
//! shards stay in place. Cross-shard transactions are explicitly out of
//! scope.
//!
//! Store implementations live in their own crates; `shardlane-sqlite`
//! provides a ready-made SQLite-backed [StoreClient].

#[macro_use]
extern crate tracing;

mod error;
mod executor;
mod gateway;
mod model;
mod registry;
mod resolver;
mod store;
mod strategy;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::ShardError;
pub use gateway::EntityGateway;
pub use model::{
    Criteria,
    DeleteOutcome,
    Entity,
    OrderBy,
    Patch,
    Query,
    Selector,
    UpdateOutcome,
    Value,
};
pub use registry::{InitHook, ShardDescriptor, ShardEntry, ShardRegistry};
pub use store::{StoreClient, StoreConnection};
pub use strategy::{ShardingStrategy, StrategyRegistry};
