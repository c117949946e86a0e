use std::error::Error;

use async_trait::async_trait;

use crate::model::{Criteria, DeleteOutcome, Entity, Patch, Query, UpdateOutcome};

/// The connection-lifecycle half of a store handle.
///
/// One implementor instance wraps exactly one physical backing-store
/// connection; a [ShardRegistry](crate::ShardRegistry) owns one per shard
/// and closes them all on teardown.
#[async_trait]
pub trait StoreConnection: Send + Sync + 'static {
    type Error: Error + Send + Sync + 'static;

    /// Releases the underlying connection. Must be idempotent.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Reports whether the connection is still live.
    fn is_initialized(&self) -> bool;
}

/// The per-entity, single-store CRUD engine the router fans out over.
///
/// This is the external collaborator boundary: implementations execute each
/// operation against one connection and know nothing about sharding. All
/// routing and cross-store merging happens above this trait.
#[async_trait]
pub trait StoreClient<E: Entity>: StoreConnection {
    /// Inserts or replaces one row.
    async fn save(&self, entity: E) -> Result<E, Self::Error>;

    /// Hard-deletes one row by its id.
    async fn remove(&self, entity: E) -> Result<E, Self::Error>;

    /// Marks one row deleted without removing it; subsequent reads skip it.
    async fn soft_remove(&self, entity: E) -> Result<E, Self::Error>;

    async fn update(
        &self,
        criteria: &Criteria<E>,
        patch: &Patch,
    ) -> Result<UpdateOutcome, Self::Error>;

    async fn delete(&self, criteria: &Criteria<E>) -> Result<DeleteOutcome, Self::Error>;

    async fn count(&self, query: &Query) -> Result<u64, Self::Error>;

    async fn find(&self, query: &Query) -> Result<Vec<E>, Self::Error>;

    async fn find_and_count(&self, query: &Query) -> Result<(Vec<E>, u64), Self::Error>;

    async fn find_one(&self, query: &Query) -> Result<Option<E>, Self::Error>;

    async fn find_one_by_id(&self, id: &E::Id) -> Result<Option<E>, Self::Error>;

    /// Fetches every row whose id is in `ids`, in one batched call.
    async fn find_by_ids(&self, ids: &[E::Id]) -> Result<Vec<E>, Self::Error>;
}
