use std::sync::Arc;

use crate::error::ShardError;
use crate::executor;
use crate::model::{Criteria, DeleteOutcome, Entity, Patch, Query, Selector, UpdateOutcome};
use crate::registry::ShardRegistry;
use crate::resolver::ShardResolver;
use crate::store::StoreClient;
use crate::strategy::{ShardingStrategy, StrategyRegistry};

/// The per-entity-type facade callers interact with.
///
/// Every operation is a one-shot resolve -> execute -> reduce pipeline:
/// the resolver picks the target shard(s), the executor runs the store
/// calls concurrently, and the operation's reducer merges the per-store
/// results into one logically correct answer. The gateway itself carries
/// no state between calls and is safe to clone and share across tasks.
///
/// Read, update and delete operations accept an optional sharding key which
/// narrows a LIST-sharded entity's target set to a single shard. Plain
/// (un-sharded) entities ignore the key; RANGE-sharded entities reject it.
pub struct EntityGateway<E, S>
where
    E: Entity,
    S: StoreClient<E>,
{
    resolver: ShardResolver<E, S>,
}

impl<E, S> Clone for EntityGateway<E, S>
where
    E: Entity,
    S: StoreClient<E>,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<E, S> EntityGateway<E, S>
where
    E: Entity,
    S: StoreClient<E>,
{
    /// Creates a gateway for `E`, looking its sharding strategy up in the
    /// startup-time bindings. Entities with no binding are plain and live
    /// on the registry's default store.
    pub fn new(registry: Arc<ShardRegistry<S>>, strategies: &StrategyRegistry) -> Self {
        Self {
            resolver: ShardResolver::new(registry, strategies.get::<E>()),
        }
    }

    /// Creates a gateway with an explicitly supplied strategy.
    pub fn with_strategy(registry: Arc<ShardRegistry<S>>, strategy: ShardingStrategy<E>) -> Self {
        Self {
            resolver: ShardResolver::new(registry, Some(strategy)),
        }
    }

    /// Creates a gateway for a plain (un-sharded) entity type.
    pub fn plain(registry: Arc<ShardRegistry<S>>) -> Self {
        Self {
            resolver: ShardResolver::new(registry, None),
        }
    }

    /// Local construction only: validates that the entity has a resolvable
    /// placement and hands it back without touching any store.
    pub fn create(&self, entity: E) -> Result<E, ShardError<S::Error>> {
        self.resolver.placement(&entity)?;
        Ok(entity)
    }

    /// Persists one entity to exactly its resolved shard.
    pub async fn save_one(&self, entity: E) -> Result<E, ShardError<S::Error>> {
        let shard = self.resolver.placement(&entity)?;
        debug!(entity = E::table(), shard = %shard.key(), "save");
        executor::on_shard(shard, |store| store.save(entity)).await
    }

    /// Persists a batch, routing every entity individually; a heterogeneous
    /// batch may span several shards. Results come back in input order.
    pub async fn save_many(&self, entities: Vec<E>) -> Result<Vec<E>, ShardError<S::Error>> {
        let pairs = self.route_batch(entities)?;
        executor::fan_out_each(pairs, |store, entity| store.save(entity)).await
    }

    /// Hard-deletes one entity from its resolved shard.
    pub async fn remove_one(&self, entity: E) -> Result<E, ShardError<S::Error>> {
        let shard = self.resolver.placement(&entity)?;
        debug!(entity = E::table(), shard = %shard.key(), "remove");
        executor::on_shard(shard, |store| store.remove(entity)).await
    }

    pub async fn remove_many(&self, entities: Vec<E>) -> Result<Vec<E>, ShardError<S::Error>> {
        let pairs = self.route_batch(entities)?;
        executor::fan_out_each(pairs, |store, entity| store.remove(entity)).await
    }

    /// Marks one entity deleted on its resolved shard without removing it.
    pub async fn soft_remove_one(&self, entity: E) -> Result<E, ShardError<S::Error>> {
        let shard = self.resolver.placement(&entity)?;
        executor::on_shard(shard, |store| store.soft_remove(entity)).await
    }

    pub async fn soft_remove_many(&self, entities: Vec<E>) -> Result<Vec<E>, ShardError<S::Error>> {
        let pairs = self.route_batch(entities)?;
        executor::fan_out_each(pairs, |store, entity| store.soft_remove(entity)).await
    }

    /// Applies a patch to every row matching `criteria` on the targeted
    /// shards; the merged outcome sums the per-shard affected counts.
    pub async fn update(
        &self,
        criteria: &Criteria<E>,
        patch: &Patch,
        key: Option<&str>,
    ) -> Result<UpdateOutcome, ShardError<S::Error>> {
        let targets = self.resolver.scope(key)?;
        let outcomes = executor::fan_out(&targets, |store| store.update(criteria, patch)).await?;
        Ok(executor::merge_updates(outcomes))
    }

    /// Deletes every row matching `criteria` on the targeted shards.
    pub async fn delete(
        &self,
        criteria: &Criteria<E>,
        key: Option<&str>,
    ) -> Result<DeleteOutcome, ShardError<S::Error>> {
        let targets = self.resolver.scope(key)?;
        let outcomes = executor::fan_out(&targets, |store| store.delete(criteria)).await?;
        Ok(executor::merge_deletes(outcomes))
    }

    pub async fn count(
        &self,
        query: &Query,
        key: Option<&str>,
    ) -> Result<u64, ShardError<S::Error>> {
        let targets = self.resolver.scope(key)?;
        let counts = executor::fan_out(&targets, |store| store.count(query)).await?;
        Ok(executor::sum_counts(counts))
    }

    pub async fn count_by(
        &self,
        selector: &Selector,
        key: Option<&str>,
    ) -> Result<u64, ShardError<S::Error>> {
        self.count(&Query::from(selector.clone()), key).await
    }

    /// Fetches matching rows from every targeted shard and concatenates
    /// them in store-iteration order.
    pub async fn find(
        &self,
        query: &Query,
        key: Option<&str>,
    ) -> Result<Vec<E>, ShardError<S::Error>> {
        let targets = self.resolver.scope(key)?;
        let rows = executor::fan_out(&targets, |store| store.find(query)).await?;
        Ok(executor::concat(rows))
    }

    pub async fn find_by(
        &self,
        selector: &Selector,
        key: Option<&str>,
    ) -> Result<Vec<E>, ShardError<S::Error>> {
        self.find(&Query::from(selector.clone()), key).await
    }

    pub async fn find_and_count(
        &self,
        query: &Query,
        key: Option<&str>,
    ) -> Result<(Vec<E>, u64), ShardError<S::Error>> {
        let targets = self.resolver.scope(key)?;
        let parts = executor::fan_out(&targets, |store| store.find_and_count(query)).await?;
        Ok(executor::merge_counted(parts))
    }

    pub async fn find_and_count_by(
        &self,
        selector: &Selector,
        key: Option<&str>,
    ) -> Result<(Vec<E>, u64), ShardError<S::Error>> {
        self.find_and_count(&Query::from(selector.clone()), key).await
    }

    /// Returns the first matching row in store-iteration order.
    ///
    /// Every targeted shard is still queried; the candidate set is not
    /// known in advance to contain only one match, so there is no
    /// short-circuit.
    pub async fn find_one(
        &self,
        query: &Query,
        key: Option<&str>,
    ) -> Result<Option<E>, ShardError<S::Error>> {
        let targets = self.resolver.scope(key)?;
        let candidates = executor::fan_out(&targets, |store| store.find_one(query)).await?;
        Ok(executor::first_present(candidates))
    }

    pub async fn find_one_by(
        &self,
        selector: &Selector,
        key: Option<&str>,
    ) -> Result<Option<E>, ShardError<S::Error>> {
        self.find_one(&Query::from(selector.clone()), key).await
    }

    /// Point lookup by primary key, routed deterministically to exactly
    /// one shard. LIST-sharded entities require the key argument.
    pub async fn find_one_by_id(
        &self,
        id: &E::Id,
        key: Option<&str>,
    ) -> Result<Option<E>, ShardError<S::Error>> {
        let shard = self.resolver.point_lookup(id, key)?;
        executor::on_shard(shard, |store| store.find_one_by_id(id)).await
    }

    /// Batched id lookup: ids are grouped by destination shard and each
    /// group is fetched in one call.
    ///
    /// Results are concatenated in the order the destination groups were
    /// discovered, not necessarily input order.
    pub async fn find_by_ids(
        &self,
        ids: &[E::Id],
        key: Option<&str>,
    ) -> Result<Vec<E>, ShardError<S::Error>> {
        let groups = self.resolver.batch_lookup(ids, key)?;
        let rows =
            executor::fan_out_each(groups, |store, ids: Vec<E::Id>| async move {
                store.find_by_ids(&ids).await
            })
            .await?;
        Ok(executor::concat(rows))
    }

    fn route_batch(
        &self,
        entities: Vec<E>,
    ) -> Result<Vec<(&crate::registry::ShardDescriptor<S>, E)>, ShardError<S::Error>> {
        entities
            .into_iter()
            .map(|entity| Ok((self.resolver.placement(&entity)?, entity)))
            .collect()
    }
}
