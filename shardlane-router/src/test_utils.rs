//! In-memory store implementations for exercising the router without a
//! real backing store. Not suitable for anything beyond testing.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{
    Criteria,
    DeleteOutcome,
    Entity,
    Patch,
    Query,
    UpdateOutcome,
    Value,
};
use crate::store::{StoreClient, StoreConnection};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct MemStoreError(#[from] pub anyhow::Error);

/// A single-table in-memory store.
///
/// One instance models one shard's backing store for entity type `E`.
/// Soft-removed rows are dropped from the live map and remembered in a
/// tombstone set so tests can observe them.
#[derive(Debug)]
pub struct MemStore<E: Entity> {
    rows: RwLock<HashMap<E::Id, E>>,
    tombstones: RwLock<HashSet<E::Id>>,
    open: AtomicBool,
}

impl<E: Entity> Default for MemStore<E> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashSet::new()),
            open: AtomicBool::new(true),
        }
    }
}

impl<E: Entity> MemStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_tombstoned(&self, id: &E::Id) -> bool {
        self.tombstones.read().contains(id)
    }

    fn ensure_open(&self) -> Result<(), MemStoreError> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(MemStoreError(anyhow!("store is closed")))
        }
    }

    /// Applies selector, deterministic base ordering, explicit ordering and
    /// offset/limit shaping, mimicking what a real store would do per query.
    fn shape(&self, query: &Query) -> Vec<E> {
        let rows = self.rows.read();
        let mut matched: Vec<E> = rows
            .values()
            .filter(|entity| {
                query
                    .selector
                    .as_ref()
                    .map_or(true, |selector| selector.matches(*entity))
            })
            .cloned()
            .collect();

        // HashMap iteration order is arbitrary; pin it down by id first so
        // per-store results are reproducible.
        matched.sort_by(|a, b| compare_ids::<E>(&a.id(), &b.id()));

        if let Some(order) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = match (a.field(&order.column), b.field(&order.column)) {
                    (Some(left), Some(right)) => {
                        left.compare(&right).unwrap_or(CmpOrdering::Equal)
                    },
                    _ => CmpOrdering::Equal,
                };
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }

    fn count_matching(&self, query: &Query) -> u64 {
        self.rows
            .read()
            .values()
            .filter(|entity| {
                query
                    .selector
                    .as_ref()
                    .map_or(true, |selector| selector.matches(*entity))
            })
            .count() as u64
    }
}

fn compare_ids<E: Entity>(a: &E::Id, b: &E::Id) -> CmpOrdering {
    let left: Value = a.clone().into();
    let right: Value = b.clone().into();
    left.compare(&right).unwrap_or(CmpOrdering::Equal)
}

#[async_trait]
impl<E: Entity> StoreConnection for MemStore<E> {
    type Error = MemStoreError;

    async fn close(&self) -> Result<(), Self::Error> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<E: Entity> StoreClient<E> for MemStore<E> {
    async fn save(&self, entity: E) -> Result<E, Self::Error> {
        self.ensure_open()?;
        self.tombstones.write().remove(&entity.id());
        self.rows.write().insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn remove(&self, entity: E) -> Result<E, Self::Error> {
        self.ensure_open()?;
        self.rows.write().remove(&entity.id());
        Ok(entity)
    }

    async fn soft_remove(&self, entity: E) -> Result<E, Self::Error> {
        self.ensure_open()?;
        self.rows.write().remove(&entity.id());
        self.tombstones.write().insert(entity.id());
        Ok(entity)
    }

    async fn update(
        &self,
        criteria: &Criteria<E>,
        patch: &Patch,
    ) -> Result<UpdateOutcome, Self::Error> {
        self.ensure_open()?;

        let mut affected = 0;
        for entity in self.rows.write().values_mut() {
            if criteria.selects(entity) {
                entity.apply(patch);
                affected += 1;
            }
        }

        Ok(UpdateOutcome {
            affected: Some(affected),
            ..Default::default()
        })
    }

    async fn delete(&self, criteria: &Criteria<E>) -> Result<DeleteOutcome, Self::Error> {
        self.ensure_open()?;

        let mut rows = self.rows.write();
        let doomed: Vec<E::Id> = rows
            .values()
            .filter(|entity| criteria.selects(entity))
            .map(|entity| entity.id())
            .collect();
        for id in &doomed {
            rows.remove(id);
        }

        Ok(DeleteOutcome {
            affected: Some(doomed.len() as u64),
            ..Default::default()
        })
    }

    async fn count(&self, query: &Query) -> Result<u64, Self::Error> {
        self.ensure_open()?;
        Ok(self.count_matching(query))
    }

    async fn find(&self, query: &Query) -> Result<Vec<E>, Self::Error> {
        self.ensure_open()?;
        Ok(self.shape(query))
    }

    async fn find_and_count(&self, query: &Query) -> Result<(Vec<E>, u64), Self::Error> {
        self.ensure_open()?;
        Ok((self.shape(query), self.count_matching(query)))
    }

    async fn find_one(&self, query: &Query) -> Result<Option<E>, Self::Error> {
        self.ensure_open()?;
        Ok(self.shape(query).into_iter().next())
    }

    async fn find_one_by_id(&self, id: &E::Id) -> Result<Option<E>, Self::Error> {
        self.ensure_open()?;
        Ok(self.rows.read().get(id).cloned())
    }

    async fn find_by_ids(&self, ids: &[E::Id]) -> Result<Vec<E>, Self::Error> {
        self.ensure_open()?;

        let rows = self.rows.read();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }
}
