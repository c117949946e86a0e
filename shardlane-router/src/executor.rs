use std::future::Future;

use futures::future::try_join_all;

use crate::error::ShardError;
use crate::model::{DeleteOutcome, UpdateOutcome};
use crate::registry::ShardDescriptor;
use crate::store::StoreConnection;

/// Invokes `op` on a single resolved shard, tagging any failure with the
/// originating shard key.
pub(crate) async fn on_shard<'a, S, F, Fut, T>(
    shard: &'a ShardDescriptor<S>,
    op: F,
) -> Result<T, ShardError<S::Error>>
where
    S: StoreConnection,
    F: FnOnce(&'a S) -> Fut,
    Fut: Future<Output = Result<T, S::Error>>,
{
    op(shard.store()).await.map_err(|source| ShardError::Store {
        shard: shard.key().to_string(),
        source,
    })
}

/// Invokes the same `op` against every target store concurrently and
/// collects the per-shard results in store-iteration order.
///
/// The join waits for all calls; the first failure aborts it and is
/// propagated, with side effects already applied on other shards left in
/// place since no cross-shard transaction exists.
pub(crate) async fn fan_out<'a, S, F, Fut, T>(
    targets: &[&'a ShardDescriptor<S>],
    op: F,
) -> Result<Vec<T>, ShardError<S::Error>>
where
    S: StoreConnection,
    F: Fn(&'a S) -> Fut,
    Fut: Future<Output = Result<T, S::Error>>,
{
    try_join_all(targets.iter().map(|&shard| {
        let call = op(shard.store());
        async move {
            call.await.map_err(|source| {
                error!(shard = %shard.key(), "store operation failed");
                ShardError::Store {
                    shard: shard.key().to_string(),
                    source,
                }
            })
        }
    }))
    .await
}

/// Runs one op per (shard, payload) pair concurrently, preserving the
/// input order of the batch in the collected results.
///
/// This is the per-entity path: a heterogeneous batch may span several
/// shards, so every element is routed on its own.
pub(crate) async fn fan_out_each<'a, S, F, Fut, I, T>(
    pairs: Vec<(&'a ShardDescriptor<S>, I)>,
    op: F,
) -> Result<Vec<T>, ShardError<S::Error>>
where
    S: StoreConnection,
    F: Fn(&'a S, I) -> Fut,
    Fut: Future<Output = Result<T, S::Error>>,
{
    try_join_all(pairs.into_iter().map(|(shard, payload)| {
        let call = op(shard.store(), payload);
        async move {
            call.await.map_err(|source| {
                error!(shard = %shard.key(), "store operation failed");
                ShardError::Store {
                    shard: shard.key().to_string(),
                    source,
                }
            })
        }
    }))
    .await
}

/// find / findBy: concatenation in store-iteration order, no
/// de-duplication.
pub(crate) fn concat<T>(parts: Vec<Vec<T>>) -> Vec<T> {
    let mut merged = Vec::with_capacity(parts.iter().map(Vec::len).sum());
    for part in parts {
        merged.extend(part);
    }
    merged
}

/// findOne family: the first non-empty result in store-iteration order;
/// later matches are discarded.
pub(crate) fn first_present<T>(parts: Vec<Option<T>>) -> Option<T> {
    parts.into_iter().flatten().next()
}

/// count / countBy: the sum of per-store counts.
pub(crate) fn sum_counts(parts: Vec<u64>) -> u64 {
    parts.into_iter().sum()
}

/// findAndCount: pairwise reduction, rows concatenated and counts summed.
pub(crate) fn merge_counted<T>(parts: Vec<(Vec<T>, u64)>) -> (Vec<T>, u64) {
    let mut rows = Vec::new();
    let mut total = 0;
    for (part, count) in parts {
        rows.extend(part);
        total += count;
    }
    (rows, total)
}

pub(crate) fn merge_updates(parts: Vec<UpdateOutcome>) -> UpdateOutcome {
    let mut merged = UpdateOutcome {
        affected: Some(0),
        ..Default::default()
    };
    for part in parts {
        merged.absorb(part);
    }
    merged
}

pub(crate) fn merge_deletes(parts: Vec<DeleteOutcome>) -> DeleteOutcome {
    let mut merged = DeleteOutcome {
        affected: Some(0),
        ..Default::default()
    };
    for part in parts {
        merged.absorb(part);
    }
    merged
}
