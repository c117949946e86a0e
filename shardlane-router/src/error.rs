use std::error::Error;

use thiserror::Error;

/// The router error taxonomy, generic over the store collaborator's
/// own error type.
///
/// None of these are recovered internally; every case is surfaced to the
/// caller with the context needed to tell misconfiguration apart from data
/// issues.
#[derive(Debug, Error)]
pub enum ShardError<E>
where
    E: Error + Send + Sync + 'static,
{
    /// An explicit sharding key does not match any configured shard.
    #[error("unknown shard key {key:?}")]
    UnknownShardKey { key: String },

    /// A LIST-sharded entity's id-based lookup was attempted with no key.
    #[error("entity {entity:?} is LIST sharded and requires an explicit sharding key for id lookups")]
    MissingShardingKey { entity: &'static str },

    /// The operation has no defined resolution for the entity's strategy.
    #[error("unsupported operation for entity {entity:?}: {detail}")]
    UnsupportedOperation {
        entity: &'static str,
        detail: &'static str,
    },

    /// The registry has been destroyed.
    #[error("shard registry has been destroyed")]
    RegistryClosed,

    /// A store handle was addressed without a routing decision.
    #[error("direct store access is not allowed")]
    DirectAccessForbidden,

    /// The shard topology failed startup validation.
    #[error("invalid shard topology: {reason}")]
    InvalidTopology { reason: String },

    /// A per-shard store call failed.
    ///
    /// The fan-out join aborts on the first such failure; side effects
    /// already applied on other shards are not rolled back.
    #[error("store operation failed on shard {shard:?}: {source}")]
    Store {
        shard: String,
        #[source]
        source: E,
    },
}
