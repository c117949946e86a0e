use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::ShardError;
use crate::store::StoreConnection;

/// A setup callback run against a shard's freshly opened store during
/// [ShardRegistry::connect].
pub type InitHook<S> = Box<
    dyn for<'a> FnOnce(
            &'a S,
        )
            -> BoxFuture<'a, Result<(), <S as StoreConnection>::Error>>
        + Send,
>;

/// One shard's startup configuration: its key, the default flag, the
/// store-connection parameters handed through to the store collaborator
/// unmodified, and an optional initialization hook.
pub struct ShardEntry<C, S: StoreConnection> {
    key: String,
    is_default: bool,
    params: C,
    on_init: Option<InitHook<S>>,
}

impl<C, S: StoreConnection> ShardEntry<C, S> {
    pub fn new(key: impl Into<String>, params: C) -> Self {
        Self {
            key: key.into(),
            is_default: false,
            params,
            on_init: None,
        }
    }

    /// Flags this shard as the registry default. Exactly one entry per
    /// topology must carry the flag.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Attaches a hook run once against the freshly opened store.
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: for<'a> FnOnce(&'a S) -> BoxFuture<'a, Result<(), S::Error>> + Send + 'static,
    {
        self.on_init = Some(Box::new(hook));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// One configured shard: its key, the default flag and the exclusively
/// owned store handle.
#[derive(Debug)]
pub struct ShardDescriptor<S> {
    key: String,
    is_default: bool,
    store: S,
}

impl<S> ShardDescriptor<S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Store access is reserved for the gateway machinery; handing the raw
    /// handle to callers would bypass routing.
    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}

/// The ordered set of shards a logical table is spread over.
///
/// Built once at startup from static configuration and immutable until
/// [destroy](Self::destroy), so it can be read concurrently without
/// synchronization. The registry owns every store handle; destroying it
/// closes them all.
#[derive(Debug)]
pub struct ShardRegistry<S: StoreConnection> {
    shards: Vec<ShardDescriptor<S>>,
    by_key: HashMap<String, usize>,
    default_idx: usize,
    closed: AtomicBool,
}

impl<S: StoreConnection> ShardRegistry<S> {
    /// Opens every shard of `entries` in configuration order, running each
    /// entry's init hook, and returns the ready registry.
    ///
    /// The topology is validated before any store is opened: a registry
    /// with no shards, duplicate keys, or anything other than exactly one
    /// default shard never becomes ready.
    pub async fn connect<C, F, Fut>(
        entries: Vec<ShardEntry<C, S>>,
        open: F,
    ) -> Result<Arc<Self>, ShardError<S::Error>>
    where
        F: Fn(C) -> Fut,
        Fut: Future<Output = Result<S, S::Error>>,
    {
        validate(&entries)?;

        let mut shards = Vec::with_capacity(entries.len());
        let mut by_key = HashMap::with_capacity(entries.len());
        let mut default_idx = 0;

        for (idx, entry) in entries.into_iter().enumerate() {
            let store = open(entry.params).await.map_err(|source| ShardError::Store {
                shard: entry.key.clone(),
                source,
            })?;

            if let Some(hook) = entry.on_init {
                hook(&store).await.map_err(|source| ShardError::Store {
                    shard: entry.key.clone(),
                    source,
                })?;
            }

            if entry.is_default {
                default_idx = idx;
            }

            debug!(shard = %entry.key, default = entry.is_default, "shard store opened");

            by_key.insert(entry.key.clone(), idx);
            shards.push(ShardDescriptor {
                key: entry.key,
                is_default: entry.is_default,
                store,
            });
        }

        info!(shards = shards.len(), "shard registry connected");

        Ok(Arc::new(Self {
            shards,
            by_key,
            default_idx,
            closed: AtomicBool::new(false),
        }))
    }

    /// Looks a shard up by its exact key.
    pub fn resolve_by_key(&self, key: &str) -> Result<&ShardDescriptor<S>, ShardError<S::Error>> {
        self.ensure_open()?;

        if key.is_empty() {
            return Err(ShardError::DirectAccessForbidden);
        }

        self.by_key
            .get(key)
            .map(|&idx| &self.shards[idx])
            .ok_or_else(|| ShardError::UnknownShardKey {
                key: key.to_string(),
            })
    }

    /// Returns the shard flagged as default.
    pub fn resolve_default(&self) -> Result<&ShardDescriptor<S>, ShardError<S::Error>> {
        self.ensure_open()?;
        Ok(&self.shards[self.default_idx])
    }

    /// Every shard, in configuration order.
    pub fn all(&self) -> Result<&[ShardDescriptor<S>], ShardError<S::Error>> {
        self.ensure_open()?;
        Ok(&self.shards)
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shard key and store liveness per shard, in configuration order.
    ///
    /// Unlike the resolution methods this stays usable after
    /// [destroy](Self::destroy), so teardown can be observed.
    pub fn statuses(&self) -> Vec<(&str, bool)> {
        self.shards
            .iter()
            .map(|shard| (shard.key.as_str(), shard.store.is_initialized()))
            .collect()
    }

    /// Closes every shard store. Idempotent; after the first call all other
    /// registry operations fail with [ShardError::RegistryClosed].
    pub async fn destroy(&self) -> Result<(), ShardError<S::Error>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        info!(shards = self.shards.len(), "destroying shard registry");

        let mut first_failure = None;
        for shard in &self.shards {
            if let Err(source) = shard.store.close().await {
                error!(shard = %shard.key, error = %source, "failed to close shard store");
                if first_failure.is_none() {
                    first_failure = Some(ShardError::Store {
                        shard: shard.key.clone(),
                        source,
                    });
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn ensure_open(&self) -> Result<(), ShardError<S::Error>> {
        if self.is_closed() {
            Err(ShardError::RegistryClosed)
        } else {
            Ok(())
        }
    }
}

fn validate<C, S: StoreConnection>(
    entries: &[ShardEntry<C, S>],
) -> Result<(), ShardError<S::Error>> {
    if entries.is_empty() {
        return Err(ShardError::InvalidTopology {
            reason: "at least one shard is required".to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut defaults = 0usize;

    for entry in entries {
        if entry.key.is_empty() {
            return Err(ShardError::InvalidTopology {
                reason: "shard keys must not be empty".to_string(),
            });
        }

        if !seen.insert(entry.key.as_str()) {
            return Err(ShardError::InvalidTopology {
                reason: format!("duplicate shard key {:?}", entry.key),
            });
        }

        if entry.is_default {
            defaults += 1;
        }
    }

    if defaults != 1 {
        return Err(ShardError::InvalidTopology {
            reason: format!("expected exactly one default shard, found {defaults}"),
        });
    }

    Ok(())
}
