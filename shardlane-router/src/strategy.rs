use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::model::Entity;

/// How one entity type's rows are spread across the registry.
///
/// An entity type has at most one strategy; types with no binding are
/// "plain" and always live on the default store.
pub enum ShardingStrategy<E: Entity> {
    /// Shard selection is a pure function of the primary key: `classify`
    /// maps an id to the key of exactly one configured shard.
    Range {
        classify: Arc<dyn Fn(&E::Id) -> String + Send + Sync>,
    },
    /// Shard selection is driven by an explicit, caller-supplied key.
    /// For write placement, `matches` is evaluated per shard in
    /// configuration order and the first match wins; when nothing matches,
    /// the default shard is used.
    List {
        matches: Arc<dyn Fn(&E, &str) -> bool + Send + Sync>,
    },
}

impl<E: Entity> ShardingStrategy<E> {
    pub fn range<F>(classify: F) -> Self
    where
        F: Fn(&E::Id) -> String + Send + Sync + 'static,
    {
        Self::Range {
            classify: Arc::new(classify),
        }
    }

    pub fn list<F>(matches: F) -> Self
    where
        F: Fn(&E, &str) -> bool + Send + Sync + 'static,
    {
        Self::List {
            matches: Arc::new(matches),
        }
    }
}

impl<E: Entity> Clone for ShardingStrategy<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Range { classify } => Self::Range {
                classify: classify.clone(),
            },
            Self::List { matches } => Self::List {
                matches: matches.clone(),
            },
        }
    }
}

impl<E: Entity> fmt::Debug for ShardingStrategy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { .. } => f.write_str("ShardingStrategy::Range"),
            Self::List { .. } => f.write_str("ShardingStrategy::List"),
        }
    }
}

/// The write-once-at-startup map from entity type to sharding strategy.
///
/// This replaces run-time type introspection: bindings are registered
/// explicitly while wiring the application, then only read. Binding the
/// same entity type twice replaces the earlier entry.
#[derive(Default)]
pub struct StrategyRegistry {
    bindings: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<E: Entity>(mut self, strategy: ShardingStrategy<E>) -> Self {
        self.bindings.insert(TypeId::of::<E>(), Box::new(strategy));
        self
    }

    pub fn get<E: Entity>(&self) -> Option<ShardingStrategy<E>> {
        self.bindings
            .get(&TypeId::of::<E>())
            .and_then(|boxed| boxed.downcast_ref::<ShardingStrategy<E>>())
            .cloned()
    }

    pub fn is_bound<E: Entity>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<E>())
    }
}
