//! # Shardlane SQLite
//! A ready-made implementation of shardlane's `StoreClient` trait backed by
//! SQLite, one database per shard.
//!
//! Statements for each store run on a dedicated background thread fed over
//! a bounded channel, so no SQLite IO ever blocks the async context.
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures::future::BoxFuture;
//! use shardlane_router::{
//!     Entity,
//!     EntityGateway,
//!     Patch,
//!     Selector,
//!     ShardEntry,
//!     ShardRegistry,
//!     ShardingStrategy,
//!     StrategyRegistry,
//!     Value,
//! };
//! use shardlane_sqlite::{FromRow, Row, SqliteStore, SqliteStoreError, SqliteTable};
//!
//! #[derive(Debug, Clone)]
//! struct Order {
//!     id: i64,
//!     region: String,
//! }
//!
//! impl Entity for Order {
//!     type Id = i64;
//!
//!     fn table() -> &'static str {
//!         "orders"
//!     }
//!
//!     fn id(&self) -> i64 {
//!         self.id
//!     }
//!
//!     fn field(&self, column: &str) -> Option<Value> {
//!         match column {
//!             "id" => Some(self.id.into()),
//!             "region" => Some(self.region.as_str().into()),
//!             _ => None,
//!         }
//!     }
//!
//!     fn apply(&mut self, patch: &Patch) {
//!         for (column, value) in patch.assignments() {
//!             if let ("region", Value::Text(region)) = (column.as_str(), value) {
//!                 self.region = region.clone();
//!             }
//!         }
//!     }
//! }
//!
//! impl FromRow for Order {
//!     fn from_row(row: &Row) -> rusqlite::Result<Self> {
//!         Ok(Self {
//!             id: row.get(0)?,
//!             region: row.get(1)?,
//!         })
//!     }
//! }
//!
//! impl SqliteTable for Order {
//!     fn columns() -> &'static [&'static str] {
//!         &["id", "region"]
//!     }
//!
//!     fn values(&self) -> Vec<Value> {
//!         vec![self.id.into(), self.region.as_str().into()]
//!     }
//! }
//!
//! fn create_tables(store: &SqliteStore) -> BoxFuture<'_, Result<(), SqliteStoreError>> {
//!     Box::pin(async move {
//!         store
//!             .execute(
//!                 "CREATE TABLE orders (id INTEGER PRIMARY KEY, region TEXT NOT NULL)",
//!                 Vec::new(),
//!             )
//!             .await?;
//!         Ok(())
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = ShardRegistry::connect(
//!         vec![
//!             ShardEntry::new("default", ":memory:").as_default().on_init(create_tables),
//!             ShardEntry::new("eu", ":memory:").on_init(create_tables),
//!             ShardEntry::new("us", ":memory:").on_init(create_tables),
//!         ],
//!         SqliteStore::open,
//!     )
//!     .await?;
//!
//!     let strategies = StrategyRegistry::new()
//!         .bind::<Order>(ShardingStrategy::list(|order: &Order, key| order.region == key));
//!
//!     let orders = EntityGateway::<Order, SqliteStore>::new(registry.clone(), &strategies);
//!     orders.save_one(Order { id: 1, region: "eu".to_string() }).await?;
//!
//!     let on_eu = orders
//!         .find_by(&Selector::new().eq("region", "eu"), Some("eu"))
//!         .await?;
//!     assert_eq!(on_eu.len(), 1);
//!
//!     registry.destroy().await?;
//!     Ok(())
//! }
//! ```

mod db;
mod from_row_impl;
mod sql;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
pub use db::FromRow;
pub use rusqlite::Row;
use shardlane_router::{
    Criteria,
    DeleteOutcome,
    Entity,
    Patch,
    Query,
    StoreClient,
    StoreConnection,
    UpdateOutcome,
    Value,
};

#[derive(Debug, thiserror::Error)]
pub enum SqliteStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store connection is closed")]
    Closed,

    #[error("soft deletes are not declared for table {0:?}")]
    SoftDeleteUnsupported(&'static str),
}

/// Binds an [Entity] to a SQLite table layout.
pub trait SqliteTable: Entity + FromRow {
    /// Every column in declaration order, including the id column.
    fn columns() -> &'static [&'static str];

    fn id_column() -> &'static str {
        "id"
    }

    /// The row's column values, aligned with [columns](Self::columns).
    fn values(&self) -> Vec<Value>;

    /// The column marking soft-removed rows, when the table has one.
    ///
    /// Soft removal stamps it with the current unix timestamp and reads
    /// skip any row where it is non-null. Tables without the column reject
    /// soft removal.
    fn soft_delete_column() -> Option<&'static str> {
        None
    }
}

/// A [StoreClient] implementation wrapping one SQLite database.
pub struct SqliteStore {
    inner: db::DbHandle,
    open: AtomicBool,
}

impl SqliteStore {
    /// Opens the SQLite database at the given path.
    ///
    /// If the database does not already exist it will be created.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SqliteStoreError> {
        let inner = db::DbHandle::open(path.as_ref()).await?;
        Ok(Self {
            inner,
            open: AtomicBool::new(true),
        })
    }

    /// Opens a new in-memory SQLite database.
    pub async fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let inner = db::DbHandle::open_in_memory().await?;
        Ok(Self {
            inner,
            open: AtomicBool::new(true),
        })
    }

    /// Executes one arbitrary SQL statement, returning the rows changed.
    ///
    /// Intended for shard initialization hooks: schema creation, pragmas
    /// and the like. Routine row access goes through the gateway.
    pub async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<usize, SqliteStoreError> {
        self.ensure_open()?;
        Ok(self.inner.execute(sql, params).await?)
    }

    fn ensure_open(&self) -> Result<(), SqliteStoreError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(SqliteStoreError::Closed)
        }
    }
}

#[async_trait]
impl StoreConnection for SqliteStore {
    type Error = SqliteStoreError;

    async fn close(&self) -> Result<(), Self::Error> {
        if self.open.swap(false, Ordering::AcqRel) {
            self.inner.shutdown().await;
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<E: SqliteTable> StoreClient<E> for SqliteStore {
    async fn save(&self, entity: E) -> Result<E, Self::Error> {
        self.ensure_open()?;
        self.inner.execute(sql::insert::<E>(), entity.values()).await?;
        Ok(entity)
    }

    async fn remove(&self, entity: E) -> Result<E, Self::Error> {
        self.ensure_open()?;
        self.inner
            .execute(sql::remove_by_id::<E>(), vec![entity.id().into()])
            .await?;
        Ok(entity)
    }

    async fn soft_remove(&self, entity: E) -> Result<E, Self::Error> {
        self.ensure_open()?;
        let column = E::soft_delete_column()
            .ok_or(SqliteStoreError::SoftDeleteUnsupported(E::table()))?;
        self.inner
            .execute(sql::soft_remove_by_id::<E>(column), vec![entity.id().into()])
            .await?;
        Ok(entity)
    }

    async fn update(
        &self,
        criteria: &Criteria<E>,
        patch: &Patch,
    ) -> Result<UpdateOutcome, Self::Error> {
        self.ensure_open()?;

        if patch.is_empty() {
            return Ok(UpdateOutcome {
                affected: Some(0),
                ..Default::default()
            });
        }

        let stmt = sql::update::<E>(criteria, patch);
        let affected = self.inner.execute(stmt.sql, stmt.params).await?;
        Ok(UpdateOutcome {
            affected: Some(affected as u64),
            ..Default::default()
        })
    }

    async fn delete(&self, criteria: &Criteria<E>) -> Result<DeleteOutcome, Self::Error> {
        self.ensure_open()?;

        let stmt = sql::delete::<E>(criteria);
        let affected = self.inner.execute(stmt.sql, stmt.params).await?;
        Ok(DeleteOutcome {
            affected: Some(affected as u64),
            ..Default::default()
        })
    }

    async fn count(&self, query: &Query) -> Result<u64, Self::Error> {
        self.ensure_open()?;

        let stmt = sql::count::<E>(query);
        let row: Option<(i64,)> = self.inner.fetch_one(stmt.sql, stmt.params).await?;
        Ok(row.map(|(total,)| total as u64).unwrap_or(0))
    }

    async fn find(&self, query: &Query) -> Result<Vec<E>, Self::Error> {
        self.ensure_open()?;

        let stmt = sql::select::<E>(query);
        Ok(self.inner.fetch_all(stmt.sql, stmt.params).await?)
    }

    async fn find_and_count(&self, query: &Query) -> Result<(Vec<E>, u64), Self::Error> {
        self.ensure_open()?;

        let select = sql::select::<E>(query);
        let rows = self.inner.fetch_all(select.sql, select.params).await?;

        let count = sql::count::<E>(query);
        let total: Option<(i64,)> = self.inner.fetch_one(count.sql, count.params).await?;

        Ok((rows, total.map(|(n,)| n as u64).unwrap_or(0)))
    }

    async fn find_one(&self, query: &Query) -> Result<Option<E>, Self::Error> {
        self.ensure_open()?;

        let mut narrowed = query.clone();
        narrowed.limit = Some(1);
        let stmt = sql::select::<E>(&narrowed);
        Ok(self.inner.fetch_one(stmt.sql, stmt.params).await?)
    }

    async fn find_one_by_id(&self, id: &E::Id) -> Result<Option<E>, Self::Error> {
        self.ensure_open()?;

        let stmt = sql::select_one_by_id::<E>(id.clone().into());
        Ok(self.inner.fetch_one(stmt.sql, stmt.params).await?)
    }

    async fn find_by_ids(&self, ids: &[E::Id]) -> Result<Vec<E>, Self::Error> {
        self.ensure_open()?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let stmt = sql::select_by_ids::<E>(ids.iter().map(|id| id.clone().into()).collect());
        Ok(self.inner.fetch_all(stmt.sql, stmt.params).await?)
    }
}
