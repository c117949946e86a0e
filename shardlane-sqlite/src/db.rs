use std::path::Path;

use flume::{self, Receiver, Sender};
use futures::channel::oneshot;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql};
use shardlane_router::Value;

enum Job {
    Run(Box<dyn FnOnce(&mut Connection) + Send + 'static>),
    Shutdown,
}

const QUEUE_DEPTH: usize = 10;

#[derive(Clone)]
/// An asynchronous wrapper around one SQLite connection.
///
/// Statements run on a dedicated background thread, preventing any IO from
/// blocking the async context; prepared statements are cached on the
/// connection.
pub(crate) struct DbHandle {
    tx: Sender<Job>,
}

impl DbHandle {
    /// Opens the SQLite database at the given path, creating it if needed,
    /// and spawns the background thread executing its statements.
    pub(crate) async fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let tx = connect(path).await?;
        Ok(Self { tx })
    }

    /// Opens a new in-memory SQLite database.
    pub(crate) async fn open_in_memory() -> rusqlite::Result<Self> {
        Self::open(":memory:").await
    }

    /// Executes a SQL statement with the provided parameters, returning the
    /// number of rows changed.
    pub(crate) async fn execute(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> rusqlite::Result<usize> {
        let sql = sql.into();
        self.submit(move |conn| {
            let mut prepared = conn.prepare_cached(&sql)?;
            prepared.execute(rusqlite::params_from_iter(params.iter().map(SqlValue)))
        })
        .await
    }

    /// Fetches at most one row from the given SQL statement.
    pub(crate) async fn fetch_one<T>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> rusqlite::Result<Option<T>>
    where
        T: FromRow + Send + 'static,
    {
        let sql = sql.into();
        self.submit(move |conn| {
            let mut prepared = conn.prepare_cached(&sql)?;
            prepared
                .query_row(
                    rusqlite::params_from_iter(params.iter().map(SqlValue)),
                    T::from_row,
                )
                .optional()
        })
        .await
    }

    /// Fetches every row produced by the given SQL statement.
    pub(crate) async fn fetch_all<T>(
        &self,
        sql: impl Into<String>,
        params: Vec<Value>,
    ) -> rusqlite::Result<Vec<T>>
    where
        T: FromRow + Send + 'static,
    {
        let sql = sql.into();
        self.submit(move |conn| {
            let mut prepared = conn.prepare_cached(&sql)?;
            let mut iter =
                prepared.query(rusqlite::params_from_iter(params.iter().map(SqlValue)))?;

            let mut rows = Vec::with_capacity(4);
            while let Some(row) = iter.next()? {
                rows.push(T::from_row(row)?);
            }

            Ok(rows)
        })
        .await
    }

    /// Stops the background thread; queued statements drain first.
    pub(crate) async fn shutdown(&self) {
        let _ = self.tx.send_async(Job::Shutdown).await;
    }

    async fn submit<CB, T>(&self, inner: CB) -> rusqlite::Result<T>
    where
        T: Send + 'static,
        CB: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let job = move |conn: &mut Connection| {
            let res = inner(conn);
            let _ = tx.send(res);
        };

        self.tx
            .send_async(Job::Run(Box::new(job)))
            .await
            .expect("send job");

        rx.await.unwrap()
    }
}

/// Converts between a borrowed row and the given type.
///
/// Rows are tied to the database connection, which never leaves the thread
/// the connection actor runs in, so results must be materialised before
/// crossing back.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Adapter binding a driver-neutral [Value] as a SQLite parameter.
pub(crate) struct SqlValue<'a>(pub(crate) &'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Bool(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Int(v) => ToSqlOutput::Owned(Sql::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(Sql::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

async fn connect(path: impl AsRef<Path>) -> rusqlite::Result<Sender<Job>> {
    let path = path.as_ref().to_path_buf();
    let (tx, rx) = flume::bounded(QUEUE_DEPTH);

    tokio::task::spawn_blocking(move || open_connection(&path, rx))
        .await
        .expect("spawn background runner")?;

    Ok(tx)
}

fn open_connection(path: &Path, jobs: Receiver<Job>) -> rusqlite::Result<()> {
    let conn = Connection::open(path)?;

    conn.query_row("pragma journal_mode = WAL;", (), |_r| Ok(()))?;
    conn.execute("pragma synchronous = normal;", ())?;
    conn.execute("pragma temp_store = memory;", ())?;

    std::thread::spawn(move || run_jobs(conn, jobs));

    Ok(())
}

fn run_jobs(mut conn: Connection, jobs: Receiver<Job>) {
    while let Ok(job) = jobs.recv() {
        match job {
            Job::Run(task) => (task)(&mut conn),
            Job::Shutdown => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::env::temp_dir;

    use super::*;

    #[tokio::test]
    async fn test_memory_db_handle() {
        let handle = DbHandle::open_in_memory().await.expect("open DB");

        run_db_handle_suite(handle).await;
    }

    #[tokio::test]
    async fn test_disk_db_handle() {
        let path = temp_dir().join(uuid::Uuid::new_v4().to_string());
        let handle = DbHandle::open(path).await.expect("open DB");

        run_db_handle_suite(handle).await;
    }

    #[derive(Debug, Eq, PartialEq)]
    struct Person {
        id: i32,
        name: String,
        data: String,
    }

    impl FromRow for Person {
        fn from_row(row: &Row) -> rusqlite::Result<Self> {
            Ok(Self {
                id: row.get(0)?,
                name: row.get(1)?,
                data: row.get(2)?,
            })
        }
    }

    async fn run_db_handle_suite(handle: DbHandle) {
        handle
            .execute(
                "CREATE TABLE person (
                    id    INTEGER PRIMARY KEY,
                    name  TEXT NOT NULL,
                    data  BLOB
                )",
                Vec::new(),
            )
            .await
            .expect("create table");

        let res = handle
            .fetch_one::<Person>("SELECT id, name, data FROM person;", Vec::new())
            .await
            .expect("execute statement");
        assert!(res.is_none(), "Expected no rows to be returned.");

        handle
            .execute(
                "INSERT INTO person (id, name, data) VALUES (?, ?, ?);",
                vec![1.into(), "asya".into(), "tada".into()],
            )
            .await
            .expect("Insert row");

        let res = handle
            .fetch_one::<Person>("SELECT id, name, data FROM person;", Vec::new())
            .await
            .expect("execute statement");
        assert_eq!(
            res,
            Some(Person {
                id: 1,
                name: "asya".to_string(),
                data: "tada".to_string()
            }),
        );

        handle
            .execute(
                "INSERT INTO person (id, name, data) VALUES (?, ?, ?);",
                vec![2.into(), "iris".into(), "tada2".into()],
            )
            .await
            .expect("Insert row");

        let res = handle
            .fetch_all::<Person>(
                "SELECT id, name, data FROM person WHERE name = ? ORDER BY id ASC;",
                vec!["iris".into()],
            )
            .await
            .expect("execute statement");
        assert_eq!(
            res,
            vec![Person {
                id: 2,
                name: "iris".to_string(),
                data: "tada2".to_string()
            }],
        );

        handle.shutdown().await;
    }
}
