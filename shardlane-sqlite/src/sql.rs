//! SQL generation for the `StoreClient` operations.
//!
//! Table and column names come from `SqliteTable` constants declared in
//! code, so they are interpolated directly; only row values travel as bound
//! parameters.

use shardlane_router::{Criteria, Patch, Query, Selector, Value};

use crate::SqliteTable;

pub(crate) struct Statement {
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
}

pub(crate) fn insert<E: SqliteTable>() -> String {
    let placeholders = placeholders(E::columns().len());
    format!(
        "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
        E::table(),
        E::columns().join(", "),
        placeholders,
    )
}

pub(crate) fn remove_by_id<E: SqliteTable>() -> String {
    format!("DELETE FROM {} WHERE {} = ?", E::table(), E::id_column())
}

pub(crate) fn soft_remove_by_id<E: SqliteTable>(column: &str) -> String {
    format!(
        "UPDATE {} SET {} = strftime('%s','now') WHERE {} = ?",
        E::table(),
        column,
        E::id_column(),
    )
}

pub(crate) fn select<E: SqliteTable>(query: &Query) -> Statement {
    let mut sql = format!("SELECT {} FROM {}", E::columns().join(", "), E::table());
    let mut params = Vec::new();

    append_read_filters::<E>(&mut sql, &mut params, query.selector.as_ref());

    if let Some(order) = &query.order_by {
        let direction = if order.descending { "DESC" } else { "ASC" };
        sql.push_str(&format!(" ORDER BY {} {}", order.column, direction));
    }

    match (query.limit, query.offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
        // SQLite requires LIMIT before OFFSET; -1 means unbounded.
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        (None, None) => {},
    }

    Statement { sql, params }
}

pub(crate) fn select_one_by_id<E: SqliteTable>(id: Value) -> Statement {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        E::columns().join(", "),
        E::table(),
        E::id_column(),
    );
    if let Some(column) = E::soft_delete_column() {
        sql.push_str(&format!(" AND {column} IS NULL"));
    }
    sql.push_str(" LIMIT 1");

    Statement {
        sql,
        params: vec![id],
    }
}

pub(crate) fn select_by_ids<E: SqliteTable>(ids: Vec<Value>) -> Statement {
    let mut sql = format!(
        "SELECT {} FROM {} WHERE {} IN ({})",
        E::columns().join(", "),
        E::table(),
        E::id_column(),
        placeholders(ids.len()),
    );
    if let Some(column) = E::soft_delete_column() {
        sql.push_str(&format!(" AND {column} IS NULL"));
    }

    Statement { sql, params: ids }
}

pub(crate) fn count<E: SqliteTable>(query: &Query) -> Statement {
    let mut sql = format!("SELECT COUNT(*) FROM {}", E::table());
    let mut params = Vec::new();

    append_read_filters::<E>(&mut sql, &mut params, query.selector.as_ref());

    Statement { sql, params }
}

pub(crate) fn update<E: SqliteTable>(criteria: &Criteria<E>, patch: &Patch) -> Statement {
    let assignments = patch
        .assignments()
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("UPDATE {} SET {}", E::table(), assignments);
    let mut params: Vec<Value> = patch
        .assignments()
        .iter()
        .map(|(_, value)| value.clone())
        .collect();

    append_criteria::<E>(&mut sql, &mut params, criteria);

    Statement { sql, params }
}

pub(crate) fn delete<E: SqliteTable>(criteria: &Criteria<E>) -> Statement {
    let mut sql = format!("DELETE FROM {}", E::table());
    let mut params = Vec::new();

    append_criteria::<E>(&mut sql, &mut params, criteria);

    Statement { sql, params }
}

fn append_read_filters<E: SqliteTable>(
    sql: &mut String,
    params: &mut Vec<Value>,
    selector: Option<&Selector>,
) {
    let mut conditions = Vec::new();

    if let Some(selector) = selector {
        if !selector.is_empty() {
            conditions.push(selector_condition(selector, params));
        }
    }

    if let Some(column) = E::soft_delete_column() {
        conditions.push(format!("{column} IS NULL"));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
}

fn append_criteria<E: SqliteTable>(
    sql: &mut String,
    params: &mut Vec<Value>,
    criteria: &Criteria<E>,
) {
    match criteria {
        // An empty id set can match nothing; SQLite rejects `IN ()`.
        Criteria::Ids(ids) if ids.is_empty() => sql.push_str(" WHERE 1 = 0"),
        Criteria::Ids(ids) => {
            sql.push_str(&format!(
                " WHERE {} IN ({})",
                E::id_column(),
                placeholders(ids.len()),
            ));
            params.extend(ids.iter().map(|id| id.clone().into()));
        },
        Criteria::Matching(selector) if selector.is_empty() => {},
        Criteria::Matching(selector) => {
            let condition = selector_condition(selector, params);
            sql.push_str(" WHERE ");
            sql.push_str(&condition);
        },
    }
}

fn selector_condition(selector: &Selector, params: &mut Vec<Value>) -> String {
    let condition = selector
        .clauses()
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    params.extend(selector.clauses().iter().map(|(_, value)| value.clone()));
    condition
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use shardlane_router::{Entity, Selector};

    use super::*;
    use crate::FromRow;

    #[derive(Debug, Clone)]
    struct Ticket {
        id: i64,
        state: String,
        closed_at: Option<i64>,
    }

    impl Entity for Ticket {
        type Id = i64;

        fn table() -> &'static str {
            "tickets"
        }

        fn id(&self) -> i64 {
            self.id
        }

        fn field(&self, column: &str) -> Option<Value> {
            match column {
                "id" => Some(self.id.into()),
                "state" => Some(self.state.as_str().into()),
                "closed_at" => Some(self.closed_at.into()),
                _ => None,
            }
        }

        fn apply(&mut self, patch: &Patch) {
            for (column, value) in patch.assignments() {
                if let ("state", Value::Text(state)) = (column.as_str(), value) {
                    self.state = state.clone();
                }
            }
        }
    }

    impl FromRow for Ticket {
        fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
            Ok(Self {
                id: row.get(0)?,
                state: row.get(1)?,
                closed_at: row.get(2)?,
            })
        }
    }

    impl SqliteTable for Ticket {
        fn columns() -> &'static [&'static str] {
            &["id", "state", "closed_at"]
        }

        fn values(&self) -> Vec<Value> {
            vec![self.id.into(), self.state.as_str().into(), self.closed_at.into()]
        }

        fn soft_delete_column() -> Option<&'static str> {
            Some("closed_at")
        }
    }

    #[test]
    fn test_insert_statement() {
        assert_eq!(
            insert::<Ticket>(),
            "INSERT OR REPLACE INTO tickets (id, state, closed_at) VALUES (?, ?, ?)",
        );
    }

    #[test]
    fn test_select_applies_soft_delete_filter_and_shaping() {
        let query = Query::new()
            .filter(Selector::new().eq("state", "open"))
            .order_by("id", true)
            .limit(10)
            .offset(5);
        let stmt = select::<Ticket>(&query);

        assert_eq!(
            stmt.sql,
            "SELECT id, state, closed_at FROM tickets \
             WHERE state = ? AND closed_at IS NULL \
             ORDER BY id DESC LIMIT 10 OFFSET 5",
        );
        assert_eq!(stmt.params, vec![Value::Text("open".to_string())]);
    }

    #[test]
    fn test_select_by_ids_statement() {
        let stmt = select_by_ids::<Ticket>(vec![Value::Int(1), Value::Int(2)]);

        assert_eq!(
            stmt.sql,
            "SELECT id, state, closed_at FROM tickets \
             WHERE id IN (?, ?) AND closed_at IS NULL",
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn test_update_by_selector() {
        let criteria = Criteria::<Ticket>::Matching(Selector::new().eq("state", "open"));
        let stmt = update::<Ticket>(&criteria, &Patch::new().set("state", "closed"));

        assert_eq!(stmt.sql, "UPDATE tickets SET state = ? WHERE state = ?");
        assert_eq!(
            stmt.params,
            vec![
                Value::Text("closed".to_string()),
                Value::Text("open".to_string()),
            ],
        );
    }

    #[test]
    fn test_delete_with_empty_id_set_matches_nothing() {
        let stmt = delete::<Ticket>(&Criteria::Ids(Vec::new()));
        assert_eq!(stmt.sql, "DELETE FROM tickets WHERE 1 = 0");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_delete_by_ids() {
        let stmt = delete::<Ticket>(&Criteria::Ids(vec![7, 9]));
        assert_eq!(stmt.sql, "DELETE FROM tickets WHERE id IN (?, ?)");
        assert_eq!(stmt.params, vec![Value::Int(7), Value::Int(9)]);
    }
}
