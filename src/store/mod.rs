//! SQLite-backed ERP store.
//!
//! The connection sits behind a mutex and every statement runs on the
//! blocking pool, so tools can await store calls from the reasoning loop
//! without stalling the runtime.

pub mod schema;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::hooks::{AuthAction, AuthContext, Authorization};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

/// Rows rendered into an observation are capped at this many.
pub const DEFAULT_MAX_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// More rows matched than were returned
    pub truncated: bool,
}

impl QueryResult {
    /// Render as a pipe-separated text table for the agent transcript.
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "No rows returned.".to_string();
        }
        let mut out = self.columns.join(" | ");
        for row in &self.rows {
            out.push('\n');
            out.push_str(&row.join(" | "));
        }
        if self.truncated {
            let _ = write!(out, "\n... (showing first {} rows)", self.rows.len());
        }
        out
    }
}

#[derive(Clone)]
pub struct ErpStore {
    conn: Arc<Mutex<Connection>>,
    max_rows: usize,
}

impl ErpStore {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open ERP database: {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;
        schema::create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_rows: DEFAULT_MAX_ROWS,
        })
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows.max(1);
        self
    }

    /// Run a row-returning statement.
    pub async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.run_query(sql, None).await
    }

    /// Run a row-returning statement that may only read `tables`. SQLite
    /// refuses to prepare it if it touches anything else.
    pub async fn query_in(&self, sql: &str, tables: &[&str]) -> Result<QueryResult> {
        self.run_query(sql, Some(scope_of(tables))).await
    }

    /// Run a data-changing statement and return the affected row count.
    pub async fn execute(&self, sql: &str) -> Result<usize> {
        self.run_execute(sql, None).await
    }

    /// Run a data-changing statement that may only touch `tables`.
    pub async fn execute_in(&self, sql: &str, tables: &[&str]) -> Result<usize> {
        self.run_execute(sql, Some(scope_of(tables))).await
    }

    async fn run_query(&self, sql: &str, scope: Option<Vec<String>>) -> Result<QueryResult> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let max_rows = self.max_rows;
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            with_scope(&conn, scope, |conn| query_blocking(conn, &sql, max_rows))
        })
        .await
        .context("Store query task failed")?
    }

    async fn run_execute(&self, sql: &str, scope: Option<Vec<String>>) -> Result<usize> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            with_scope(&conn, scope, |conn| {
                conn.execute(&sql, [])
                    .context("Statement execution failed")
            })
        })
        .await
        .context("Store execute task failed")?
    }
}

fn scope_of(tables: &[&str]) -> Vec<String> {
    tables.iter().map(|t| t.to_ascii_lowercase()).collect()
}

/// Run `f` with an authorizer that denies access to tables outside `scope`.
/// The authorizer is removed again before returning.
fn with_scope<T>(
    conn: &Connection,
    scope: Option<Vec<String>>,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let Some(tables) = scope else {
        return f(conn);
    };
    conn.authorizer(Some(move |ctx: AuthContext<'_>| authorize(&tables, &ctx.action)));
    let result = f(conn);
    conn.authorizer(None::<fn(AuthContext<'_>) -> Authorization>);
    result
}

fn authorize(tables: &[String], action: &AuthAction<'_>) -> Authorization {
    let table = match *action {
        AuthAction::Read { table_name, .. }
        | AuthAction::Insert { table_name }
        | AuthAction::Update { table_name, .. }
        | AuthAction::Delete { table_name } => table_name,
        AuthAction::Pragma { .. } | AuthAction::Attach { .. } | AuthAction::Detach { .. } => {
            return Authorization::Deny;
        }
        _ => return Authorization::Allow,
    };
    if tables.iter().any(|t| t.eq_ignore_ascii_case(table)) {
        Authorization::Allow
    } else {
        tracing::warn!(table, "Denied access to table outside tool scope");
        Authorization::Deny
    }
}

fn query_blocking(conn: &Connection, sql: &str, max_rows: usize) -> Result<QueryResult> {
    let mut stmt = conn.prepare(sql).context("Invalid query")?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let column_count = columns.len();

    let mut rows = stmt.query([]).context("Query failed")?;
    let mut collected = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next().context("Failed to read row")? {
        if collected.len() >= max_rows {
            truncated = true;
            break;
        }
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(render_value(row.get_ref(idx)?));
        }
        collected.push(values);
    }

    Ok(QueryResult {
        columns,
        rows: collected,
        truncated,
    })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn insert_then_query() {
        let store = ErpStore::open_in_memory().unwrap();
        let affected = store
            .execute("INSERT INTO customers (name, email) VALUES ('Acme', 'ops@acme.test')")
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let result = store
            .query("SELECT name, email, phone FROM customers")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name", "email", "phone"]);
        assert_eq!(result.rows, vec![vec!["Acme", "ops@acme.test", "NULL"]]);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn query_truncates_at_max_rows() {
        let store = ErpStore::open_in_memory().unwrap().with_max_rows(2);
        for i in 0..3 {
            store
                .execute(&format!(
                    "INSERT INTO glossary (term, definition) VALUES ('t{i}', 'd{i}')"
                ))
                .await
                .unwrap();
        }
        let result = store.query("SELECT term FROM glossary").await.unwrap();
        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);
        assert!(result.render().contains("showing first 2 rows"));
    }

    #[tokio::test]
    async fn invalid_sql_is_an_error() {
        let store = ErpStore::open_in_memory().unwrap();
        assert!(store.query("SELEC nothing").await.is_err());
    }

    #[test]
    fn render_empty_result() {
        let result = QueryResult {
            columns: vec!["id".into()],
            rows: vec![],
            truncated: false,
        };
        assert_eq!(result.render(), "No rows returned.");
    }

    #[tokio::test]
    async fn open_creates_file_and_schema() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("erp.db");
        let store = ErpStore::open(&path).unwrap();
        assert!(path.exists());
        let result = store.query("SELECT COUNT(*) AS n FROM invoices").await.unwrap();
        assert_eq!(result.rows, vec![vec!["0"]]);
    }

    #[tokio::test]
    async fn scoped_query_rejects_other_tables() {
        let store = ErpStore::open_in_memory().unwrap();
        store
            .execute("INSERT INTO glossary (term, definition) VALUES ('ARR', 'Annual recurring revenue')")
            .await
            .unwrap();

        let ok = store
            .query_in("SELECT term FROM glossary", &["glossary"])
            .await
            .unwrap();
        assert_eq!(ok.rows, vec![vec!["ARR"]]);

        let err = store
            .query_in("SELECT amount FROM \"invoices\"", &["customers", "leads"])
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("not authorized"));
        assert!(store
            .query_in("SELECT name FROM [sqlite_master]", &["glossary"])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn scoped_execute_rejects_other_tables() {
        let store = ErpStore::open_in_memory().unwrap();
        assert!(store
            .execute_in("DELETE FROM invoices", &["customers", "leads", "orders"])
            .await
            .is_err());
        assert_eq!(
            store
                .execute_in(
                    "INSERT INTO leads (name, status) VALUES ('Hooli', 'new')",
                    &["customers", "leads", "orders"],
                )
                .await
                .unwrap(),
            1
        );
        // The scope is lifted once the statement has run
        assert!(store.query("SELECT COUNT(*) FROM invoices").await.is_ok());
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let store = ErpStore::open_in_memory().unwrap();
        assert!(store
            .execute("INSERT INTO invoices (customer_id, amount, status) VALUES (42, 10.0, 'open')")
            .await
            .is_err());
    }
}
