//! Relational data reader over libSQL.
//!
//! [`QueryReader`] runs one query per call against either a local database
//! file or a remote libSQL endpoint and renders the full result set with the
//! same fixed-width [`Table`] form the document reader uses.
//!
//! Every call acquires its own [`ScopedConnection`]; the connection is
//! released when the guard drops, on success and on every error path.

use std::path::Path;

use docsmith_shared::{DatabaseConfig, DocsmithError, Result, Table};
use libsql::{Connection, Database, Value, params};
use tracing::{debug, info, instrument};

/// Reads query results as text using the configured connection parameters.
#[derive(Debug, Clone)]
pub struct QueryReader {
    config: DatabaseConfig,
}

impl QueryReader {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Execute `sql` and render its full result set.
    #[instrument(skip_all, fields(remote = self.config.host.is_some()))]
    pub async fn query_to_text(&self, sql: &str) -> Result<String> {
        let scoped = ScopedConnection::open(&self.config).await?;
        let table = scoped.query_table(sql).await?;
        info!(rows = table.rows.len(), "query complete");
        Ok(table.render())
    }

    /// Like [`query_to_text`](Self::query_to_text), rendering failures inline.
    pub async fn query_to_text_lossy(&self, sql: &str) -> String {
        match self.query_to_text(sql).await {
            Ok(text) => text,
            Err(DocsmithError::Database(message)) => {
                format!("Error connecting to database: {message}")
            }
            Err(e) => format!("Error connecting to database: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoped connection
// ---------------------------------------------------------------------------

/// A database handle and its single connection, released together on drop.
pub struct ScopedConnection {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    target: String,
}

impl ScopedConnection {
    /// Open a connection per `config`: remote when `host` is set, else local file.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let (db, target) = match &config.host {
            Some(host) => {
                let token = config.password().unwrap_or_default();
                let db = libsql::Builder::new_remote(host.clone(), token)
                    .build()
                    .await
                    .map_err(|e| connect_error(host, e))?;
                (db, host.clone())
            }
            None => {
                let path = Path::new(&config.database);
                let db = libsql::Builder::new_local(path)
                    .build()
                    .await
                    .map_err(|e| connect_error(&config.database, e))?;
                (db, config.database.clone())
            }
        };

        let conn = db.connect().map_err(|e| connect_error(&target, e))?;
        debug!(%target, "database connection opened");

        Ok(Self { db, conn, target })
    }

    /// Run `sql` and collect every row.
    pub async fn query_table(&self, sql: &str) -> Result<Table> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| DocsmithError::Database(format!("query failed: {e}")))?;

        let columns = rows.column_count();
        let headers = (0..columns)
            .map(|i| rows.column_name(i).unwrap_or_default().to_string())
            .collect();
        let mut table = Table::new(headers);

        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DocsmithError::Database(format!("failed to read row: {e}")))?
        {
            let mut cells = Vec::with_capacity(columns as usize);
            for i in 0..columns {
                let value = row
                    .get_value(i)
                    .map_err(|e| DocsmithError::Database(e.to_string()))?;
                cells.push(value_to_string(&value));
            }
            table.push_row(cells);
        }

        Ok(table)
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        debug!(target = %self.target, "database connection released");
    }
}

fn connect_error(target: &str, err: libsql::Error) -> DocsmithError {
    DocsmithError::Database(format!("cannot connect to {target}: {err}"))
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}
