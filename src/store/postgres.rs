//! PostgreSQL event store.
//!
//! History lives in `<schema>.stepwise_migration_events`. A single
//! connection is used for the whole command: items run one after another,
//! and the session-level advisory lock has to stay on the connection that
//! took it.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Connection, Row};
use std::str::FromStr;

use super::EventStore;
use crate::error::{Error, Result};
use crate::model::{Event, EventKind, NewEvent};
use crate::naming::quote_ident;

pub const EVENTS_TABLE: &str = "stepwise_migration_events";

pub struct PgStore {
    conn: PgConnection,
    schema: String,
}

impl PgStore {
    /// Connect and check the connection with a trivial query.
    pub async fn connect(connection: &str, schema: &str, ssl: bool) -> Result<Self> {
        let mut options = PgConnectOptions::from_str(connection)?;
        if ssl {
            options = options.ssl_mode(PgSslMode::Require);
        }

        let mut conn = PgConnection::connect_with(&options).await?;
        sqlx::query("SELECT 1").execute(&mut conn).await?;
        tracing::debug!("Connected, using schema {}", schema);

        Ok(Self {
            conn,
            schema: schema.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub async fn schema_exists(&mut self) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_namespace WHERE nspname = $1)",
        )
        .bind(&self.schema)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    pub async fn table_exists(&mut self) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE tablename = $1 AND schemaname = $2)",
        )
        .bind(EVENTS_TABLE)
        .bind(&self.schema)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    /// Create the schema and the events table if they are missing.
    pub async fn ensure_initialised(&mut self) -> Result<()> {
        if !self.schema_exists().await? {
            tracing::info!("Creating schema {}", self.schema);
            sqlx::raw_sql(&create_schema_sql(&self.schema))
                .execute(&mut self.conn)
                .await?;
        }
        if !self.table_exists().await? {
            tracing::info!("Creating {} table", EVENTS_TABLE);
            sqlx::raw_sql(&create_events_table_sql(&self.schema))
                .execute(&mut self.conn)
                .await?;
        }
        Ok(())
    }

    /// Drop the schema together with every object and the history in it.
    pub async fn drop_all(&mut self) -> Result<()> {
        let sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(&self.schema));
        sqlx::raw_sql(&sql).execute(&mut self.conn).await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn read_all(&mut self) -> Result<Vec<Event>> {
        if !self.table_exists().await? {
            return Err(Error::StoreUnavailable(format!(
                "table {}.{} does not exist",
                self.schema, EVENTS_TABLE
            )));
        }

        let sql = select_events_sql(&self.schema);
        let rows = sqlx::query(&sql).fetch_all(&mut self.conn).await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn apply_in_transaction(&mut self, body: Option<&str>, event: &NewEvent) -> Result<Event> {
        let search_path = format!("SET LOCAL search_path TO {}", quote_ident(&self.schema));
        let insert = insert_event_sql(&self.schema);

        let mut tx = self.conn.begin().await?;
        sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&search_path)).await?;

        if let Some(body) = body {
            if let Err(e) = sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(body)).await {
                if let Err(rollback) = tx.rollback().await {
                    tracing::error!("Error rolling back transaction: {}", rollback);
                }
                return Err(Error::Execution {
                    filename: event.filename.clone(),
                    detail: e.to_string(),
                });
            }
        }

        let row = sqlx::query(&insert)
            .bind(event.kind.as_str())
            .bind(&event.filename)
            .bind(&event.script)
            .fetch_one(&mut *tx)
            .await?;
        let stored = event_from_row(&row)?;

        tx.commit().await?;
        Ok(stored)
    }

    async fn lock(&mut self) -> Result<()> {
        tracing::debug!("Acquiring advisory lock for schema {}", self.schema);
        sqlx::query("SELECT pg_advisory_lock(hashtext($1))")
            .bind(&self.schema)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn unlock(&mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock(hashtext($1))")
            .bind(&self.schema)
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }
}

fn event_from_row(row: &PgRow) -> Result<Event> {
    let kind: String = row.try_get("type")?;
    Ok(Event {
        id: row.try_get("id")?,
        kind: EventKind::parse(&kind),
        filename: row.try_get("filename")?,
        script: row.try_get("script")?,
        applied_by: row.try_get("applied_by")?,
        applied_at: row.try_get("applied_at")?,
    })
}

fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema))
}

fn create_events_table_sql(schema: &str) -> String {
    format!(
        r#"CREATE TABLE IF NOT EXISTS {}.{} (
  id SERIAL PRIMARY KEY,
  type TEXT NOT NULL,
  filename TEXT NOT NULL,
  script TEXT NOT NULL,
  applied_by TEXT NOT NULL DEFAULT current_user,
  applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
)"#,
        quote_ident(schema),
        EVENTS_TABLE
    )
}

const EVENT_COLUMNS: &str = "id::bigint AS id, type, filename, script, applied_by, applied_at";

fn select_events_sql(schema: &str) -> String {
    format!(
        "SELECT {} FROM {}.{} ORDER BY id ASC",
        EVENT_COLUMNS,
        quote_ident(schema),
        EVENTS_TABLE
    )
}

fn insert_event_sql(schema: &str) -> String {
    format!(
        "INSERT INTO {}.{} (type, filename, script) VALUES ($1, $2, $3) RETURNING {}",
        quote_ident(schema),
        EVENTS_TABLE,
        EVENT_COLUMNS
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ddl_quotes_schema() {
        let ddl = create_events_table_sql("my schema");
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"my schema\".stepwise_migration_events"));
        assert!(ddl.contains("applied_by TEXT NOT NULL DEFAULT current_user"));
        assert!(!ddl.contains("UNIQUE"));
    }

    #[test]
    fn test_events_are_read_in_id_order() {
        let sql = select_events_sql("app");
        assert!(sql.ends_with("FROM \"app\".stepwise_migration_events ORDER BY id ASC"));
    }

    #[test]
    fn test_insert_returns_stored_row() {
        let sql = insert_event_sql("app");
        assert!(sql.contains("VALUES ($1, $2, $3)"));
        assert!(sql.ends_with(EVENT_COLUMNS));
    }
}
