//! Table lifecycle and introspection for `document_chunks`

use super::{Destructive, TABLE_NAME};
use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{Row, SqliteConnection, SqlitePool};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS document_chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chunk_content TEXT NOT NULL,
        embedding BLOB NOT NULL,
        source_file TEXT NOT NULL,
        chunking_method TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
"#;

const CREATE_SOURCE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_document_chunks_source ON document_chunks(source_file)";

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Creates, inspects and clears the chunk table.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: SqlitePool,
}

impl SchemaManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the table and its index if they are missing. Idempotent.
    pub async fn ensure_table(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        create_objects(&mut conn)
            .await
            .context("Failed to create document_chunks table")?;
        tracing::debug!("Ensured table {}", TABLE_NAME);
        Ok(())
    }

    pub async fn table_exists(&self) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
                .bind(TABLE_NAME)
                .fetch_one(&self.pool)
                .await
                .context("Failed to look up table")?;
        Ok(count > 0)
    }

    /// Number of stored records. Fails when the table does not exist.
    pub async fn row_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count rows in document_chunks")?;
        Ok(count as u64)
    }

    /// Drop the table and create it again, in one transaction.
    ///
    /// Returns [`Destructive::Declined`] without touching the database when
    /// `confirmed` is false. `rows` in the result is the number of records
    /// that were dropped.
    pub async fn drop_and_recreate(&self, confirmed: bool) -> Result<Destructive> {
        if !confirmed {
            tracing::info!("Reset of {} declined", TABLE_NAME);
            return Ok(Destructive::Declined);
        }

        let dropped = if self.table_exists().await? {
            self.row_count().await?
        } else {
            0
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DROP TABLE IF EXISTS document_chunks")
            .execute(&mut *tx)
            .await
            .context("Failed to drop document_chunks")?;
        create_objects(&mut tx)
            .await
            .context("Failed to recreate document_chunks")?;
        tx.commit().await?;

        tracing::warn!("Dropped and recreated {} ({} rows removed)", TABLE_NAME, dropped);
        Ok(Destructive::Done { rows: dropped })
    }

    /// Remove every record of `source_file`. Zero matches is not an error.
    pub async fn delete_by_source(&self, source_file: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM document_chunks WHERE source_file = ?1")
            .bind(source_file)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to delete chunks of '{source_file}'"))?;
        tx.commit().await?;

        let deleted = result.rows_affected();
        tracing::info!("Deleted {} chunks from {}", deleted, source_file);
        Ok(deleted)
    }

    /// Remove every record, keeping the table.
    pub async fn delete_all(&self, confirmed: bool) -> Result<Destructive> {
        if !confirmed {
            tracing::info!("Deletion of all chunks declined");
            return Ok(Destructive::Declined);
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM document_chunks")
            .execute(&mut *tx)
            .await
            .context("Failed to delete all chunks")?;
        tx.commit().await?;

        let deleted = result.rows_affected();
        tracing::warn!("Deleted all {} chunks", deleted);
        Ok(Destructive::Done { rows: deleted })
    }

    /// Columns of the table in declaration order. Empty when the table is missing.
    pub async fn columns(&self) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")
            .bind(TABLE_NAME)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read table info")?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let not_null: i64 = row.get("notnull");
            let pk: i64 = row.get("pk");
            columns.push(ColumnInfo {
                name: row.get("name"),
                declared_type: row.get("type"),
                not_null: not_null != 0,
                primary_key: pk != 0,
            });
        }
        Ok(columns)
    }

    /// Run a trivial query and return the SQLite version.
    pub async fn ping(&self) -> Result<String> {
        let version: String = sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&self.pool)
            .await
            .context("Database did not answer")?;
        Ok(version)
    }
}

async fn create_objects(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    sqlx::query(CREATE_TABLE).execute(&mut *conn).await?;
    sqlx::query(CREATE_SOURCE_INDEX).execute(&mut *conn).await?;
    Ok(())
}
