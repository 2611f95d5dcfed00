//! Durable exchange log backed by SQLite.

use crate::error::{HistoryError, Result};
use crate::exchange::Exchange;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task;
use tracing::debug;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist an exchange under the next free index of the session.
    async fn append(&self, session_id: &str, question: &str, answer: &str) -> Result<Exchange>;

    /// Full history of a session, oldest first.
    async fn load(&self, session_id: &str) -> Result<Vec<Exchange>>;

    /// The last `limit` exchanges of a session, oldest first.
    async fn load_recent(&self, session_id: &str, limit: usize) -> Result<Vec<Exchange>>;

    /// Delete every exchange of a session. Returns the number of rows removed.
    async fn clear(&self, session_id: &str) -> Result<usize>;

    async fn count(&self, session_id: &str) -> Result<usize>;
}

/// SQLite store opening one short-lived connection per operation.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    db_path: PathBuf,
}

impl SqliteHistoryStore {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| HistoryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = open_connection(&db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS historico (
                session_id TEXT NOT NULL,
                idx INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                pergunta TEXT NOT NULL,
                resposta TEXT NOT NULL,
                PRIMARY KEY (session_id, idx)
            );

            CREATE INDEX IF NOT EXISTS idx_historico_session_timestamp
                ON historico(session_id, timestamp);
            "#,
        )?;

        debug!(path = %db_path.display(), "history database ready");
        Ok(Self { db_path })
    }

    async fn run_blocking<F, T>(&self, task_fn: F) -> Result<T>
    where
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db_path = self.db_path.clone();
        task::spawn_blocking(move || task_fn(&db_path))
            .await
            .map_err(|err| HistoryError::Worker(err.to_string()))?
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn append(&self, session_id: &str, question: &str, answer: &str) -> Result<Exchange> {
        let session_id = session_id.to_string();
        let question = question.to_string();
        let answer = answer.to_string();

        self.run_blocking(move |db_path| {
            let mut conn = open_connection(db_path)?;
            // IMMEDIATE takes the write lock up front so two writers cannot
            // both read the same MAX(idx).
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let next_index: i64 = tx.query_row(
                "SELECT COALESCE(MAX(idx) + 1, 0) FROM historico WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            let created_at = millis_to_datetime(Utc::now().timestamp_millis());

            tx.execute(
                r#"
                INSERT INTO historico (session_id, idx, timestamp, pergunta, resposta)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    session_id,
                    next_index,
                    created_at.timestamp_millis(),
                    question,
                    answer
                ],
            )?;
            tx.commit()?;

            Ok(Exchange {
                index: next_index as u64,
                question,
                answer,
                created_at,
            })
        })
        .await
    }

    async fn load(&self, session_id: &str) -> Result<Vec<Exchange>> {
        let session_id = session_id.to_string();
        self.run_blocking(move |db_path| {
            let conn = open_connection(db_path)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT idx, pergunta, resposta, timestamp
                FROM historico
                WHERE session_id = ?1
                ORDER BY idx ASC
                "#,
            )?;

            let rows = stmt.query_map(params![session_id], map_exchange)?;
            let mut exchanges = Vec::new();
            for row in rows {
                exchanges.push(row?);
            }
            Ok(exchanges)
        })
        .await
    }

    async fn load_recent(&self, session_id: &str, limit: usize) -> Result<Vec<Exchange>> {
        let session_id = session_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.run_blocking(move |db_path| {
            let conn = open_connection(db_path)?;
            let mut stmt = conn.prepare(
                r#"
                SELECT idx, pergunta, resposta, timestamp
                FROM historico
                WHERE session_id = ?1
                ORDER BY idx DESC
                LIMIT ?2
                "#,
            )?;

            let rows = stmt.query_map(params![session_id, limit], map_exchange)?;
            let mut exchanges = Vec::new();
            for row in rows {
                exchanges.push(row?);
            }
            exchanges.reverse();
            Ok(exchanges)
        })
        .await
    }

    async fn clear(&self, session_id: &str) -> Result<usize> {
        let session_id = session_id.to_string();
        self.run_blocking(move |db_path| {
            let conn = open_connection(db_path)?;
            let deleted = conn.execute(
                "DELETE FROM historico WHERE session_id = ?1",
                params![session_id],
            )?;
            Ok(deleted)
        })
        .await
    }

    async fn count(&self, session_id: &str) -> Result<usize> {
        let session_id = session_id.to_string();
        self.run_blocking(move |db_path| {
            let conn = open_connection(db_path)?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(1) FROM historico WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        })
        .await
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(3))?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
    Ok(conn)
}

fn map_exchange(row: &Row<'_>) -> rusqlite::Result<Exchange> {
    let index: i64 = row.get(0)?;
    Ok(Exchange {
        index: index.max(0) as u64,
        question: row.get(1)?,
        answer: row.get(2)?,
        created_at: millis_to_datetime(row.get(3)?),
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
