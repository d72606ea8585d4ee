//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordSink trait.

use crate::model::{Comment, Post, Record, RecordKind};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const INSERT_RECORD_SQL: &str = "
    INSERT INTO records (
        run_id, category, group_name, kind,
        post_id, post_text, post_likes, post_comments, post_timestamp, post_date, post_year,
        comment_id, comment_text, comment_likes, comment_timestamp, comment_date, comment_year
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)";

const SELECT_RECORD_SQL: &str = "
    SELECT category, group_name, kind,
           post_id, post_text, post_likes, post_comments, post_timestamp,
           comment_id, comment_text, comment_likes, comment_timestamp
    FROM records WHERE run_id = ?1 ORDER BY id";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates a database file and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    /// Record count per category of a run, in category order
    pub fn category_counts(&self, run_id: i64) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) FROM records WHERE run_id = ?1
             GROUP BY category ORDER BY MIN(id)",
        )?;
        let counts = stmt
            .query_map(params![run_id], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get(0)?, count as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Loads every record of a run in insertion order
    pub fn load_records(&self, run_id: i64) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(SELECT_RECORD_SQL)?;
        let rows = stmt.query_map(params![run_id], |row| {
            let kind: String = row.get(2)?;
            Ok((kind, record_from_row(row)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (kind, record) = row?;
            match RecordKind::from_db_string(&kind) {
                Some(kind) if kind == record.kind() => records.push(record),
                _ => {
                    return Err(StorageError::CorruptRow(format!(
                        "kind '{}' does not match post {} in {}",
                        kind, record.post.id, record.group
                    )))
                }
            }
        }
        Ok(records)
    }
}

impl RecordSink for SqliteStorage {
    fn begin_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn write_category(
        &mut self,
        run_id: i64,
        category: &str,
        records: &[Record],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(INSERT_RECORD_SQL)?;
            for record in records {
                let post = &record.post;
                let comment = record.comment.as_ref();
                stmt.execute(params![
                    run_id,
                    category,
                    record.group,
                    record.kind().as_str(),
                    post.id,
                    post.text,
                    post.like_count,
                    post.comment_count,
                    post.timestamp_unix,
                    post.date(),
                    post.year(),
                    comment.map(|c| c.id),
                    comment.map(|c| c.text.as_str()),
                    comment.map(|c| c.like_count),
                    comment.map(|c| c.timestamp_unix),
                    comment.and_then(Comment::date),
                    comment.and_then(Comment::year),
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(run_id, category, count = records.len(), "Wrote category");
        Ok(records.len())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let post = Post {
        id: row.get(3)?,
        text: row.get(4)?,
        like_count: row.get(5)?,
        comment_count: row.get(6)?,
        timestamp_unix: row.get(7)?,
    };

    let comment = match row.get::<_, Option<i64>>(8)? {
        Some(id) => Some(Comment {
            id,
            text: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            like_count: row.get::<_, Option<u32>>(10)?.unwrap_or(0),
            timestamp_unix: row.get::<_, Option<i64>>(11)?.unwrap_or(0),
            parent_post_id: post.id,
        }),
        None => None,
    };

    Ok(Record {
        category: row.get(0)?,
        group: row.get(1)?,
        post,
        comment,
    })
}
