//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per emitted record, post or comment
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    category TEXT NOT NULL,
    group_name TEXT NOT NULL,
    kind TEXT NOT NULL,
    post_id INTEGER NOT NULL,
    post_text TEXT NOT NULL,
    post_likes INTEGER NOT NULL,
    post_comments INTEGER NOT NULL,
    post_timestamp INTEGER NOT NULL,
    post_date TEXT,
    post_year INTEGER,
    comment_id INTEGER,
    comment_text TEXT,
    comment_likes INTEGER,
    comment_timestamp INTEGER,
    comment_date TEXT,
    comment_year INTEGER
);

CREATE INDEX IF NOT EXISTS idx_records_run ON records(run_id);
CREATE INDEX IF NOT EXISTS idx_records_category ON records(run_id, category);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
