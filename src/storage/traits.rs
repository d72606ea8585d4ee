//! Record sink trait and storage error types

use crate::model::Record;
use crate::storage::RunStatus;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row in records table: {0}")]
    CorruptRow(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Destination for harvested records
///
/// The campaign hands records over once per category. Implementations must
/// write a category atomically: either every record of the batch is
/// persisted or none is.
pub trait RecordSink {
    /// Registers a new run and returns its id
    fn begin_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Persists all records of one category, returning how many were written
    fn write_category(
        &mut self,
        run_id: i64,
        category: &str,
        records: &[Record],
    ) -> StorageResult<usize>;

    /// Records the final status of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;
}
