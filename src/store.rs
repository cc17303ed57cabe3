//! Prediction Log Store - shared handle over the history database
//!
//! A single connection behind a mutex: appends and clears are serialized, so
//! identifiers never collide and a concurrent clear/append always lands in
//! one of the two orderings. Queries run on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{LogEntry, NewLogEntry};

/// Default `recent()` limit used by `GET /history`
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct LogStore {
    conn: Arc<Mutex<Connection>>,
}

impl LogStore {
    /// Open the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = db::open(path)?;
        db::run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = db::open_in_memory()?;
        db::run_migrations(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AppResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Storage task failed: {}", e)))?
    }

    /// Append one entry, returning its id
    pub async fn append(&self, entry: NewLogEntry) -> AppResult<i64> {
        let ids = self.append_batch(vec![entry]).await?;
        ids.into_iter()
            .next()
            .ok_or_else(|| AppError::Storage("Insert returned no id".to_string()))
    }

    /// Append all entries atomically: either every row is stored or none is
    pub async fn append_batch(&self, entries: Vec<NewLogEntry>) -> AppResult<Vec<i64>> {
        self.with_conn(move |conn| Ok(LogEntry::insert_batch(conn, &entries)?))
            .await
    }

    /// Up to `limit` entries, newest first
    pub async fn recent(&self, limit: usize) -> AppResult<Vec<LogEntry>> {
        self.with_conn(move |conn| Ok(LogEntry::recent(conn, limit)?))
            .await
    }

    /// Remove every entry; succeeds on an empty store
    pub async fn clear(&self) -> AppResult<usize> {
        self.with_conn(|conn| Ok(LogEntry::clear(conn)?)).await
    }

    pub async fn count(&self) -> AppResult<i64> {
        self.with_conn(|conn| Ok(LogEntry::count(conn)?)).await
    }
}

#[cfg(test)]
impl LogStore {
    /// Direct access to the connection, for fault injection in tests
    pub(crate) fn connection(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassLabel, ClassScore};
    use crate::features::extract_rows;
    use crate::models::PredictionResult;
    use crate::test_support::sample_row;

    fn entry() -> NewLogEntry {
        let score = ClassScore {
            label: ClassLabel::Code(0),
            probabilities: [0.8, 0.1, 0.1],
        };
        let input = extract_rows(&[sample_row()]).unwrap().remove(0);
        NewLogEntry::now(PredictionResult::from_score(&score), input)
    }

    #[tokio::test]
    async fn test_append_recent_clear() {
        let store = LogStore::open_in_memory().unwrap();
        assert!(store.recent(DEFAULT_HISTORY_LIMIT).await.unwrap().is_empty());

        let id = store.append(entry()).await.unwrap();
        let recent = store.recent(DEFAULT_HISTORY_LIMIT).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, id);

        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.clear().await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_appends_get_distinct_ids() {
        let store = LogStore::open_in_memory().unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append_batch(vec![entry(), entry()]).await.unwrap()
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.extend(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
        assert_eq!(store.count().await.unwrap(), 32);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_clear_during_appends_leaves_whole_batches() {
        let store = LogStore::open_in_memory().unwrap();

        let mut handles = Vec::new();
        for i in 0..24 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                if i % 6 == 0 {
                    store.clear().await.map(|_| ())
                } else {
                    store.append_batch(vec![entry(), entry(), entry()]).await.map(|_| ())
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let count = store.count().await.unwrap();
        assert_eq!(count % 3, 0, "partial batch left behind: {} rows", count);
        assert!(count <= 60);
    }

    #[tokio::test]
    async fn test_failed_batch_is_rolled_back() {
        let store = LogStore::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_third_row BEFORE INSERT ON predictions
                 WHEN (SELECT COUNT(*) FROM predictions) >= 2
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )
            .unwrap();

        let err = store.append_batch(vec![entry(), entry(), entry()]).await.unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(store.count().await.unwrap(), 0);

        assert_eq!(store.append_batch(vec![entry(), entry()]).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prediction_history.db");

        {
            let store = LogStore::open(&path).unwrap();
            store.append(entry()).await.unwrap();
        }

        let store = LogStore::open(&path).unwrap();
        assert_eq!(store.recent(10).await.unwrap().len(), 1);
    }
}
