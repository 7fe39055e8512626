//! Durable per-queue task store.
//!
//! One SQLite file per queue, named `<queue>.db` inside the connection's
//! data directory, holding a `pending` and a `finished` table plus a
//! single-row ID watermark. Schema creation is idempotent on open, and
//! every queue keeps a single connection for its whole lifetime.
//!
//! The watermark records the largest ID ever issued and is bumped in the
//! same transaction as each enqueue, so clearing rows never makes an old
//! ID reusable — not even across a process restart.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, Row, SqliteConnection};
use tracing::debug;

use crate::config::STORE_EXTENSION;
use crate::error::{Error, Result};
use crate::task::Task;

/// Backing-store file path for a queue name inside `dir`.
pub fn store_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{STORE_EXTENSION}"))
}

/// A queue's durable table pair plus its open connection.
pub struct TaskStore {
    conn: SqliteConnection,
    dir: PathBuf,
    path: PathBuf,
    name: String,
}

impl TaskStore {
    /// Open (or create) the store for `name` under `dir` and make sure the
    /// schema exists.
    pub async fn open(dir: &Path, name: &str) -> Result<Self> {
        let path = store_path(dir, name);
        let mut conn = connect(&path).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS pending (
                 id INTEGER PRIMARY KEY,
                 exec_name TEXT NOT NULL,
                 args TEXT NOT NULL,
                 work_dir TEXT NOT NULL
             )",
        )
        .execute(&mut conn)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS finished (
                 id INTEGER PRIMARY KEY,
                 exec_name TEXT NOT NULL,
                 args TEXT NOT NULL,
                 work_dir TEXT NOT NULL,
                 exit_code INTEGER NOT NULL,
                 is_success INTEGER NOT NULL
             )",
        )
        .execute(&mut conn)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS id_watermark (
                 id INTEGER PRIMARY KEY CHECK (id = 0),
                 last_id INTEGER NOT NULL
             )",
        )
        .execute(&mut conn)
        .await?;
        // Seed the watermark from whatever rows exist, for stores written
        // before the watermark table was introduced.
        sqlx::query(
            "INSERT OR IGNORE INTO id_watermark (id, last_id)
             VALUES (0, COALESCE((SELECT MAX(id) FROM (
                 SELECT id FROM pending UNION ALL SELECT id FROM finished
             )), 0))",
        )
        .execute(&mut conn)
        .await?;

        debug!(queue = name, path = %path.display(), "store opened");
        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
            path,
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Largest task ID ever issued by this queue, or 0 when none was.
    /// Independent of which rows still exist, so it never moves backwards
    /// when pending or finished rows are cleared. Seeds the queue's
    /// monotonic ID counter.
    pub async fn last_issued_id(&mut self) -> Result<i32> {
        let last: i32 = sqlx::query_scalar("SELECT last_id FROM id_watermark WHERE id = 0")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(last)
    }

    /// Insert a pending row and raise the ID watermark in one transaction.
    pub async fn insert_pending(&mut self, task: &Task) -> Result<()> {
        let args = task.encode_args()?;
        let mut tx = self.conn.begin().await?;
        sqlx::query(
            "INSERT INTO pending (id, exec_name, args, work_dir) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(task.id)
        .bind(&task.exec_name)
        .bind(args)
        .bind(&task.work_dir)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE id_watermark SET last_id = MAX(last_id, ?1) WHERE id = 0")
            .bind(task.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete a pending row; false when the ID was not present.
    pub async fn remove_pending(&mut self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pending WHERE id = ?1")
            .bind(id)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pending IDs in insertion order.
    pub async fn list_pending(&mut self) -> Result<Vec<i32>> {
        let rows = sqlx::query("SELECT id FROM pending ORDER BY id")
            .fetch_all(&mut self.conn)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<i32, _>(0).map_err(Error::from))
            .collect()
    }

    pub async fn pending_details(&mut self, id: i32) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT id, exec_name, args, work_dir FROM pending WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut self.conn)
            .await?;
        match row {
            Some(row) => Ok(Some(Task {
                id: row.try_get(0)?,
                exec_name: row.try_get(1)?,
                args: Task::decode_args(row.try_get::<String, _>(2)?.as_str())?,
                work_dir: row.try_get(3)?,
                exit_code: 0,
                is_success: false,
            })),
            None => Ok(None),
        }
    }

    pub async fn insert_finished(&mut self, task: &Task) -> Result<()> {
        sqlx::query(
            "INSERT INTO finished (id, exec_name, args, work_dir, exit_code, is_success)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(task.id)
        .bind(&task.exec_name)
        .bind(task.encode_args()?)
        .bind(&task.work_dir)
        .bind(task.exit_code)
        .bind(task.is_success)
        .execute(&mut self.conn)
        .await?;
        Ok(())
    }

    /// Finished IDs in the order the tasks completed.
    pub async fn list_finished(&mut self) -> Result<Vec<i32>> {
        let rows = sqlx::query("SELECT id FROM finished ORDER BY rowid")
            .fetch_all(&mut self.conn)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<i32, _>(0).map_err(Error::from))
            .collect()
    }

    pub async fn finished_details(&mut self, id: i32) -> Result<Option<Task>> {
        let row = sqlx::query(
            "SELECT id, exec_name, args, work_dir, exit_code, is_success
             FROM finished WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut self.conn)
        .await?;
        match row {
            Some(row) => Ok(Some(Task {
                id: row.try_get(0)?,
                exec_name: row.try_get(1)?,
                args: Task::decode_args(row.try_get::<String, _>(2)?.as_str())?,
                work_dir: row.try_get(3)?,
                exit_code: row.try_get(4)?,
                is_success: row.try_get(5)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn clear_pending(&mut self) -> Result<()> {
        sqlx::query("DELETE FROM pending")
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    /// Clear pending rows while keeping the row of the running task, whose
    /// backing row stays in `pending` until it finishes.
    pub async fn clear_pending_except(&mut self, keep: Option<i32>) -> Result<()> {
        match keep {
            Some(id) => {
                sqlx::query("DELETE FROM pending WHERE id != ?1")
                    .bind(id)
                    .execute(&mut self.conn)
                    .await?;
                Ok(())
            }
            None => self.clear_pending().await,
        }
    }

    pub async fn clear_finished(&mut self) -> Result<()> {
        sqlx::query("DELETE FROM finished")
            .execute(&mut self.conn)
            .await?;
        Ok(())
    }

    /// Rename the backing file and reopen the connection on the new path.
    ///
    /// The old connection keeps the moved file alive during the switch, so a
    /// failed reopen can move the file back without losing anything.
    pub async fn rename(&mut self, new_name: &str) -> Result<()> {
        let new_path = store_path(&self.dir, new_name);
        if new_path.exists() {
            return Err(Error::AlreadyExists(format!(
                "store {} already exists",
                new_path.display()
            )));
        }

        tokio::fs::rename(&self.path, &new_path).await?;
        let conn = match connect(&new_path).await {
            Ok(conn) => conn,
            Err(err) => {
                let _ = tokio::fs::rename(&new_path, &self.path).await;
                return Err(err);
            }
        };

        let old = std::mem::replace(&mut self.conn, conn);
        let _ = old.close().await;
        self.path = new_path;
        self.name = new_name.to_string();
        Ok(())
    }
}

async fn connect(path: &Path) -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    Ok(SqliteConnection::connect_with(&options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(id: i32) -> Task {
        let mut task = Task::new("/bin/echo", vec!["hello".into(), "".into()], "/tmp");
        task.id = id;
        task
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
            store.insert_pending(&sample_task(1)).await.unwrap();
        }
        // Reopening the same file must not disturb existing rows.
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
        assert_eq!(store.list_pending().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_pending_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();

        let task = sample_task(7);
        store.insert_pending(&task).await.unwrap();

        let details = store.pending_details(7).await.unwrap().unwrap();
        assert_eq!(details, task);
        assert!(store.pending_details(8).await.unwrap().is_none());

        assert!(store.remove_pending(7).await.unwrap());
        assert!(!store.remove_pending(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_finished_keeps_exit_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();

        let mut task = sample_task(3);
        task.exit_code = 137;
        task.is_success = false;
        store.insert_finished(&task).await.unwrap();

        let details = store.finished_details(3).await.unwrap().unwrap();
        assert_eq!(details.exit_code, 137);
        assert!(!details.is_success);
        assert_eq!(store.list_finished().await.unwrap(), vec![3]);
    }

    #[tokio::test]
    async fn test_last_issued_id_never_drops() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
        assert_eq!(store.last_issued_id().await.unwrap(), 0);

        store.insert_pending(&sample_task(2)).await.unwrap();
        store.insert_pending(&sample_task(9)).await.unwrap();
        assert_eq!(store.last_issued_id().await.unwrap(), 9);

        // Deleting rows never moves the watermark backwards.
        assert!(store.remove_pending(9).await.unwrap());
        assert_eq!(store.last_issued_id().await.unwrap(), 9);
        store.clear_pending().await.unwrap();
        store.clear_finished().await.unwrap();
        assert_eq!(store.last_issued_id().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_last_issued_id_survives_restart_after_clear() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
            // A task's whole lifecycle: enqueued, finished, then purged.
            store.insert_pending(&sample_task(5)).await.unwrap();
            assert!(store.remove_pending(5).await.unwrap());
            store.insert_finished(&sample_task(5)).await.unwrap();
            store.clear_finished().await.unwrap();
        }

        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
        assert_eq!(store.last_issued_id().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_watermark_seeds_from_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
            store.insert_pending(&sample_task(3)).await.unwrap();
        }
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
        assert_eq!(store.last_issued_id().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_clear_pending_and_finished_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
        store.insert_pending(&sample_task(1)).await.unwrap();
        store.insert_finished(&sample_task(2)).await.unwrap();

        store.clear_pending().await.unwrap();
        assert!(store.list_pending().await.unwrap().is_empty());
        assert_eq!(store.list_finished().await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_rename_moves_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::open(dir.path(), "old").await.unwrap();
        store.insert_pending(&sample_task(1)).await.unwrap();

        store.rename("new").await.unwrap();
        assert_eq!(store.name(), "new");
        assert!(store_path(dir.path(), "new").exists());
        assert!(!store_path(dir.path(), "old").exists());
        assert_eq!(store.list_pending().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_rename_refuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        let _other = TaskStore::open(dir.path(), "taken").await.unwrap();
        let mut store = TaskStore::open(dir.path(), "q").await.unwrap();
        assert!(matches!(
            store.rename("taken").await,
            Err(Error::AlreadyExists(_))
        ));
    }
}
