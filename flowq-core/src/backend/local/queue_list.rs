//! Local queue-list: discovery and lifecycle of the queues in a data
//! directory.
//!
//! Init scans the directory for regular `.db` files; everything else is
//! skipped with a warning. The map is sorted so `list_queue` output is
//! stable across runs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::{BackendKind, Queue, QueueList};
use crate::config::STORE_EXTENSION;
use crate::error::{Error, Result};

use super::LocalQueue;

/// Owner of every local queue behind one data directory.
pub struct LocalQueueList {
    dir: PathBuf,
    queues: Mutex<BTreeMap<String, Arc<LocalQueue>>>,
}

impl LocalQueueList {
    /// Scan `dir` and open a queue per backing-store file found.
    pub async fn open(dir: PathBuf) -> Result<Self> {
        let mut queues = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if !file_type.is_file() {
                warn!(path = %path.display(), "ignoring non-regular entry in data directory");
                continue;
            }

            let extension = path.extension().and_then(|ext| ext.to_str());
            if extension != Some(STORE_EXTENSION) {
                warn!(path = %path.display(), "ignoring file without store extension");
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "ignoring store file with unusable name");
                continue;
            };

            let queue = LocalQueue::open(&dir, name).await?;
            queues.insert(name.to_string(), queue);
        }

        info!(dir = %dir.display(), count = queues.len(), "queue list initialised");
        Ok(Self {
            dir,
            queues: Mutex::new(queues),
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid("queue name must not be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(Error::invalid("queue name must not contain path separators"));
    }
    Ok(())
}

#[async_trait]
impl QueueList for LocalQueueList {
    async fn create_queue(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let mut queues = self.queues.lock().await;
        if queues.contains_key(name) {
            return Err(Error::AlreadyExists(format!("queue {name} already exists")));
        }

        let queue = LocalQueue::open(&self.dir, name).await?;
        queues.insert(name.to_string(), queue);
        info!(queue = name, "queue created");
        Ok(())
    }

    async fn list_queue(&self) -> Result<Vec<String>> {
        Ok(self.queues.lock().await.keys().cloned().collect())
    }

    async fn delete_queue(&self, name: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.remove(name) else {
            return Err(Error::not_found(format!("no queue named {name}")));
        };
        drop(queues);

        let path = queue.store_file().await;
        queue.shutdown().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        info!(queue = name, "queue deleted");
        Ok(())
    }

    async fn rename_queue(&self, old_name: &str, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let mut queues = self.queues.lock().await;
        if queues.contains_key(new_name) {
            return Err(Error::AlreadyExists(format!(
                "queue {new_name} already exists"
            )));
        }
        let Some(queue) = queues.get(old_name).cloned() else {
            return Err(Error::not_found(format!("no queue named {old_name}")));
        };

        queue.rename(new_name).await?;
        queues.remove(old_name);
        queues.insert(new_name.to_string(), queue);
        info!(old = old_name, new = new_name, "queue renamed");
        Ok(())
    }

    async fn get_queue(&self, name: &str) -> Result<Arc<dyn Queue>> {
        let queues = self.queues.lock().await;
        queues
            .get(name)
            .cloned()
            .map(|queue| queue as Arc<dyn Queue>)
            .ok_or_else(|| Error::not_found(format!("no queue named {name}")))
    }

    async fn return_queue(&self, queue: Arc<dyn Queue>) {
        // The list keeps ownership; dropping the reference is enough.
        debug!(queue = %queue.name(), "queue reference returned");
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::store_path;

    async fn open_list(dir: &std::path::Path) -> LocalQueueList {
        LocalQueueList::open(dir.to_path_buf()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_list_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let list = open_list(dir.path()).await;

        list.create_queue("q1").await.unwrap();
        assert_eq!(list.list_queue().await.unwrap(), vec!["q1".to_string()]);
        assert!(store_path(dir.path(), "q1").exists());

        list.delete_queue("q1").await.unwrap();
        assert!(list.list_queue().await.unwrap().is_empty());
        assert!(!store_path(dir.path(), "q1").exists());

        // Deleting again reports not-found.
        assert!(matches!(
            list.delete_queue("q1").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_bad_names() {
        let dir = tempfile::tempdir().unwrap();
        let list = open_list(dir.path()).await;

        list.create_queue("jobs").await.unwrap();
        assert!(matches!(
            list.create_queue("jobs").await,
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            list.create_queue("").await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            list.create_queue("a/b").await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_init_discovers_existing_stores_and_skips_noise() {
        let dir = tempfile::tempdir().unwrap();
        {
            let list = open_list(dir.path()).await;
            list.create_queue("alpha").await.unwrap();
            list.create_queue("beta").await.unwrap();
        }
        tokio::fs::create_dir(dir.path().join("subdir")).await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();

        let list = open_list(dir.path()).await;
        assert_eq!(
            list.list_queue().await.unwrap(),
            vec!["alpha".to_string(), "beta".to_string()]
        );
    }

    #[tokio::test]
    async fn test_rename_updates_map_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let list = open_list(dir.path()).await;
        list.create_queue("old").await.unwrap();

        list.rename_queue("old", "new").await.unwrap();
        assert_eq!(list.list_queue().await.unwrap(), vec!["new".to_string()]);
        assert!(!store_path(dir.path(), "old").exists());
        assert!(store_path(dir.path(), "new").exists());

        let queue = list.get_queue("new").await.unwrap();
        assert_eq!(queue.name(), "new");
        assert!(matches!(
            list.get_queue("old").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_refuses_taken_target() {
        let dir = tempfile::tempdir().unwrap();
        let list = open_list(dir.path()).await;
        list.create_queue("a").await.unwrap();
        list.create_queue("b").await.unwrap();
        assert!(matches!(
            list.rename_queue("a", "b").await,
            Err(Error::AlreadyExists(_))
        ));
    }
}
