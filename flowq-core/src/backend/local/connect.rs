//! Local connection: a validated data-directory path.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{BackendKind, Connect, QueueList};
use crate::error::{Error, Result};

use super::LocalQueueList;

/// Capability token for the local backend. The path is set exactly once by
/// a successful `start_connect` and is immutable afterwards.
pub struct LocalConnect {
    path: Mutex<Option<PathBuf>>,
}

impl LocalConnect {
    pub fn new() -> Self {
        Self {
            path: Mutex::new(None),
        }
    }
}

impl Default for LocalConnect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connect for LocalConnect {
    async fn start_connect(&self, target: &str, _port: u16) -> Result<()> {
        if target.is_empty() {
            return Err(Error::invalid("data directory must not be empty"));
        }
        if self.path.lock().expect("connect lock poisoned").is_some() {
            return Err(Error::invalid("connection is already bound"));
        }

        let path = PathBuf::from(target);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| Error::invalid(format!("{target}: {err}")))?;
        if !metadata.is_dir() {
            return Err(Error::invalid(format!("{target} is not a directory")));
        }

        debug!(path = %path.display(), "local connection bound");
        *self.path.lock().expect("connect lock poisoned") = Some(path);
        Ok(())
    }

    async fn open_queue_list(&self) -> Result<Arc<dyn QueueList>> {
        let path = self
            .target_path()
            .ok_or_else(|| Error::invalid("connection is not bound"))?;
        let list = LocalQueueList::open(path).await?;
        Ok(Arc::new(list))
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    fn target_path(&self) -> Option<PathBuf> {
        self.path.lock().expect("connect lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_connect_requires_existing_directory() {
        let conn = LocalConnect::new();
        assert!(conn
            .start_connect("/definitely/not/a/real/dir", 0)
            .await
            .is_err());
        assert!(conn.target_path().is_none());
    }

    #[tokio::test]
    async fn test_start_connect_binds_once() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().to_str().unwrap();

        let conn = LocalConnect::new();
        conn.start_connect(target, 0).await.unwrap();
        assert_eq!(conn.target_path().unwrap(), dir.path());
        assert_eq!(conn.backend(), BackendKind::Local);

        // Immutable after a successful bind.
        assert!(conn.start_connect(target, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_start_connect_rejects_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        tokio::fs::write(&file, b"x").await.unwrap();

        let conn = LocalConnect::new();
        assert!(conn
            .start_connect(file.to_str().unwrap(), 0)
            .await
            .is_err());
    }
}
