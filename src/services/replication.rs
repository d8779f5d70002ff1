//! Best-effort propagation of object writes to replica namespaces.
//!
//! Uploads are acknowledged on primary durability alone; replication runs
//! behind a bounded queue drained by one worker task. There is no retry or
//! acknowledgment: a job dropped on a full queue or failed at a replica is
//! logged and lost. Jobs in flight at process shutdown may be abandoned.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::mpsc};
use tracing::{debug, warn};

/// Upper bound on queued replication jobs.
const QUEUE_DEPTH: usize = 64;

#[derive(Debug)]
struct ReplicationJob {
    bucket: String,
    filename: String,
    payload: Bytes,
}

/// Asynchronous fan-out of sealed object bytes to every replica namespace.
#[derive(Clone)]
pub struct ReplicationEngine {
    tx: mpsc::Sender<ReplicationJob>,
}

impl ReplicationEngine {
    /// Spawn the worker task and return a handle for scheduling jobs.
    pub fn start(root: PathBuf, replicas: Vec<String>) -> Self {
        let (tx, mut rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                mirror_object(&root, &replicas, &job).await;
            }
            debug!("replication worker stopped");
        });
        Self { tx }
    }

    /// Queue the sealed bytes of one object for replication. Non-blocking;
    /// if the queue is full the job is dropped with a warning.
    pub fn schedule(&self, bucket: &str, filename: &str, payload: Bytes) {
        let job = ReplicationJob {
            bucket: bucket.to_string(),
            filename: filename.to_string(),
            payload,
        };
        if self.tx.try_send(job).is_err() {
            warn!(
                "replication queue full, dropping job for {}/{}",
                bucket, filename
            );
        }
    }
}

/// Write one object into every replica that has the bucket namespace.
/// Each replica is attempted independently; failures never propagate.
async fn mirror_object(root: &Path, replicas: &[String], job: &ReplicationJob) {
    for replica in replicas {
        let bucket_dir = root.join(replica).join(&job.bucket);
        if !fs::try_exists(&bucket_dir).await.unwrap_or(false) {
            warn!(
                "replica bucket {}/{} does not exist, skipping",
                replica, job.bucket
            );
            continue;
        }

        let target = bucket_dir.join(&job.filename);
        match fs::write(&target, &job.payload).await {
            Ok(()) => debug!("replicated {}/{} to {}", job.bucket, job.filename, replica),
            Err(err) => warn!(
                "failed to replicate {}/{} to {}: {}",
                job.bucket, job.filename, replica, err
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn mirrors_to_existing_replicas_and_skips_missing() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("replica1/docs")).unwrap();
        // replica2/docs deliberately absent

        let job = ReplicationJob {
            bucket: "docs".into(),
            filename: "a.txt".into(),
            payload: Bytes::from_static(b"sealed bytes"),
        };
        let replicas = vec!["replica1".to_string(), "replica2".to_string()];
        mirror_object(dir.path(), &replicas, &job).await;

        let copied = std::fs::read(dir.path().join("replica1/docs/a.txt")).unwrap();
        assert_eq!(copied, b"sealed bytes");
        assert!(!dir.path().join("replica2/docs/a.txt").exists());
    }

    #[tokio::test]
    async fn overwrites_existing_replica_copy() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("replica1/docs")).unwrap();
        std::fs::write(dir.path().join("replica1/docs/a.txt"), b"old").unwrap();

        let job = ReplicationJob {
            bucket: "docs".into(),
            filename: "a.txt".into(),
            payload: Bytes::from_static(b"new"),
        };
        mirror_object(dir.path(), &["replica1".to_string()], &job).await;

        let copied = std::fs::read(dir.path().join("replica1/docs/a.txt")).unwrap();
        assert_eq!(copied, b"new");
    }

    #[tokio::test]
    async fn scheduled_jobs_reach_replicas() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("replica1/docs")).unwrap();

        let engine = ReplicationEngine::start(
            dir.path().to_path_buf(),
            vec!["replica1".to_string()],
        );
        engine.schedule("docs", "a.txt", Bytes::from_static(b"queued"));

        let target = dir.path().join("replica1/docs/a.txt");
        for _ in 0..100 {
            if target.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read(&target).unwrap(), b"queued");
    }
}
