//! Debounced snapshot backups with rotation
//!
//! [`BackupEngine`] mirrors the store to rotated, checksummed snapshot
//! files in a backup directory. It runs as a background tokio task and
//! holds only a read capability on the store (an `Arc<ClipStore>` it
//! never mutates), so a slow disk on the backup path cannot add latency
//! to store operations.
//!
//! ## Debouncing
//!
//! The engine sits `Idle` until the store signals a mutation, which arms
//! a debounce timer (default 30s). Further mutations inside the window
//! reset the timer instead of stacking writes, so a burst of clipboard
//! activity coalesces into one snapshot. The timer firing - or an
//! explicit [`BackupEngine::flush`], typically on graceful shutdown -
//! writes the snapshot and returns the engine to `Idle`.
//!
//! Writes are gated on the store's mutation generation: a flush when
//! nothing changed since the last good backup writes no file.
//!
//! ## Rotation and failure
//!
//! After each successful write the engine keeps only the newest
//! `max_backups` files, deleting older ones oldest-first. A failed write
//! (disk full, permissions) is logged and retried on the next debounce
//! cycle; it never crashes the process and never blocks the store.

use crate::error::Result;
use crate::snapshot;
use crate::store::ClipStore;
use crate::utils::{atomic_write, list_backups, unique_backup_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

enum Command {
    Flush(oneshot::Sender<Result<Option<PathBuf>>>),
    Shutdown,
}

/// Handle to the background backup task
///
/// Dropping the handle without calling [`BackupEngine::shutdown`] stops
/// the task without a final flush.
pub struct BackupEngine {
    tx: mpsc::UnboundedSender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BackupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupEngine")
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl BackupEngine {
    /// Spawn the backup task
    ///
    /// Must be called within a tokio runtime. The task watches `store`
    /// for mutation signals and writes snapshots into `backup_dir`.
    pub fn spawn(
        store: Arc<ClipStore>,
        backup_dir: PathBuf,
        max_backups: usize,
        debounce: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, backup_dir, max_backups, debounce, rx));
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Write a backup now if the store changed since the last one
    ///
    /// Cancels any armed debounce timer. Returns the path of the written
    /// file, or `None` when the store was unchanged.
    pub async fn flush(&self) -> Result<Option<PathBuf>> {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_err() {
            return Ok(None);
        }
        ack_rx
            .await
            .unwrap_or_else(|_| Ok(None))
    }

    /// Flush pending changes and stop the backup task
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run(
    store: Arc<ClipStore>,
    backup_dir: PathBuf,
    max_backups: usize,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    // Generation covered by the last successful backup
    let mut backed_up = store.generation();
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = store.change_notified() => {
                // Repeated mutations reset the timer rather than stacking writes
                deadline = Some(Instant::now() + debounce);
            }
            _ = async { sleep_until(deadline.unwrap()).await }, if deadline.is_some() => {
                match write_if_changed(&store, &backup_dir, max_backups, &mut backed_up) {
                    Ok(_) => deadline = None,
                    Err(e) => {
                        // Retry on the next cycle; store operations are unaffected
                        warn!("Backup write failed, will retry: {}", e);
                        deadline = Some(Instant::now() + debounce);
                    }
                }
            }
            cmd = rx.recv() => match cmd {
                Some(Command::Flush(ack)) => {
                    let result = write_if_changed(&store, &backup_dir, max_backups, &mut backed_up);
                    if result.is_ok() {
                        deadline = None;
                    }
                    let _ = ack.send(result);
                }
                Some(Command::Shutdown) | None => {
                    if let Err(e) =
                        write_if_changed(&store, &backup_dir, max_backups, &mut backed_up)
                    {
                        warn!("Final backup on shutdown failed: {}", e);
                    }
                    debug!("Backup engine stopped");
                    break;
                }
            }
        }
    }
}

/// Write a snapshot unless the store is unchanged since `backed_up`
fn write_if_changed(
    store: &ClipStore,
    backup_dir: &Path,
    max_backups: usize,
    backed_up: &mut u64,
) -> Result<Option<PathBuf>> {
    let generation = store.generation();
    if generation == *backed_up {
        return Ok(None);
    }

    let snap = store.snapshot();
    let bytes = snapshot::encode(&snap)?;
    let path = unique_backup_path(backup_dir, snap.created_at);
    atomic_write(&path, &bytes)?;
    info!(
        "Wrote backup {:?} ({} clips, {} bytes)",
        path.file_name().unwrap_or_default(),
        snap.clip_count(),
        bytes.len()
    );

    *backed_up = generation;
    rotate(backup_dir, max_backups);
    Ok(Some(path))
}

/// Keep only the newest `max_backups` files
fn rotate(backup_dir: &Path, max_backups: usize) {
    let backups = match list_backups(backup_dir) {
        Ok(backups) => backups,
        Err(e) => {
            warn!("Backup rotation listing failed: {}", e);
            return;
        }
    };
    for old in backups.iter().skip(max_backups) {
        match std::fs::remove_file(old) {
            Ok(()) => debug!("Rotated out old backup {:?}", old.file_name().unwrap_or_default()),
            Err(e) => warn!("Failed to remove old backup {:?}: {}", old, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClipContent;
    use tempfile::TempDir;
    use tokio::time::sleep;

    fn open_store(dir: &TempDir) -> Arc<ClipStore> {
        Arc::new(ClipStore::create_empty(dir.path().join("store.cvb"), 500).unwrap())
    }

    #[tokio::test]
    async fn test_debounce_coalesces_mutations() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let backup_dir = dir.path().join("backups");
        let engine = BackupEngine::spawn(
            store.clone(),
            backup_dir.clone(),
            10,
            Duration::from_millis(100),
        );

        for i in 0..3 {
            store.insert(ClipContent::text(format!("clip {}", i))).unwrap();
            sleep(Duration::from_millis(25)).await;
        }
        // Still inside the (repeatedly reset) debounce window
        assert!(list_backups(&backup_dir).unwrap().is_empty());

        sleep(Duration::from_millis(300)).await;
        assert_eq!(list_backups(&backup_dir).unwrap().len(), 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_writes_immediately() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let backup_dir = dir.path().join("backups");
        let engine = BackupEngine::spawn(
            store.clone(),
            backup_dir.clone(),
            10,
            Duration::from_secs(60),
        );

        store.insert(ClipContent::text("x")).unwrap();
        let written = engine.flush().await.unwrap();
        assert!(written.is_some());
        assert_eq!(list_backups(&backup_dir).unwrap().len(), 1);

        // The written file must decode and carry the state
        let bytes = std::fs::read(written.unwrap()).unwrap();
        let snap = snapshot::decode(&bytes).unwrap();
        assert_eq!(snap.clip_count(), 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_flush_skips_when_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let backup_dir = dir.path().join("backups");
        let engine = BackupEngine::spawn(
            store.clone(),
            backup_dir.clone(),
            10,
            Duration::from_secs(60),
        );

        store.insert(ClipContent::text("x")).unwrap();
        assert!(engine.flush().await.unwrap().is_some());
        // Nothing changed since
        assert!(engine.flush().await.unwrap().is_none());
        assert_eq!(list_backups(&backup_dir).unwrap().len(), 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_rotation_keeps_newest_n() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let backup_dir = dir.path().join("backups");
        let engine = BackupEngine::spawn(
            store.clone(),
            backup_dir.clone(),
            3,
            Duration::from_secs(60),
        );

        let mut written = Vec::new();
        for i in 0..5 {
            store.insert(ClipContent::text(format!("clip {}", i))).unwrap();
            written.push(engine.flush().await.unwrap().unwrap());
            // Keep file-name timestamps distinct
            sleep(Duration::from_millis(5)).await;
        }

        let remaining = list_backups(&backup_dir).unwrap();
        assert_eq!(remaining.len(), 3);
        // The three most recent, newest first
        let expected: Vec<_> = written.iter().rev().take(3).cloned().collect();
        assert_eq!(remaining, expected);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_rapid_flushes_never_share_a_file() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let backup_dir = dir.path().join("backups");
        let engine = BackupEngine::spawn(
            store.clone(),
            backup_dir.clone(),
            10,
            Duration::from_secs(60),
        );

        // No pacing: several flushes can land in the same millisecond
        let mut written = Vec::new();
        for i in 0..4 {
            store.insert(ClipContent::text(format!("clip {}", i))).unwrap();
            written.push(engine.flush().await.unwrap().unwrap());
        }

        let mut distinct = written.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
        assert_eq!(list_backups(&backup_dir).unwrap().len(), 4);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_pending() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let backup_dir = dir.path().join("backups");
        let engine = BackupEngine::spawn(
            store.clone(),
            backup_dir.clone(),
            10,
            Duration::from_secs(60),
        );

        store.insert(ClipContent::text("pending")).unwrap();
        engine.shutdown().await;
        assert_eq!(list_backups(&backup_dir).unwrap().len(), 1);
    }
}
