//! Startup integrity check and disaster recovery
//!
//! [`RecoveryManager`] runs once, synchronously, before any read or
//! write traffic reaches the store. It centralizes the "is this data
//! trustworthy" decision as an explicit two-state check-then-branch:
//!
//! 1. **Classify** the primary store as healthy or corrupt. Healthy
//!    means the file decodes through the checksummed container and
//!    passes the structural invariant checks (or the file is absent and
//!    no backups exist - a fresh install). Corrupt covers an unreadable
//!    or checksum-failing file, an invariant violation, and a missing
//!    primary file while backups exist - a store that claims history it
//!    does not hold.
//! 2. **Branch**: a healthy store is opened as-is. A corrupt store is
//!    rebuilt from the newest backup whose checksum verifies, scanning
//!    newest-first and skipping untrustworthy files. If no backup
//!    verifies, the store starts empty and the data loss is reported in
//!    the [`RecoveryReport`] and logged - never silently swallowed.

use crate::error::{ClipVaultError, Result};
use crate::snapshot;
use crate::store::ClipStore;
use crate::types::VaultConfig;
use crate::utils::list_backups;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// How startup recovery concluded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    /// Primary store verified; no recovery needed
    Healthy,
    /// No primary store and no backups; initialized empty
    FreshStore,
    /// Primary store was corrupt; rebuilt from a verified backup
    Restored {
        /// Backup file the store was rebuilt from
        backup: PathBuf,
        /// Number of clips recovered
        clips: usize,
    },
    /// Primary store was corrupt and no backup verified; initialized
    /// empty with data loss
    DataLoss {
        /// Number of backup files that failed verification
        backups_rejected: usize,
    },
}

/// Report produced by startup recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// How recovery concluded
    pub outcome: RecoveryOutcome,
    /// Number of backup files examined
    pub backups_scanned: usize,
    /// Time recovery took in milliseconds
    pub duration_ms: u64,
}

impl RecoveryReport {
    /// Whether user data was lost
    pub fn is_data_loss(&self) -> bool {
        matches!(self.outcome, RecoveryOutcome::DataLoss { .. })
    }

    /// Fail with [`ClipVaultError::DataLossDetected`] if recovery lost data
    ///
    /// The vault itself treats data loss as a degraded start, not a
    /// fatal one; embedders that refuse to run on a lossy store can
    /// turn the report into an error with this.
    pub fn ensure_recovered(&self) -> Result<()> {
        if let RecoveryOutcome::DataLoss { backups_rejected } = &self.outcome {
            return Err(ClipVaultError::DataLossDetected(format!(
                "no verifiable backup ({} rejected), store started empty",
                backups_rejected
            )));
        }
        Ok(())
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        match &self.outcome {
            RecoveryOutcome::Healthy => "primary store healthy".to_string(),
            RecoveryOutcome::FreshStore => "initialized fresh store".to_string(),
            RecoveryOutcome::Restored { backup, clips } => format!(
                "restored {} clips from {:?}",
                clips,
                backup.file_name().unwrap_or_default()
            ),
            RecoveryOutcome::DataLoss { backups_rejected } => format!(
                "data loss: no verifiable backup ({} rejected), store starts empty",
                backups_rejected
            ),
        }
    }
}

/// Verifies the primary store at startup and rehydrates it from the
/// newest trustworthy backup when it is corrupt
///
/// # Examples
///
/// ```rust
/// use clipvault::recovery::RecoveryManager;
/// use clipvault::types::VaultConfig;
/// # use tempfile::TempDir;
///
/// # fn main() -> clipvault::Result<()> {
/// # let dir = TempDir::new().unwrap();
/// let config = VaultConfig::new(
///     dir.path().join("store.cvb"),
///     dir.path().join("backups"),
/// );
/// let (store, report) = RecoveryManager::new(config).recover()?;
/// assert!(!report.is_data_loss());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RecoveryManager {
    config: VaultConfig,
}

impl RecoveryManager {
    /// Create a recovery manager over the configured paths
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    /// Run the startup check and return a ready store plus the report
    ///
    /// Only environmental failures (an unwritable store path) surface
    /// as errors; corruption and even total data loss are handled
    /// outcomes carried in the report.
    pub fn recover(self) -> Result<(ClipStore, RecoveryReport)> {
        let start = Instant::now();
        let backups = list_backups(&self.config.backup_dir)?;
        let backups_scanned = backups.len();

        let primary_exists = self.config.store_path.exists();
        if primary_exists {
            match ClipStore::load(&self.config.store_path, self.config.max_history) {
                Ok(store) => {
                    info!("Primary store verified at {:?}", self.config.store_path);
                    return Ok((
                        store,
                        self.report(RecoveryOutcome::Healthy, backups_scanned, start),
                    ));
                }
                Err(e) => {
                    warn!("Primary store corrupt ({}); attempting recovery", e);
                }
            }
        } else if backups.is_empty() {
            // Nothing on disk at all: a fresh install, not corruption
            let store =
                ClipStore::create_empty(&self.config.store_path, self.config.max_history)?;
            return Ok((
                store,
                self.report(RecoveryOutcome::FreshStore, backups_scanned, start),
            ));
        } else {
            // Backups prove history existed; a missing primary is a loss
            warn!(
                "Primary store missing at {:?} but {} backups exist; attempting recovery",
                self.config.store_path,
                backups.len()
            );
        }

        let mut rejected = 0;
        for backup in &backups {
            match Self::try_backup(backup) {
                Ok(snap) => {
                    let clips = snap.clip_count();
                    let store = ClipStore::from_snapshot(
                        &self.config.store_path,
                        self.config.max_history,
                        snap,
                    )?;
                    info!(
                        "Restored {} clips from backup {:?}",
                        clips,
                        backup.file_name().unwrap_or_default()
                    );
                    return Ok((
                        store,
                        self.report(
                            RecoveryOutcome::Restored {
                                backup: backup.clone(),
                                clips,
                            },
                            backups_scanned,
                            start,
                        ),
                    ));
                }
                Err(e) => {
                    warn!(
                        "Backup {:?} rejected: {}",
                        backup.file_name().unwrap_or_default(),
                        e
                    );
                    rejected += 1;
                }
            }
        }

        // No trustworthy backup: start empty, but say so loudly
        error!(
            "Data loss: primary store corrupt and none of {} backups verified",
            backups.len()
        );
        let store = ClipStore::create_empty(&self.config.store_path, self.config.max_history)?;
        Ok((
            store,
            self.report(
                RecoveryOutcome::DataLoss {
                    backups_rejected: rejected,
                },
                backups_scanned,
                start,
            ),
        ))
    }

    /// Decode and verify one backup file
    fn try_backup(path: &Path) -> Result<snapshot::Snapshot> {
        let bytes = fs::read(path)?;
        let snap = snapshot::decode(&bytes)?;
        snap.validate()?;
        debug!(
            "Backup {:?} verified ({} clips)",
            path.file_name().unwrap_or_default(),
            snap.clip_count()
        );
        Ok(snap)
    }

    fn report(
        &self,
        outcome: RecoveryOutcome,
        backups_scanned: usize,
        start: Instant,
    ) -> RecoveryReport {
        let report = RecoveryReport {
            outcome,
            backups_scanned,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!("Recovery finished: {}", report.summary());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClipContent, ClipList};
    use crate::utils::atomic_write;
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> VaultConfig {
        VaultConfig::new(dir.path().join("store.cvb"), dir.path().join("backups"))
    }

    /// Write a verifiable backup holding a single text clip
    fn write_backup(backup_dir: &Path, name: &str, text: &str) {
        let staging = TempDir::new().unwrap();
        let store = ClipStore::create_empty(staging.path().join("s.cvb"), 500).unwrap();
        store.insert(ClipContent::text(text)).unwrap();
        let bytes = snapshot::encode(&store.snapshot()).unwrap();
        atomic_write(&backup_dir.join(name), &bytes).unwrap();
    }

    fn first_text(store: &ClipStore) -> String {
        store.query(ClipList::History, 0, 1, None).clips[0]
            .payload
            .as_text()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_fresh_install() {
        let dir = TempDir::new().unwrap();
        let (store, report) = RecoveryManager::new(config(&dir)).recover().unwrap();
        assert_eq!(report.outcome, RecoveryOutcome::FreshStore);
        assert_eq!(store.history_len(), 0);
        // The empty store was committed
        assert!(dir.path().join("store.cvb").exists());
    }

    #[test]
    fn test_healthy_store_untouched() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        {
            let store = ClipStore::create_empty(&cfg.store_path, 500).unwrap();
            store.insert(ClipContent::text("kept")).unwrap();
        }

        let (store, report) = RecoveryManager::new(cfg).recover().unwrap();
        assert_eq!(report.outcome, RecoveryOutcome::Healthy);
        report.ensure_recovered().unwrap();
        assert_eq!(first_text(&store), "kept");
    }

    #[test]
    fn test_corrupt_primary_restores_newest_backup() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        std::fs::write(&cfg.store_path, b"not a snapshot container").unwrap();

        write_backup(&cfg.backup_dir, "clip_backup_20260101_000000000.cvb", "oldest");
        write_backup(&cfg.backup_dir, "clip_backup_20260201_000000000.cvb", "middle");
        write_backup(&cfg.backup_dir, "clip_backup_20260301_000000000.cvb", "newest");

        let (store, report) = RecoveryManager::new(cfg).recover().unwrap();
        match &report.outcome {
            RecoveryOutcome::Restored { backup, clips } => {
                assert!(backup.ends_with("clip_backup_20260301_000000000.cvb"));
                assert_eq!(*clips, 1);
            }
            other => panic!("expected Restored, got {:?}", other),
        }
        assert_eq!(first_text(&store), "newest");
    }

    #[test]
    fn test_checksum_broken_newest_falls_back() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        std::fs::write(&cfg.store_path, b"garbage").unwrap();

        write_backup(&cfg.backup_dir, "clip_backup_20260101_000000000.cvb", "older");
        write_backup(&cfg.backup_dir, "clip_backup_20260201_000000000.cvb", "newest");

        // Flip a payload byte in the newest backup
        let newest = cfg.backup_dir.join("clip_backup_20260201_000000000.cvb");
        let mut bytes = std::fs::read(&newest).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&newest, bytes).unwrap();

        let (store, report) = RecoveryManager::new(cfg).recover().unwrap();
        match &report.outcome {
            RecoveryOutcome::Restored { backup, .. } => {
                assert!(backup.ends_with("clip_backup_20260101_000000000.cvb"));
            }
            other => panic!("expected Restored, got {:?}", other),
        }
        assert_eq!(first_text(&store), "older");
    }

    #[test]
    fn test_no_valid_backup_is_reported_data_loss() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        std::fs::write(&cfg.store_path, b"garbage").unwrap();
        std::fs::create_dir_all(&cfg.backup_dir).unwrap();
        std::fs::write(
            cfg.backup_dir.join("clip_backup_20260101_000000000.cvb"),
            b"also garbage",
        )
        .unwrap();

        let (store, report) = RecoveryManager::new(cfg).recover().unwrap();
        assert_eq!(
            report.outcome,
            RecoveryOutcome::DataLoss {
                backups_rejected: 1
            }
        );
        assert!(report.is_data_loss());
        assert!(matches!(
            report.ensure_recovered(),
            Err(crate::error::ClipVaultError::DataLossDetected(_))
        ));
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_missing_primary_with_backups_recovers() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir);
        write_backup(&cfg.backup_dir, "clip_backup_20260101_000000000.cvb", "saved");

        let (store, report) = RecoveryManager::new(cfg).recover().unwrap();
        assert!(matches!(report.outcome, RecoveryOutcome::Restored { .. }));
        assert_eq!(first_text(&store), "saved");
    }
}
