//! Main clipvault entry point
//!
//! [`ClipVault`] wires the subsystems together with explicit ownership:
//! recovery runs first and produces the store, the backup engine is
//! spawned over a shared read handle to it, and everything is reachable
//! from the one `ClipVault` value - there is no ambient singleton.
//!
//! ## Startup sequence
//!
//! 1. [`crate::recovery::RecoveryManager`] classifies the primary store
//!    and, when corrupt, rehydrates it from the newest verifiable
//!    backup. This completes before `open` returns, so no traffic ever
//!    races recovery.
//! 2. [`crate::backup::BackupEngine`] is spawned watching the store's
//!    change signal.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use clipvault::{ClipVault, types::{ClipContent, ClipList}};
//! use std::path::PathBuf;
//!
//! # #[tokio::main]
//! # async fn main() -> clipvault::Result<()> {
//! let vault = ClipVault::open(
//!     PathBuf::from("./clipvault/store.cvb"),
//!     PathBuf::from("./clipvault/backups"),
//! )?;
//!
//! if vault.recovery_report().is_data_loss() {
//!     eprintln!("clipboard history could not be recovered");
//! }
//!
//! let store = vault.store();
//! store.insert(ClipContent::text("hello"))?;
//! let page = store.query(ClipList::History, 0, 20, None);
//! println!("{} clips in history", page.total);
//!
//! // On application exit
//! vault.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::backup::BackupEngine;
use crate::error::Result;
use crate::recovery::{RecoveryManager, RecoveryReport};
use crate::store::ClipStore;
use crate::types::{VaultConfig, DEFAULT_DEBOUNCE, DEFAULT_MAX_BACKUPS, DEFAULT_MAX_HISTORY};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A running clipvault instance
///
/// Owns the verified [`ClipStore`] and the background [`BackupEngine`].
/// Obtain one via [`ClipVault::open`] or [`ClipVaultBuilder`].
pub struct ClipVault {
    store: Arc<ClipStore>,
    backup: BackupEngine,
    recovery: RecoveryReport,
    config: VaultConfig,
}

impl std::fmt::Debug for ClipVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipVault")
            .field("store", &self.store)
            .field("backup", &self.backup)
            .field("recovery", &self.recovery.outcome)
            .finish()
    }
}

impl ClipVault {
    /// Open a vault with default configuration
    ///
    /// Runs recovery synchronously, then spawns the backup engine; must
    /// be called within a tokio runtime. See [`ClipVaultBuilder`] for
    /// custom bounds and timing.
    pub fn open(store_path: PathBuf, backup_dir: PathBuf) -> Result<Self> {
        ClipVaultBuilder::new().build(store_path, backup_dir)
    }

    /// Shared handle to the store
    ///
    /// All clip and group operations live on [`ClipStore`]; the handle
    /// can be cloned out to the clipboard monitor and the UI freely.
    pub fn store(&self) -> Arc<ClipStore> {
        self.store.clone()
    }

    /// How startup recovery concluded
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    /// Configuration the vault was opened with
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Write a backup now if the store changed since the last one
    pub async fn flush(&self) -> Result<Option<PathBuf>> {
        self.backup.flush().await
    }

    /// Flush pending changes and stop the background engine
    pub async fn shutdown(self) {
        info!("Shutting down clipvault");
        self.backup.shutdown().await;
    }
}

/// Builder for [`ClipVault`] with custom configuration
///
/// # Examples
///
/// ```rust,no_run
/// use clipvault::ClipVaultBuilder;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> clipvault::Result<()> {
/// let vault = ClipVaultBuilder::new()
///     .max_history(1000)
///     .max_backups(5)
///     .debounce(Duration::from_secs(10))
///     .build(
///         PathBuf::from("./store.cvb"),
///         PathBuf::from("./backups"),
///     )?;
/// # vault.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ClipVaultBuilder {
    max_history: usize,
    max_backups: usize,
    debounce: Duration,
}

impl Default for ClipVaultBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipVaultBuilder {
    /// Create a builder with default bounds and timing
    pub fn new() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            max_backups: DEFAULT_MAX_BACKUPS,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Bound on unpinned history clips
    pub fn max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Number of rotated backup files to keep
    pub fn max_backups(mut self, max_backups: usize) -> Self {
        self.max_backups = max_backups;
        self
    }

    /// Debounce window between a mutation and the backup write
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Recover the store and spawn the backup engine
    pub fn build(self, store_path: PathBuf, backup_dir: PathBuf) -> Result<ClipVault> {
        let config = VaultConfig {
            store_path,
            backup_dir,
            max_history: self.max_history,
            max_backups: self.max_backups,
            debounce: self.debounce,
        };
        info!("Opening clipvault at {:?}", config.store_path);

        let (store, recovery) = RecoveryManager::new(config.clone()).recover()?;
        let store = Arc::new(store);
        let backup = BackupEngine::spawn(
            store.clone(),
            config.backup_dir.clone(),
            config.max_backups,
            config.debounce,
        );

        Ok(ClipVault {
            store,
            backup,
            recovery,
            config,
        })
    }
}
