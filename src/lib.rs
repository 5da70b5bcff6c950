//! # clipvault - durable clipboard history with disaster recovery
//!
//! A storage engine for clipboard managers: it persists clipboard
//! history and pinned favorites, deduplicates entries by content
//! fingerprint, supports grouping and tagging of pinned items, and
//! survives storage corruption by mirroring the store to rotated,
//! checksummed snapshot files it can restore from.
//!
//! ## Overview
//!
//! clipvault is the core under a clipboard manager UI, providing:
//! - A single-file durable store with atomic commit on every mutation
//! - Content-fingerprint deduplication (text and images never collide)
//! - Pinned favorites with tags and named groups
//! - Paginated, searchable queries over history and pinned lists
//! - Debounced, rotated, checksummed snapshot backups
//! - Startup integrity verification with automatic restore from the
//!   newest trustworthy backup
//!
//! Window management, hotkeys, clipboard polling, and rendering are the
//! embedding application's concern; it submits content and commands and
//! consumes query pages.
//!
//! ## Architecture
//!
//! - **ClipStore**: the primary durable store. State is guarded by a
//!   read-write lock; every mutation is committed to disk inside a
//!   checksummed container via temp-file + atomic rename before it
//!   returns.
//! - **Snapshot codec**: a self-describing binary container (magic,
//!   format version, SHA-256 checksum, bincode payload). A snapshot
//!   that fails its checksum or structural validation is never
//!   accepted.
//! - **BackupEngine**: a background task that coalesces mutation bursts
//!   through a debounce window, writes snapshots into a backup
//!   directory, and rotates old files away.
//! - **RecoveryManager**: runs once at startup, classifies the primary
//!   store as healthy or corrupt, and rehydrates from backups when
//!   needed - before any other operation is accepted.
//!
//! ## Quick Start
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
//! let store = vault.store();
//!
//! // Clipboard monitor path
//! let clip = store.insert(ClipContent::text("copied text"))?;
//!
//! // UI paths
//! store.pin(clip.id)?;
//! let group = store.create_group("Snippets")?;
//! store.assign_group(clip.id, Some(group.id))?;
//! let page = store.query(ClipList::Pinned, 0, 20, Some("copied"));
//! assert_eq!(page.total, 1);
//!
//! // Graceful exit: final backup, engine stopped
//! vault.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Deduplication
//!
//! Content is fingerprinted with SHA-256 over a content-kind prefix
//! plus the payload bytes. Re-inserting content already in history
//! refreshes that record to the front instead of adding a row; pinned
//! clips dedup among themselves but not against history, so pinning a
//! favorite never blocks the same content from re-entering history.
//!
//! ## Durability and recovery
//!
//! Every mutation commits the full state through an atomic
//! temp-file + rename, so a crash leaves either the old state or the
//! new one. Backups carry the same container format; recovery scans
//! them newest-first and restores the first one whose checksum and
//! structure verify. When nothing verifies, the store starts empty and
//! the loss is reported in the recovery report rather than swallowed.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`](Result) with
//! [`ClipVaultError`] distinguishing recoverable outcomes (absent ids,
//! group name collisions) from corruption-class failures (format
//! errors, checksum mismatches) - see
//! [`ClipVaultError::is_corruption`].
//!
//! ## Module Organization
//!
//! - [`vault`]: `ClipVault` entry point and builder
//! - [`store`]: the primary durable clip store
//! - [`snapshot`]: snapshot format and checksummed codec
//! - [`backup`]: debounced backup engine with rotation
//! - [`recovery`]: startup verification and restore
//! - [`hasher`]: content fingerprinting
//! - [`types`]: records, queries, and configuration
//! - [`error`]: error types and handling

// Public API modules
pub mod backup;
pub mod error;
pub mod hasher;
pub mod recovery;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod vault;

// Internal modules (not part of public API)
mod utils;

// Re-export main types for convenience
pub use backup::BackupEngine;
pub use error::{ClipVaultError, Result};
pub use recovery::{RecoveryManager, RecoveryOutcome, RecoveryReport};
pub use snapshot::Snapshot;
pub use store::ClipStore;
pub use types::{Clip, ClipContent, ClipList, ContentKind, Group, QueryPage, VaultConfig};
pub use vault::{ClipVault, ClipVaultBuilder};
