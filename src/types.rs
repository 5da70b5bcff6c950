//! Core data types used throughout the clipvault library
//!
//! This module contains the fundamental data structures shared across
//! components:
//!
//! - **Records**: [`Clip`], [`Group`] - the canonical store records
//! - **Content**: [`ClipContent`], [`ClipPayload`], [`ContentKind`] - what
//!   the clipboard monitor submits and what the store persists
//! - **Queries**: [`ClipList`], [`QueryPage`] - paginated read access
//! - **Configuration**: [`VaultConfig`] - paths, bounds and timing
//!
//! ## Examples
//!
//! ```rust
//! use clipvault::types::{ClipContent, VaultConfig};
//! use std::path::PathBuf;
//!
//! let content = ClipContent::text("hello world");
//! let config = VaultConfig::new(
//!     PathBuf::from("./clipvault/store.cvb"),
//!     PathBuf::from("./clipvault/backups"),
//! );
//! assert_eq!(config.max_backups, 10);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on the number of unpinned history clips
pub const DEFAULT_MAX_HISTORY: usize = 500;

/// Default number of rotated backup snapshot files to keep
pub const DEFAULT_MAX_BACKUPS: usize = 10;

/// Default debounce window between a store mutation and the backup write
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(30);

/// Kind of content a clip holds
///
/// The kind participates in content fingerprinting, so byte-identical
/// text and image content never dedup against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentKind {
    /// Plain text content
    Text,
    /// Image content, referenced by an external blob
    Image,
}

impl ContentKind {
    /// Stable name used as the fingerprint domain prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Image => "image",
        }
    }
}

/// Content submitted by the clipboard monitor
///
/// For images the monitor supplies the raw bytes only so the store can
/// fingerprint them; the bytes themselves are never persisted in the
/// primary record - only `blob_ref`, pointing at wherever the binary
/// payload lives externally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipContent {
    /// Text observed on the clipboard
    Text(String),
    /// Image observed on the clipboard
    Image {
        /// Opaque image bytes, used for fingerprinting only
        bytes: Vec<u8>,
        /// Reference to the externally stored binary payload
        blob_ref: String,
    },
}

impl ClipContent {
    /// Convenience constructor for text content
    pub fn text(s: impl Into<String>) -> Self {
        ClipContent::Text(s.into())
    }

    /// Kind of this content
    pub fn kind(&self) -> ContentKind {
        match self {
            ClipContent::Text(_) => ContentKind::Text,
            ClipContent::Image { .. } => ContentKind::Image,
        }
    }

    /// Bytes the fingerprint is computed over
    pub fn fingerprint_bytes(&self) -> &[u8] {
        match self {
            ClipContent::Text(s) => s.as_bytes(),
            ClipContent::Image { bytes, .. } => bytes,
        }
    }
}

/// Payload persisted in a clip record
///
/// Text is stored inline; image records keep only the external blob
/// reference and its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipPayload {
    /// Inline text
    Text(String),
    /// Reference to an externally stored image blob
    Image {
        /// Reference to the external binary payload
        blob_ref: String,
        /// Size of the referenced blob in bytes
        byte_len: u64,
    },
}

impl ClipPayload {
    /// Kind of this payload
    pub fn kind(&self) -> ContentKind {
        match self {
            ClipPayload::Text(_) => ContentKind::Text,
            ClipPayload::Image { .. } => ContentKind::Image,
        }
    }

    /// Inline text, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ClipPayload::Text(s) => Some(s),
            ClipPayload::Image { .. } => None,
        }
    }
}

impl From<ClipContent> for ClipPayload {
    fn from(content: ClipContent) -> Self {
        match content {
            ClipContent::Text(s) => ClipPayload::Text(s),
            ClipContent::Image { bytes, blob_ref } => ClipPayload::Image {
                blob_ref,
                byte_len: bytes.len() as u64,
            },
        }
    }
}

/// One stored clipboard entry
///
/// A clip lives in exactly one ordering space at a time: the history
/// list while unpinned, or the pinned list (optionally inside a group)
/// while pinned. `tag` and `group_id` are only meaningful while pinned
/// and are cleared on unpin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    /// Unique, monotonically assigned identifier
    pub id: u64,
    /// Persisted payload (inline text or external blob reference)
    pub payload: ClipPayload,
    /// Content fingerprint used for deduplication
    pub content_hash: String,
    /// Whether the clip is pinned
    pub pinned: bool,
    /// Optional label, meaningful only while pinned
    pub tag: Option<String>,
    /// Group membership, meaningful only while pinned
    pub group_id: Option<u64>,
    /// Ordering key within the clip's current list; higher is nearer
    /// the front
    pub position: u64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last refresh timestamp (dedup hit, pin/unpin, reorder)
    pub updated_at: DateTime<Utc>,
}

impl Clip {
    /// Kind of this clip's content
    pub fn kind(&self) -> ContentKind {
        self.payload.kind()
    }
}

/// A named group of pinned clips
///
/// Groups cluster pinned clips in query results. Deleting a group
/// orphans its member clips rather than deleting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique, monotonically assigned identifier
    pub id: u64,
    /// Display name, unique case-insensitively
    pub name: String,
    /// Persisted UI collapse state
    pub collapsed: bool,
    /// Display order among groups; higher is nearer the front
    pub position: u64,
}

/// Which ordering space a query addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipList {
    /// Unpinned history, most-recent-first
    History,
    /// Pinned clips, clustered by group
    Pinned,
}

/// One page of query results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPage {
    /// Clips on this page, in display order
    pub clips: Vec<Clip>,
    /// Zero-based page index that was requested
    pub page: usize,
    /// Page size that was requested
    pub page_size: usize,
    /// Total matches across all pages (after search filtering)
    pub total: usize,
}

impl QueryPage {
    /// Whether more pages follow this one
    pub fn has_more(&self) -> bool {
        (self.page + 1) * self.page_size < self.total
    }
}

/// Configuration for a clipvault instance
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Path of the single primary store file
    pub store_path: PathBuf,
    /// Directory holding rotated backup snapshot files
    pub backup_dir: PathBuf,
    /// Bound on unpinned history clips; oldest evicted beyond it
    pub max_history: usize,
    /// Number of rotated backup files to keep
    pub max_backups: usize,
    /// Debounce window between a mutation and the backup write
    pub debounce: Duration,
}

impl VaultConfig {
    /// Create a configuration with default bounds and timing
    pub fn new(store_path: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            store_path,
            backup_dir,
            max_history: DEFAULT_MAX_HISTORY,
            max_backups: DEFAULT_MAX_BACKUPS,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}
