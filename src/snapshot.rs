//! Snapshot format and codec
//!
//! A snapshot is a full, point-in-time copy of the store state: every
//! clip, every group, and the id counters. Snapshots are derived,
//! disposable data - the backup engine produces them and recovery (or
//! export tooling) consumes them; the store's canonical records never
//! depend on one existing.
//!
//! ## Container format
//!
//! The binary container is self-describing:
//!
//! ```text
//! offset  size  field
//! 0       4     magic  b"CVLT"
//! 4       4     format version (u32, little endian)
//! 8       32    SHA-256 checksum of the payload bytes
//! 40      ..    bincode-encoded Snapshot payload
//! ```
//!
//! The checksum is computed over the exact payload byte sequence, so a
//! single flipped bit anywhere in the payload surfaces as
//! [`ClipVaultError::ChecksumMismatch`] and the snapshot is rejected as
//! untrustworthy. Structural problems (bad magic, truncation, an
//! undecodable payload) surface as [`ClipVaultError::FormatError`];
//! neither is ever silently accepted.
//!
//! A JSON form ([`Snapshot::to_json`] / [`Snapshot::from_json`]) exists
//! for export tooling and debugging; the durable paths use the binary
//! container exclusively.

use crate::error::{ClipVaultError, Result};
use crate::hasher::hash_data;
use crate::types::{Clip, Group};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Magic bytes identifying a snapshot container
const MAGIC: &[u8; 4] = b"CVLT";

/// Current snapshot format version
pub const FORMAT_VERSION: u32 = 1;

/// Container header length: magic + version + checksum
pub(crate) const HEADER_LEN: usize = 4 + 4 + 32;

/// A full, checksummed, point-in-time serialization of the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version this snapshot was written with
    pub format_version: u32,
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
    /// All clips, history and pinned alike
    pub clips: Vec<Clip>,
    /// All groups
    pub groups: Vec<Group>,
    /// Next clip id the store would assign
    pub next_clip_id: u64,
    /// Next group id the store would assign
    pub next_group_id: u64,
}

impl Snapshot {
    /// Build a snapshot over the given records, stamped now
    pub fn new(
        clips: Vec<Clip>,
        groups: Vec<Group>,
        next_clip_id: u64,
        next_group_id: u64,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            clips,
            groups,
            next_clip_id,
            next_group_id,
        }
    }

    /// Number of clips in the snapshot
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    /// Check that the snapshot satisfies store invariants
    ///
    /// Verified independently of the checksum: a snapshot can be
    /// byte-perfect yet describe a state the store must never hold.
    /// Checks fingerprint uniqueness per list, case-insensitive group
    /// name uniqueness, group reference integrity, and that the id
    /// counters sit above every live id.
    pub fn validate(&self) -> Result<()> {
        let mut clip_ids = HashSet::new();
        let mut history_hashes = HashSet::new();
        let mut pinned_hashes = HashSet::new();
        let group_ids: HashSet<u64> = self.groups.iter().map(|g| g.id).collect();

        if group_ids.len() != self.groups.len() {
            return Err(ClipVaultError::invalid_snapshot("duplicate group id"));
        }

        let mut group_names = HashSet::new();
        for group in &self.groups {
            if !group_names.insert(group.name.to_lowercase()) {
                return Err(ClipVaultError::invalid_snapshot(format!(
                    "duplicate group name: {}",
                    group.name
                )));
            }
            if group.id >= self.next_group_id {
                return Err(ClipVaultError::invalid_snapshot(format!(
                    "group id {} not below next_group_id {}",
                    group.id, self.next_group_id
                )));
            }
        }

        for clip in &self.clips {
            if !clip_ids.insert(clip.id) {
                return Err(ClipVaultError::invalid_snapshot(format!(
                    "duplicate clip id: {}",
                    clip.id
                )));
            }
            if clip.id >= self.next_clip_id {
                return Err(ClipVaultError::invalid_snapshot(format!(
                    "clip id {} not below next_clip_id {}",
                    clip.id, self.next_clip_id
                )));
            }
            let hashes = if clip.pinned {
                &mut pinned_hashes
            } else {
                &mut history_hashes
            };
            if !hashes.insert(clip.content_hash.clone()) {
                return Err(ClipVaultError::invalid_snapshot(format!(
                    "duplicate fingerprint in {} list: {}",
                    if clip.pinned { "pinned" } else { "history" },
                    clip.content_hash
                )));
            }
            if let Some(group_id) = clip.group_id {
                if !clip.pinned {
                    return Err(ClipVaultError::invalid_snapshot(format!(
                        "unpinned clip {} carries group {}",
                        clip.id, group_id
                    )));
                }
                if !group_ids.contains(&group_id) {
                    return Err(ClipVaultError::invalid_snapshot(format!(
                        "clip {} references missing group {}",
                        clip.id, group_id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Serialize to the human-readable JSON form
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from the JSON form, re-checking invariants
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Encode a snapshot into the checksummed binary container
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let payload = bincode::serde::encode_to_vec(snapshot, bincode::config::standard())?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&snapshot.format_version.to_le_bytes());

    let checksum = hash_data(&payload);
    let checksum_raw = hex::decode(&checksum)
        .map_err(|e| ClipVaultError::internal(format!("checksum encoding: {}", e)))?;
    out.extend_from_slice(&checksum_raw);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a snapshot container, verifying its embedded checksum
///
/// # Errors
///
/// - [`ClipVaultError::FormatError`] for bad magic, an unsupported
///   version, truncation, or an undecodable payload
/// - [`ClipVaultError::ChecksumMismatch`] when the embedded checksum
///   disagrees with one recomputed over the payload bytes
pub fn decode(bytes: &[u8]) -> Result<Snapshot> {
    if bytes.len() < HEADER_LEN {
        return Err(ClipVaultError::format(format!(
            "container too short: {} bytes",
            bytes.len()
        )));
    }
    if &bytes[0..4] != MAGIC {
        return Err(ClipVaultError::format("bad magic"));
    }

    let version = u32::from_le_bytes(
        bytes[4..8]
            .try_into()
            .map_err(|_| ClipVaultError::format("unreadable version field"))?,
    );
    if version != FORMAT_VERSION {
        return Err(ClipVaultError::format(format!(
            "unsupported format version: {}",
            version
        )));
    }

    let expected = hex::encode(&bytes[8..HEADER_LEN]);
    let payload = &bytes[HEADER_LEN..];
    let actual = hash_data(payload);
    if expected != actual {
        return Err(ClipVaultError::ChecksumMismatch { expected, actual });
    }

    let (snapshot, _): (Snapshot, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| ClipVaultError::format(format!("undecodable payload: {}", e)))?;
    Ok(snapshot)
}
