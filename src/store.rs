//! Primary durable clip store
//!
//! [`ClipStore`] owns the canonical clip and group records. State lives
//! in memory behind a [`parking_lot::RwLock`] and every mutation commits
//! the whole state to a single primary file before it returns, using the
//! checksummed snapshot container and an atomic temp-file + rename, so a
//! crash mid-write leaves either the old file or the new one - never a
//! torn mix.
//!
//! ## Deduplication
//!
//! Content is fingerprinted (see [`crate::hasher`]) on insert. A
//! fingerprint is unique among unpinned history clips and, separately,
//! among pinned clips; inserting content whose fingerprint already lives
//! in history refreshes that record instead of creating a new one. The
//! two lists are exempt from dedup against each other, so a pinned
//! favorite never blocks the same content from flowing through history.
//!
//! ## Ordering
//!
//! Each clip carries a `position` key ordering it within its current
//! list (history, ungrouped pinned, or its group); higher positions sit
//! nearer the front. Reordering rewrites positions for the affected list
//! only.
//!
//! ## Concurrency
//!
//! All methods take `&self`. Writers serialize on the lock; readers see
//! a consistent view and never observe a half-applied mutation. The
//! durable commit happens under the write lock, so once a mutation
//! returns, the state a concurrent reader observes is also the state on
//! disk.

use crate::error::{ClipVaultError, Result};
use crate::hasher::fingerprint_content;
use crate::snapshot::{self, Snapshot};
use crate::types::{Clip, ClipContent, ClipList, Group, QueryPage};
use crate::utils::atomic_write;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::{debug, info, trace};

/// In-memory store state; mirrored verbatim by the primary file
#[derive(Debug, Clone, Default)]
struct StoreState {
    clips: Vec<Clip>,
    groups: Vec<Group>,
    next_clip_id: u64,
    next_group_id: u64,
}

impl StoreState {
    fn empty() -> Self {
        Self {
            clips: Vec::new(),
            groups: Vec::new(),
            next_clip_id: 1,
            next_group_id: 1,
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            clips: snapshot.clips,
            groups: snapshot.groups,
            next_clip_id: snapshot.next_clip_id,
            next_group_id: snapshot.next_group_id,
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.clips.clone(),
            self.groups.clone(),
            self.next_clip_id,
            self.next_group_id,
        )
    }

    /// Highest position among clips matching the predicate, or 0
    fn max_position(&self, pred: impl Fn(&Clip) -> bool) -> u64 {
        self.clips
            .iter()
            .filter(|c| pred(c))
            .map(|c| c.position)
            .max()
            .unwrap_or(0)
    }

    fn front_of_history(&self) -> u64 {
        self.max_position(|c| !c.pinned) + 1
    }

    fn front_of_pinned(&self, group_id: Option<u64>) -> u64 {
        self.max_position(|c| c.pinned && c.group_id == group_id) + 1
    }

    fn clip_index(&self, id: u64) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    fn group_index(&self, id: u64) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    /// Pin the clip at `idx`, merging it into a resident pinned clip
    /// carrying the same fingerprint; returns the surviving clip's id
    fn promote(&mut self, idx: usize, now: DateTime<Utc>) -> u64 {
        let hash = self.clips[idx].content_hash.clone();
        if let Some(resident_id) = self
            .clips
            .iter()
            .find(|c| c.pinned && c.content_hash == hash)
            .map(|c| c.id)
        {
            let merged_id = self.clips[idx].id;
            self.clips.remove(idx);
            let resident_idx = self.clip_index(resident_id).expect("resident pinned clip");
            let front = self.front_of_pinned(self.clips[resident_idx].group_id);
            let resident = &mut self.clips[resident_idx];
            resident.position = front;
            resident.updated_at = now;
            debug!("Pin merged clip {} into pinned clip {}", merged_id, resident_id);
            return resident_id;
        }

        let front = self.front_of_pinned(None);
        let clip = &mut self.clips[idx];
        clip.pinned = true;
        clip.position = front;
        clip.updated_at = now;
        clip.id
    }

    /// Evict oldest unpinned clips until history fits the bound
    fn evict_history(&mut self, max_history: usize) -> usize {
        let mut evicted = 0;
        loop {
            let history_len = self.clips.iter().filter(|c| !c.pinned).count();
            if history_len <= max_history {
                break;
            }
            // Lowest position is the oldest entry
            let Some(oldest) = self
                .clips
                .iter()
                .filter(|c| !c.pinned)
                .min_by_key(|c| c.position)
                .map(|c| c.id)
            else {
                break;
            };
            self.clips.retain(|c| c.id != oldest);
            evicted += 1;
        }
        evicted
    }
}

/// The primary durable store for clips and groups
///
/// Create one through [`crate::recovery::RecoveryManager`] (the normal
/// startup path, which verifies integrity first) or through one of the
/// explicit constructors when the caller already knows the state of the
/// primary file.
///
/// # Examples
///
/// ```rust
/// use clipvault::store::ClipStore;
/// use clipvault::types::{ClipContent, ClipList};
/// # use tempfile::TempDir;
///
/// # fn main() -> clipvault::Result<()> {
/// # let dir = TempDir::new().unwrap();
/// let store = ClipStore::create_empty(dir.path().join("store.cvb"), 500)?;
///
/// let clip = store.insert(ClipContent::text("hello"))?;
/// let again = store.insert(ClipContent::text("hello"))?;
/// assert_eq!(clip.id, again.id); // dedup hit, no second record
///
/// let page = store.query(ClipList::History, 0, 20, None);
/// assert_eq!(page.total, 1);
/// # Ok(())
/// # }
/// ```
pub struct ClipStore {
    /// Path of the primary store file
    path: PathBuf,
    /// Bound on unpinned history clips
    max_history: usize,
    /// Canonical state
    inner: RwLock<StoreState>,
    /// Bumped after every committed mutation; lets the backup engine
    /// skip writes when nothing changed
    generation: AtomicU64,
    /// Signalled after every committed mutation
    changed: Notify,
}

impl std::fmt::Debug for ClipStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.read();
        f.debug_struct("ClipStore")
            .field("path", &self.path)
            .field("clips", &state.clips.len())
            .field("groups", &state.groups.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

impl ClipStore {
    fn with_state(path: PathBuf, max_history: usize, state: StoreState) -> Self {
        Self {
            path,
            max_history,
            inner: RwLock::new(state),
            generation: AtomicU64::new(0),
            changed: Notify::new(),
        }
    }

    /// Create an empty store and commit it durably
    pub fn create_empty(path: impl Into<PathBuf>, max_history: usize) -> Result<Self> {
        let store = Self::with_state(path.into(), max_history, StoreState::empty());
        store.commit(&store.inner.read())?;
        info!("Created empty clip store at {:?}", store.path);
        Ok(store)
    }

    /// Load and verify an existing primary store file
    ///
    /// Fails with a corruption-class error (see
    /// [`ClipVaultError::is_corruption`]) when the file is unreadable,
    /// fails its checksum, or violates store invariants. The recovery
    /// manager uses this to classify the primary store as healthy or
    /// corrupt.
    pub fn load(path: impl Into<PathBuf>, max_history: usize) -> Result<Self> {
        let path = path.into();
        let bytes = fs::read(&path)?;
        let snap = snapshot::decode(&bytes)?;
        snap.validate()?;
        debug!(
            "Loaded clip store from {:?}: {} clips, {} groups",
            path,
            snap.clips.len(),
            snap.groups.len()
        );
        Ok(Self::with_state(
            path,
            max_history,
            StoreState::from_snapshot(snap),
        ))
    }

    /// Build a store from a snapshot and commit it durably
    pub fn from_snapshot(
        path: impl Into<PathBuf>,
        max_history: usize,
        snapshot: Snapshot,
    ) -> Result<Self> {
        snapshot.validate()?;
        let store = Self::with_state(
            path.into(),
            max_history,
            StoreState::from_snapshot(snapshot),
        );
        store.commit(&store.inner.read())?;
        Ok(store)
    }

    /// Path of the primary store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current mutation generation
    ///
    /// Monotonically increases with every committed mutation. Equal
    /// generations mean no state change in between.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wait until the next committed mutation
    ///
    /// Used by the backup engine to arm its debounce timer. A permit is
    /// stored if a mutation lands while nobody is waiting.
    pub async fn change_notified(&self) {
        self.changed.notified().await
    }

    /// Write `state` to the primary file inside the checksummed container
    fn commit(&self, state: &StoreState) -> Result<()> {
        let bytes = snapshot::encode(&state.to_snapshot())?;
        atomic_write(&self.path, &bytes)?;
        trace!("Committed {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }

    /// Run a mutation: apply `f` to a copy of the state, commit the copy
    /// durably, then publish it
    ///
    /// If `f` or the durable write fails, neither memory nor disk
    /// changes - the caller gets the error and observers keep the prior
    /// state.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.commit(&next)?;
        *guard = next;
        drop(guard);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.changed.notify_one();
        Ok(out)
    }

    // ==================== write operations ====================

    /// Insert observed clipboard content
    ///
    /// If an unpinned clip with the same fingerprint exists, that record
    /// is refreshed to the front of history and returned - no new row.
    /// Otherwise a new clip is created at the front, and the oldest
    /// unpinned clips are evicted if history exceeds its bound. The
    /// record is durably committed before this returns.
    pub fn insert(&self, content: ClipContent) -> Result<Clip> {
        let hash = fingerprint_content(&content);
        let now = Utc::now();

        self.mutate(|state| {
            if let Some(idx) = state
                .clips
                .iter()
                .position(|c| !c.pinned && c.content_hash == hash)
            {
                let front = state.front_of_history();
                let clip = &mut state.clips[idx];
                clip.position = front;
                clip.updated_at = now;
                debug!("Dedup hit for clip {}", clip.id);
                return Ok(clip.clone());
            }

            let clip = Clip {
                id: state.next_clip_id,
                payload: content.into(),
                content_hash: hash,
                pinned: false,
                tag: None,
                group_id: None,
                position: state.front_of_history(),
                created_at: now,
                updated_at: now,
            };
            state.next_clip_id += 1;
            state.clips.push(clip.clone());

            let evicted = state.evict_history(self.max_history);
            if evicted > 0 {
                debug!("Evicted {} clips past history bound", evicted);
            }
            Ok(clip)
        })
    }

    /// Pin a clip, moving it to the front of the ungrouped pinned list
    ///
    /// If another pinned clip already carries the same fingerprint the
    /// two records merge: the history copy is removed and the resident
    /// pinned record is refreshed and returned, preserving fingerprint
    /// uniqueness among pinned clips. Pinning an already pinned clip is
    /// a no-op returning the clip.
    pub fn pin(&self, id: u64) -> Result<Clip> {
        let now = Utc::now();
        self.mutate(|state| {
            let idx = state.clip_index(id).ok_or(ClipVaultError::ClipNotFound(id))?;
            if state.clips[idx].pinned {
                return Ok(state.clips[idx].clone());
            }
            let surviving = state.promote(idx, now);
            let i = state.clip_index(surviving).expect("surviving pinned clip");
            Ok(state.clips[i].clone())
        })
    }

    /// Unpin a clip, clearing its tag and group and returning it to the
    /// front of history
    ///
    /// If history already holds the same fingerprint the records merge:
    /// the pinned copy is removed and the history record is refreshed
    /// and returned. Unpinning an unpinned clip is a no-op returning the
    /// clip.
    pub fn unpin(&self, id: u64) -> Result<Clip> {
        let now = Utc::now();
        self.mutate(|state| {
            let idx = state.clip_index(id).ok_or(ClipVaultError::ClipNotFound(id))?;
            if !state.clips[idx].pinned {
                return Ok(state.clips[idx].clone());
            }

            let hash = state.clips[idx].content_hash.clone();
            if let Some(resident_id) = state
                .clips
                .iter()
                .find(|c| !c.pinned && c.content_hash == hash)
                .map(|c| c.id)
            {
                state.clips.remove(idx);
                let front = state.front_of_history();
                let resident_idx = state.clip_index(resident_id).expect("resident history clip");
                let resident = &mut state.clips[resident_idx];
                resident.position = front;
                resident.updated_at = now;
                debug!("Unpin merged clip {} into history clip {}", id, resident_id);
                return Ok(resident.clone());
            }

            let front = state.front_of_history();
            let clip = &mut state.clips[idx];
            clip.pinned = false;
            clip.tag = None;
            clip.group_id = None;
            clip.position = front;
            clip.updated_at = now;
            let clip = clip.clone();

            state.evict_history(self.max_history);
            Ok(clip)
        })
    }

    /// Delete a clip permanently
    ///
    /// Idempotent: deleting an absent id is a no-op, so racing UI
    /// actions never surface spurious errors.
    pub fn delete(&self, id: u64) -> Result<()> {
        if self.inner.read().clip_index(id).is_none() {
            trace!("Delete of absent clip {} ignored", id);
            return Ok(());
        }
        self.mutate(|state| {
            state.clips.retain(|c| c.id != id);
            Ok(())
        })
    }

    /// Move a clip to `new_position` within its current list
    ///
    /// `new_position` is a zero-based index from the front of the list
    /// the clip currently lives in (history, ungrouped pinned, or its
    /// group). Out-of-range targets clamp to the nearest valid bound.
    pub fn reorder(&self, id: u64, new_position: usize) -> Result<Clip> {
        let now = Utc::now();
        self.mutate(|state| {
            let idx = state.clip_index(id).ok_or(ClipVaultError::ClipNotFound(id))?;
            let (pinned, group_id) = (state.clips[idx].pinned, state.clips[idx].group_id);

            // Ids of the clip's list, front to back
            let mut ordered: Vec<(u64, u64)> = state
                .clips
                .iter()
                .filter(|c| c.pinned == pinned && (!pinned || c.group_id == group_id))
                .map(|c| (c.id, c.position))
                .collect();
            ordered.sort_by(|a, b| b.1.cmp(&a.1));
            let mut ids: Vec<u64> = ordered.into_iter().map(|(id, _)| id).collect();

            let from = ids.iter().position(|&i| i == id).expect("clip in its own list");
            let to = new_position.min(ids.len() - 1);
            let moved = ids.remove(from);
            ids.insert(to, moved);

            // Rewrite positions for this list only, front = highest
            let len = ids.len() as u64;
            for (offset, clip_id) in ids.iter().enumerate() {
                let i = state.clip_index(*clip_id).expect("listed clip");
                state.clips[i].position = len - offset as u64;
            }
            let i = state.clip_index(id).expect("moved clip");
            state.clips[i].updated_at = now;
            Ok(state.clips[i].clone())
        })
    }

    /// Set or clear a clip's tag
    pub fn set_tag(&self, id: u64, tag: Option<String>) -> Result<Clip> {
        self.mutate(|state| {
            let idx = state.clip_index(id).ok_or(ClipVaultError::ClipNotFound(id))?;
            let clip = &mut state.clips[idx];
            clip.tag = tag.filter(|t| !t.is_empty());
            clip.updated_at = Utc::now();
            Ok(clip.clone())
        })
    }

    /// Create a group at the front of the group ordering
    ///
    /// Fails with [`ClipVaultError::DuplicateName`] when a group with
    /// the same case-insensitive name exists.
    pub fn create_group(&self, name: impl Into<String>) -> Result<Group> {
        let name = name.into();
        self.mutate(|state| {
            let lower = name.to_lowercase();
            if state.groups.iter().any(|g| g.name.to_lowercase() == lower) {
                return Err(ClipVaultError::DuplicateName(name.clone()));
            }
            let group = Group {
                id: state.next_group_id,
                name: name.clone(),
                collapsed: false,
                position: state.groups.iter().map(|g| g.position).max().unwrap_or(0) + 1,
            };
            state.next_group_id += 1;
            state.groups.push(group.clone());
            info!("Created group {:?} ({})", group.name, group.id);
            Ok(group)
        })
    }

    /// Delete a group, orphaning its member clips
    ///
    /// Members keep existing as ungrouped pinned clips, moved to the
    /// front of the ungrouped list in their previous relative order.
    pub fn delete_group(&self, id: u64) -> Result<()> {
        self.mutate(|state| {
            let idx = state.group_index(id).ok_or(ClipVaultError::GroupNotFound(id))?;
            state.groups.remove(idx);

            let mut members: Vec<(u64, u64)> = state
                .clips
                .iter()
                .filter(|c| c.group_id == Some(id))
                .map(|c| (c.id, c.position))
                .collect();
            members.sort_by(|a, b| b.1.cmp(&a.1));

            let mut front = state.front_of_pinned(None) + members.len() as u64;
            for (member_id, _) in members {
                front -= 1;
                let i = state.clip_index(member_id).expect("member clip");
                state.clips[i].group_id = None;
                state.clips[i].position = front;
            }
            info!("Deleted group {}", id);
            Ok(())
        })
    }

    /// Persist a group's collapsed state
    pub fn set_group_collapsed(&self, id: u64, collapsed: bool) -> Result<Group> {
        self.mutate(|state| {
            let idx = state.group_index(id).ok_or(ClipVaultError::GroupNotFound(id))?;
            state.groups[idx].collapsed = collapsed;
            Ok(state.groups[idx].clone())
        })
    }

    /// Assign a pinned clip to a group, or clear its membership
    ///
    /// The clip moves to the front of the target list. Assigning a group
    /// to an unpinned clip pins it first (grouping is a promotion), with
    /// the same fingerprint-merge behavior as [`ClipStore::pin`]. The
    /// whole operation is one committed mutation: if the group or clip
    /// is absent, nothing changes - including the promotion.
    pub fn assign_group(&self, clip_id: u64, group_id: Option<u64>) -> Result<Clip> {
        let now = Utc::now();
        self.mutate(|state| {
            if let Some(gid) = group_id {
                if state.group_index(gid).is_none() {
                    return Err(ClipVaultError::GroupNotFound(gid));
                }
            }
            let idx = state
                .clip_index(clip_id)
                .ok_or(ClipVaultError::ClipNotFound(clip_id))?;
            let surviving = if state.clips[idx].pinned {
                clip_id
            } else {
                state.promote(idx, now)
            };

            let idx = state.clip_index(surviving).expect("surviving pinned clip");
            let front = state.front_of_pinned(group_id);
            let record = &mut state.clips[idx];
            record.group_id = group_id;
            record.position = front;
            record.updated_at = now;
            Ok(record.clone())
        })
    }

    /// Delete all unpinned clips, returning the count removed
    pub fn clear_history(&self) -> Result<usize> {
        self.mutate(|state| {
            let before = state.clips.len();
            state.clips.retain(|c| c.pinned);
            Ok(before - state.clips.len())
        })
    }

    /// Delete all pinned clips, returning the count removed
    ///
    /// Groups survive; they are only destroyed explicitly.
    pub fn clear_pinned(&self) -> Result<usize> {
        self.mutate(|state| {
            let before = state.clips.len();
            state.clips.retain(|c| !c.pinned);
            Ok(before - state.clips.len())
        })
    }

    /// Atomically replace the entire state with a snapshot's contents
    ///
    /// The snapshot is validated and durably committed before the
    /// in-memory state is swapped; on any failure the prior state stays
    /// fully intact.
    pub fn restore(&self, snapshot: Snapshot) -> Result<()> {
        snapshot.validate()?;
        let clips = snapshot.clips.len();
        self.mutate(|state| {
            *state = StoreState::from_snapshot(snapshot);
            Ok(())
        })?;
        info!("Restored store state: {} clips", clips);
        Ok(())
    }

    // ==================== read operations ====================

    /// Get a single clip by id
    pub fn get(&self, id: u64) -> Option<Clip> {
        let state = self.inner.read();
        state.clips.iter().find(|c| c.id == id).cloned()
    }

    /// Find a clip by content fingerprint, history before pinned
    pub fn find_by_fingerprint(&self, hash: &str) -> Option<Clip> {
        let state = self.inner.read();
        state
            .clips
            .iter()
            .filter(|c| c.content_hash == hash)
            .min_by_key(|c| c.pinned)
            .cloned()
    }

    /// Number of unpinned history clips
    pub fn history_len(&self) -> usize {
        self.inner.read().clips.iter().filter(|c| !c.pinned).count()
    }

    /// Number of pinned clips
    pub fn pinned_len(&self) -> usize {
        self.inner.read().clips.iter().filter(|c| c.pinned).count()
    }

    /// All groups in display order
    pub fn groups(&self) -> Vec<Group> {
        let mut groups = self.inner.read().groups.clone();
        groups.sort_by(|a, b| b.position.cmp(&a.position));
        groups
    }

    /// Query one page of a list
    ///
    /// History is ordered most-recent-first. Pinned results cluster by
    /// group: groups in display order, each group's members in their own
    /// order, ungrouped pinned clips last. `search` filters
    /// case-insensitively on text payload or tag before pagination.
    pub fn query(
        &self,
        list: ClipList,
        page: usize,
        page_size: usize,
        search: Option<&str>,
    ) -> QueryPage {
        let state = self.inner.read();

        let mut ordered: Vec<&Clip> = match list {
            ClipList::History => {
                let mut clips: Vec<&Clip> =
                    state.clips.iter().filter(|c| !c.pinned).collect();
                clips.sort_by(|a, b| b.position.cmp(&a.position));
                clips
            }
            ClipList::Pinned => {
                let mut groups = state.groups.clone();
                groups.sort_by(|a, b| b.position.cmp(&a.position));

                let mut clips: Vec<&Clip> = Vec::new();
                for group in &groups {
                    let mut members: Vec<&Clip> = state
                        .clips
                        .iter()
                        .filter(|c| c.pinned && c.group_id == Some(group.id))
                        .collect();
                    members.sort_by(|a, b| b.position.cmp(&a.position));
                    clips.extend(members);
                }
                let mut ungrouped: Vec<&Clip> = state
                    .clips
                    .iter()
                    .filter(|c| c.pinned && c.group_id.is_none())
                    .collect();
                ungrouped.sort_by(|a, b| b.position.cmp(&a.position));
                clips.extend(ungrouped);
                clips
            }
        };

        if let Some(needle) = search.map(|s| s.to_lowercase()).filter(|s| !s.is_empty()) {
            ordered.retain(|c| {
                let text_match = c
                    .payload
                    .as_text()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                let tag_match = c
                    .tag
                    .as_deref()
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                text_match || tag_match
            });
        }

        let total = ordered.len();
        let start = page.saturating_mul(page_size).min(total);
        let end = start.saturating_add(page_size).min(total);
        QueryPage {
            clips: ordered[start..end].iter().map(|c| (*c).clone()).collect(),
            page,
            page_size,
            total,
        }
    }

    /// Take a consistent snapshot of the full store state
    pub fn snapshot(&self) -> Snapshot {
        self.inner.read().to_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> ClipStore {
        ClipStore::create_empty(dir.path().join("store.cvb"), 500).unwrap()
    }

    fn texts(page: &QueryPage) -> Vec<String> {
        page.clips
            .iter()
            .map(|c| c.payload.as_text().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_insert_dedup_refreshes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let first = store.insert(ClipContent::text("hello")).unwrap();
        store.insert(ClipContent::text("other")).unwrap();
        let second = store.insert(ClipContent::text("hello")).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.history_len(), 2);
        assert!(second.updated_at >= first.updated_at);

        // Dedup hit moved it back to the front
        let page = store.query(ClipList::History, 0, 10, None);
        assert_eq!(texts(&page), vec!["hello", "other"]);
    }

    #[test]
    fn test_cross_kind_content_is_distinct() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.insert(ClipContent::text("x")).unwrap();
        store
            .insert(ClipContent::Image {
                bytes: b"x".to_vec(),
                blob_ref: "blobs/x".to_string(),
            })
            .unwrap();
        assert_eq!(store.history_len(), 2);
    }

    #[test]
    fn test_pin_removes_from_history() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let clip = store.insert(ClipContent::text("keep me")).unwrap();
        store.insert(ClipContent::text("other")).unwrap();
        let pinned = store.pin(clip.id).unwrap();
        assert!(pinned.pinned);

        let history = store.query(ClipList::History, 0, 10, None);
        assert!(history.clips.iter().all(|c| c.id != clip.id));
        let pinned_page = store.query(ClipList::Pinned, 0, 10, None);
        assert_eq!(pinned_page.total, 1);
    }

    #[test]
    fn test_pin_merges_on_fingerprint_collision() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let a = store.insert(ClipContent::text("dup")).unwrap();
        store.pin(a.id).unwrap();
        // History may hold the same content again (cross-list exemption)
        let b = store.insert(ClipContent::text("dup")).unwrap();
        assert_ne!(a.id, b.id);

        let merged = store.pin(b.id).unwrap();
        assert_eq!(merged.id, a.id);
        assert_eq!(store.pinned_len(), 1);
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_unpin_clears_tag_and_group() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let clip = store.insert(ClipContent::text("fav")).unwrap();
        store.pin(clip.id).unwrap();
        let group = store.create_group("Work").unwrap();
        store.assign_group(clip.id, Some(group.id)).unwrap();
        store.set_tag(clip.id, Some("snippet".to_string())).unwrap();

        let unpinned = store.unpin(clip.id).unwrap();
        assert!(!unpinned.pinned);
        assert_eq!(unpinned.tag, None);
        assert_eq!(unpinned.group_id, None);
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn test_unpin_merges_into_history() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let a = store.insert(ClipContent::text("dup")).unwrap();
        store.pin(a.id).unwrap();
        let b = store.insert(ClipContent::text("dup")).unwrap();

        let merged = store.unpin(a.id).unwrap();
        assert_eq!(merged.id, b.id);
        assert_eq!(store.history_len(), 1);
        assert_eq!(store.pinned_len(), 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let clip = store.insert(ClipContent::text("x")).unwrap();
        store.delete(clip.id).unwrap();
        store.delete(clip.id).unwrap();
        store.delete(9999).unwrap();
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_reorder_clamps_past_end() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.insert(ClipContent::text("c")).unwrap();
        store.insert(ClipContent::text("b")).unwrap();
        let front = store.insert(ClipContent::text("a")).unwrap();

        store.reorder(front.id, 999).unwrap();
        let page = store.query(ClipList::History, 0, 10, None);
        assert_eq!(texts(&page), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_reorder_within_group_only() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let group = store.create_group("G").unwrap();

        let mut grouped = Vec::new();
        for text in ["g3", "g2", "g1"] {
            let clip = store.insert(ClipContent::text(text)).unwrap();
            grouped.push(store.assign_group(clip.id, Some(group.id)).unwrap());
        }
        let loose = store.insert(ClipContent::text("loose")).unwrap();
        store.pin(loose.id).unwrap();

        // Move the group's front member to its back
        store.reorder(grouped[2].id, 2).unwrap();
        let page = store.query(ClipList::Pinned, 0, 10, None);
        assert_eq!(texts(&page), vec!["g2", "g3", "g1", "loose"]);
    }

    #[test]
    fn test_create_group_duplicate_name_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.create_group("Work").unwrap();
        match store.create_group("wOrK") {
            Err(ClipVaultError::DuplicateName(name)) => assert_eq!(name, "wOrK"),
            other => panic!("expected DuplicateName, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_group_orphans_members() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let group = store.create_group("Work").unwrap();

        let clip = store.insert(ClipContent::text("member")).unwrap();
        store.assign_group(clip.id, Some(group.id)).unwrap();

        store.delete_group(group.id).unwrap();
        let survivor = store.get(clip.id).unwrap();
        assert!(survivor.pinned);
        assert_eq!(survivor.group_id, None);
        assert!(store.groups().is_empty());
    }

    #[test]
    fn test_assign_group_not_found() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let clip = store.insert(ClipContent::text("x")).unwrap();

        assert!(matches!(
            store.assign_group(clip.id, Some(42)),
            Err(ClipVaultError::GroupNotFound(42))
        ));
        // Nothing changed
        assert!(!store.get(clip.id).unwrap().pinned);
    }

    #[test]
    fn test_assign_group_failure_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let group = store.create_group("Gone").unwrap();
        let clip = store.insert(ClipContent::text("x")).unwrap();
        store.delete_group(group.id).unwrap();

        let generation = store.generation();
        assert!(matches!(
            store.assign_group(clip.id, Some(group.id)),
            Err(ClipVaultError::GroupNotFound(_))
        ));
        // Single-commit operation: the error path leaves no trace, not
        // even the promotion of the unpinned clip
        assert_eq!(store.generation(), generation);
        assert!(!store.get(clip.id).unwrap().pinned);
    }

    #[test]
    fn test_assign_group_racing_delete_group_stays_consistent() {
        for _ in 0..50 {
            let dir = TempDir::new().unwrap();
            let store = std::sync::Arc::new(open_store(&dir));
            let group = store.create_group("G").unwrap();
            let clip = store.insert(ClipContent::text("x")).unwrap();

            let deleter = {
                let store = store.clone();
                let gid = group.id;
                std::thread::spawn(move || store.delete_group(gid).unwrap())
            };
            let assigned = store.assign_group(clip.id, Some(group.id));
            deleter.join().unwrap();

            let survivor = store.get(clip.id).unwrap();
            match assigned {
                // Assignment won the race; the delete then orphaned it
                Ok(_) => assert!(survivor.pinned),
                // Delete won; the clip must be wholly untouched
                Err(ClipVaultError::GroupNotFound(_)) => assert!(!survivor.pinned),
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_assign_group_promotes_unpinned() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let group = store.create_group("Work").unwrap();

        let clip = store.insert(ClipContent::text("x")).unwrap();
        let assigned = store.assign_group(clip.id, Some(group.id)).unwrap();
        assert!(assigned.pinned);
        assert_eq!(assigned.group_id, Some(group.id));
        assert_eq!(store.history_len(), 0);
    }

    #[test]
    fn test_pinned_query_clusters_groups() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let first = store.create_group("First").unwrap();
        let second = store.create_group("Second").unwrap();

        for (text, gid) in [
            ("a1", Some(first.id)),
            ("b1", Some(second.id)),
            ("a2", Some(first.id)),
            ("loose", None),
            ("b2", Some(second.id)),
        ] {
            let clip = store.insert(ClipContent::text(text)).unwrap();
            match gid {
                Some(gid) => {
                    store.assign_group(clip.id, Some(gid)).unwrap();
                }
                None => {
                    store.pin(clip.id).unwrap();
                }
            }
        }

        // Newest group first, each group's members contiguous, ungrouped last
        let page = store.query(ClipList::Pinned, 0, 10, None);
        assert_eq!(texts(&page), vec!["b2", "b1", "a2", "a1", "loose"]);
    }

    #[test]
    fn test_search_filters_before_pagination() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        for i in 0..5 {
            store
                .insert(ClipContent::text(format!("needle {}", i)))
                .unwrap();
            store.insert(ClipContent::text(format!("hay {}", i))).unwrap();
        }

        let page = store.query(ClipList::History, 0, 3, Some("NEEDLE"));
        assert_eq!(page.total, 5);
        assert_eq!(page.clips.len(), 3);
        assert!(page.has_more());
    }

    #[test]
    fn test_search_matches_tag() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let clip = store
            .insert(ClipContent::Image {
                bytes: vec![1, 2, 3],
                blob_ref: "blobs/shot".to_string(),
            })
            .unwrap();
        store.pin(clip.id).unwrap();
        store
            .set_tag(clip.id, Some("Screenshot".to_string()))
            .unwrap();

        let page = store.query(ClipList::Pinned, 0, 10, Some("screen"));
        assert_eq!(page.total, 1);
        let none = store.query(ClipList::Pinned, 0, 10, Some("missing"));
        assert_eq!(none.total, 0);
    }

    #[test]
    fn test_history_eviction_bound() {
        let dir = TempDir::new().unwrap();
        let store = ClipStore::create_empty(dir.path().join("store.cvb"), 3).unwrap();

        let pinned = store.insert(ClipContent::text("pinned")).unwrap();
        store.pin(pinned.id).unwrap();

        for i in 0..5 {
            store.insert(ClipContent::text(format!("clip {}", i))).unwrap();
        }

        assert_eq!(store.history_len(), 3);
        assert_eq!(store.pinned_len(), 1);
        let page = store.query(ClipList::History, 0, 10, None);
        assert_eq!(texts(&page), vec!["clip 4", "clip 3", "clip 2"]);
    }

    #[test]
    fn test_clear_history_keeps_pinned() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let fav = store.insert(ClipContent::text("fav")).unwrap();
        store.pin(fav.id).unwrap();
        store.insert(ClipContent::text("a")).unwrap();
        store.insert(ClipContent::text("b")).unwrap();

        assert_eq!(store.clear_history().unwrap(), 2);
        assert_eq!(store.history_len(), 0);
        assert_eq!(store.pinned_len(), 1);
    }

    #[test]
    fn test_restore_replaces_state() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert(ClipContent::text("old")).unwrap();

        let other = ClipStore::create_empty(dir.path().join("other.cvb"), 500).unwrap();
        other.insert(ClipContent::text("restored")).unwrap();
        let snapshot = other.snapshot();

        store.restore(snapshot).unwrap();
        let page = store.query(ClipList::History, 0, 10, None);
        assert_eq!(texts(&page), vec!["restored"]);
    }

    #[test]
    fn test_restore_invalid_snapshot_leaves_state() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.insert(ClipContent::text("keep")).unwrap();

        let mut snapshot = store.snapshot();
        // Corrupt the snapshot structurally
        snapshot.next_clip_id = 0;

        assert!(store.restore(snapshot).is_err());
        let page = store.query(ClipList::History, 0, 10, None);
        assert_eq!(texts(&page), vec!["keep"]);
    }

    #[test]
    fn test_commit_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.cvb");
        {
            let store = ClipStore::create_empty(&path, 500).unwrap();
            let clip = store.insert(ClipContent::text("persisted")).unwrap();
            store.pin(clip.id).unwrap();
        }

        let reopened = ClipStore::load(&path, 500).unwrap();
        assert_eq!(reopened.pinned_len(), 1);
        let page = reopened.query(ClipList::Pinned, 0, 10, None);
        assert_eq!(texts(&page), vec!["persisted"]);
    }

    #[test]
    fn test_generation_advances_on_mutation_only() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let g0 = store.generation();
        store.insert(ClipContent::text("x")).unwrap();
        let g1 = store.generation();
        assert!(g1 > g0);

        store.query(ClipList::History, 0, 10, None);
        store.delete(9999).unwrap(); // no-op
        assert_eq!(store.generation(), g1);
    }

    #[test]
    fn test_concurrent_inserts_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(open_store(&dir));

        let mut handles = Vec::new();
        for worker in 0..4 {
            let store = store.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..25 {
                    store
                        .insert(ClipContent::text(format!("w{} c{}", worker, i)))
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.history_len(), 100);
    }
}
