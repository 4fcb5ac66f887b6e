//! Process-wide registry of tracked positions.
//!
//! Bedrock lodestone compasses refer to their target through an integer
//! handle rather than carrying the position in the item. The registry hands
//! out those handles, shared by every session, and can be persisted so that
//! compasses keep working across restarts.

use crate::position::BlockPosition;
use ahash::AHashMap;
use anyhow::Context;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

/// Largest store file that will be read.
const STORE_LIMIT: u64 = 64 * 1024 * 1024;

/// A block position in a named dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedPosition {
    pub position: BlockPosition,
    pub dimension: String,
}

impl TrackedPosition {
    pub fn new(position: BlockPosition, dimension: impl Into<String>) -> Self {
        Self {
            position,
            dimension: dimension.into(),
        }
    }
}

/// On-disk form of the registry.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_handle: i32,
    entries: Vec<(i32, TrackedPosition)>,
}

#[derive(Debug)]
struct Entries {
    next_handle: i32,
    by_handle: AHashMap<i32, TrackedPosition>,
    by_position: AHashMap<TrackedPosition, i32>,
}

impl Entries {
    fn from_snapshot(snapshot: Snapshot) -> anyhow::Result<Self> {
        let mut entries = Self {
            next_handle: snapshot.next_handle.max(1),
            by_handle: AHashMap::new(),
            by_position: AHashMap::new(),
        };
        for (handle, position) in snapshot.entries {
            let next = handle
                .checked_add(1)
                .with_context(|| format!("tracked position handle {handle} out of range"))?;
            entries.next_handle = entries.next_handle.max(next);
            entries.by_position.insert(position.clone(), handle);
            entries.by_handle.insert(handle, position);
        }
        Ok(entries)
    }

    fn empty() -> Self {
        Self {
            next_handle: 1,
            by_handle: AHashMap::new(),
            by_position: AHashMap::new(),
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut entries: Vec<_> = self
            .by_handle
            .iter()
            .map(|(&handle, position)| (handle, position.clone()))
            .collect();
        entries.sort_by_key(|(handle, _)| *handle);
        Snapshot {
            next_handle: self.next_handle,
            entries,
        }
    }
}

/// Allocates stable handles for tracked positions.
///
/// One instance is created at startup and passed to every session.
#[derive(Debug)]
pub struct TrackedPositionRegistry {
    entries: Mutex<Entries>,
    path: Option<PathBuf>,
}

impl TrackedPositionRegistry {
    /// Creates an empty registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Entries::empty()),
            path: None,
        }
    }

    /// Opens the registry stored at `path`, or an empty one if the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let snapshot = if path.exists() {
            let bytes = fs_err::read(&path)?;
            bincode::options()
                .with_limit(STORE_LIMIT)
                .deserialize(&bytes)
                .with_context(|| format!("corrupt tracked position store {}", path.display()))?
        } else {
            Snapshot::default()
        };
        let entries = Entries::from_snapshot(snapshot)
            .with_context(|| format!("corrupt tracked position store {}", path.display()))?;
        tracing::debug!(
            "Loaded {} tracked positions from {}",
            entries.by_handle.len(),
            path.display()
        );
        Ok(Self {
            entries: Mutex::new(entries),
            path: Some(path),
        })
    }

    /// Returns the handle for `position`, allocating one on first use.
    pub fn track(&self, position: TrackedPosition) -> i32 {
        let mut entries = self.lock();
        if let Some(&handle) = entries.by_position.get(&position) {
            return handle;
        }
        let handle = entries.next_handle;
        entries.next_handle = entries.next_handle.saturating_add(1);
        entries.by_position.insert(position.clone(), handle);
        entries.by_handle.insert(handle, position);
        handle
    }

    pub fn get(&self, handle: i32) -> Option<TrackedPosition> {
        self.lock().by_handle.get(&handle).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the registry to its backing file, if it has one.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = bincode::options().serialize(&self.lock().to_snapshot())?;
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        fs_err::write(path, bytes)?;
        tracing::debug!("Saved tracked positions to {}", path.display());
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lodestone() -> TrackedPosition {
        TrackedPosition::new(BlockPosition::new(10, 64, -5), "minecraft:overworld")
    }

    #[test]
    fn same_position_shares_a_handle() {
        let registry = TrackedPositionRegistry::in_memory();
        let first = registry.track(lodestone());
        let second = registry.track(lodestone());
        let other = registry.track(TrackedPosition::new(
            BlockPosition::new(0, 0, 0),
            "minecraft:the_nether",
        ));
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(registry.get(first), Some(lodestone()));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn handles_survive_a_restart() {
        let path = std::env::temp_dir().join(format!(
            "bedrock-bridge-tracked-{}.bin",
            uuid::Uuid::new_v4()
        ));
        let registry = TrackedPositionRegistry::open(&path).unwrap();
        let handle = registry.track(lodestone());
        registry.save().unwrap();

        let reopened = TrackedPositionRegistry::open(&path).unwrap();
        assert_eq!(reopened.get(handle), Some(lodestone()));
        let next = reopened.track(TrackedPosition::new(BlockPosition::new(1, 2, 3), "x"));
        assert!(next > handle);
        fs_err::remove_file(&path).unwrap();
    }

    #[test]
    fn stores_with_exhausted_handles_are_refused() {
        let path = std::env::temp_dir().join(format!(
            "bedrock-bridge-tracked-{}.bin",
            uuid::Uuid::new_v4()
        ));
        let snapshot = Snapshot {
            next_handle: 1,
            entries: vec![(i32::MAX, lodestone())],
        };
        fs_err::write(&path, bincode::options().serialize(&snapshot).unwrap()).unwrap();
        let err = TrackedPositionRegistry::open(&path).unwrap_err();
        assert!(format!("{err:#}").contains("out of range"));
        fs_err::remove_file(&path).unwrap();
    }
}
