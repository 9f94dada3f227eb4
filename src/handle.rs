//! Shared ownership of the current topology.
//!
//! The handle is the one place that replaces a live snapshot: adoption of a
//! newly parsed topology and the copy-on-write remap path both swap the
//! `Arc` under a write lock. Readers clone the `Arc` and route against a
//! consistent snapshot without holding any lock; snapshots they still hold
//! stay valid until dropped.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::routing::{KeyLocation, RemapPlan};
use crate::topology::{TopologyDiff, TopologySnapshot};

/// Owner of the current [`TopologySnapshot`].
///
/// Created from the first successfully parsed snapshot; a failed parse never
/// reaches the handle, so routing degrades to stale-but-valid rather than
/// none at all.
#[derive(Debug)]
pub struct TopologyHandle {
    current: RwLock<Arc<TopologySnapshot>>,
}

impl TopologyHandle {
    /// Wrap an initial snapshot.
    pub fn new(initial: TopologySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The current snapshot. Cheap; callers route against the returned
    /// `Arc` without further locking.
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.current.read())
    }

    /// The current snapshot's revision.
    pub fn revision(&self) -> Option<u32> {
        self.current.read().revision()
    }

    /// Route a key against the current snapshot.
    pub fn route(&self, key: &[u8]) -> KeyLocation {
        self.snapshot().map_key(key)
    }

    /// Adopt a new snapshot, returning what changed relative to the one it
    /// replaces. Callers use the diff's flags to decide how much
    /// reconfiguration work the swap implies.
    pub fn adopt(&self, next: TopologySnapshot) -> TopologyDiff {
        let mut guard = self.current.write();
        let diff = guard.diff(&next);

        info!(
            bucket = next.name(),
            revision = ?next.revision(),
            partition_changes = ?diff.partition_changes(),
            sequence_changed = diff.sequence_changed(),
            "adopting topology"
        );
        for added in diff.servers_added() {
            info!(server = %added, "server added");
        }
        for removed in diff.servers_removed() {
            info!(server = %removed, "server removed");
        }

        *guard = Arc::new(next);
        diff
    }

    /// React to an ownership rejection: decide the next server to try for
    /// `partition` after `rejected` refused it, swapping in a patched
    /// snapshot when the decision updates the partition table.
    ///
    /// Returns the server index to retry against, or `None` when no valid
    /// node remains.
    pub fn remap_rejected(&self, partition: usize, rejected: usize) -> Option<usize> {
        let mut guard = self.current.write();
        match guard.plan_remap(partition, rejected) {
            RemapPlan::Unchanged(master) => Some(master),
            RemapPlan::Updated { master, table } => {
                debug!(partition, rejected, master, "remapped partition");
                let mut next = (**guard).clone();
                next.replace_partition_table(table);
                *guard = Arc::new(next);
                Some(master)
            }
            RemapPlan::NoAlternative => {
                warn!(partition, rejected, "no alternative node for partition");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::PartitionTable;
    use crate::topology::snapshot::Layout;
    use crate::types::Distribution;

    fn with_forward(mut snap: TopologySnapshot, rows: Vec<Vec<i32>>) -> TopologySnapshot {
        let fwd = PartitionTable::from_rows(rows, 1);
        if let Layout::VBucket { forward, .. } = &mut snap.layout {
            *forward = Some(fwd);
        }
        snap
    }

    #[test]
    fn test_adopt_swaps_and_reports_diff() {
        let handle = TopologyHandle::new(TopologySnapshot::generate(3, 1, 8).unwrap());
        assert_eq!(handle.snapshot().num_servers(), 3);

        let diff = handle.adopt(TopologySnapshot::generate(4, 1, 8).unwrap());
        assert!(diff.is_servers_modified());
        assert_eq!(handle.snapshot().num_servers(), 4);
    }

    #[test]
    fn test_remap_with_forward_table_updates_current() {
        let snap = with_forward(
            TopologySnapshot::generate(4, 1, 8).unwrap(),
            (0..8).map(|_| vec![1, 0]).collect(),
        );
        let handle = TopologyHandle::new(snap);

        // Partition 5's master is 2; server 2 rejected it.
        assert_eq!(handle.remap_rejected(5, 2), Some(1));
        assert_eq!(handle.snapshot().master(5), Some(1));
    }

    #[test]
    fn test_remap_stale_rejection_leaves_table_alone() {
        let handle = TopologyHandle::new(TopologySnapshot::generate(4, 1, 8).unwrap());
        let before = handle.snapshot();

        assert_eq!(handle.remap_rejected(5, 3), Some(2));
        assert_eq!(handle.snapshot().master(5), Some(2));
        // Same Arc: nothing was swapped.
        assert!(Arc::ptr_eq(&before, &handle.snapshot()));
    }

    #[test]
    fn test_remap_does_not_disturb_held_snapshots() {
        let handle = TopologyHandle::new(TopologySnapshot::generate(4, 1, 8).unwrap());
        let held = handle.snapshot();

        assert_eq!(handle.remap_rejected(5, 2), Some(3));

        // The reader's snapshot still shows the old assignment; the
        // handle's current one shows the new.
        assert_eq!(held.master(5), Some(2));
        assert_eq!(handle.snapshot().master(5), Some(3));
    }

    #[test]
    fn test_remap_exhaustion_returns_none_and_keeps_snapshot() {
        let mut snap = TopologySnapshot::generate(4, 1, 8).unwrap();
        for ix in [0, 1, 3] {
            snap.servers[ix].set_owned_partitions(0);
        }
        let handle = TopologyHandle::new(snap);
        let before = handle.snapshot();

        assert_eq!(handle.remap_rejected(5, 2), None);
        assert!(Arc::ptr_eq(&before, &handle.snapshot()));
    }

    #[test]
    fn test_route_follows_adoption() {
        let handle = TopologyHandle::new(TopologySnapshot::generate(4, 1, 8).unwrap());
        let loc = handle.route(b"foo");
        assert!(loc.server.is_some());

        handle.adopt(TopologySnapshot::generate(4, 1, 8).unwrap().into_ketama());
        assert_eq!(handle.snapshot().distribution(), Distribution::Ketama);
        let loc = handle.route(b"foo");
        assert_eq!(loc.partition, 0);
        assert!(loc.server.is_some());
    }
}
