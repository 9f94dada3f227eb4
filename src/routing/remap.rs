//! Recovery from ownership rejections ("not my partition").
//!
//! When a server rejects a request because it no longer owns the key's
//! partition, the remapper decides which server to try next. Planning is a
//! pure read over the snapshot; the resulting patched table is applied by
//! [`TopologyHandle`](crate::TopologyHandle) as a copy-on-write swap, so
//! concurrent readers never observe a half-updated row.
//!
//! Liveness is approximated by partition-ownership counts: this layer has no
//! visibility into actual network health, so a server owning at least one
//! partition is assumed to be a legitimate cluster member. Real liveness is
//! the RPC layer's concern.

use crate::routing::PartitionTable;
use crate::topology::snapshot::{Layout, TopologySnapshot};

/// Outcome of planning a remap for one rejected partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RemapPlan {
    /// The table already points somewhere else (a concurrent remap happened,
    /// or the caller had stale information). Use the current master.
    Unchanged(usize),
    /// A new master was chosen; `table` is the patched replacement.
    Updated {
        master: usize,
        table: PartitionTable,
    },
    /// No valid node to retry against.
    NoAlternative,
}

impl TopologySnapshot {
    /// Plan the next node for `partition` after `rejected` refused it.
    ///
    /// Preference order: the forward table's row for the partition (copied
    /// wholesale into the patch), then a linear probe starting just past the
    /// rejecting server for any server still owning partitions. Never
    /// selects `rejected` itself.
    pub(crate) fn plan_remap(&self, partition: usize, rejected: usize) -> RemapPlan {
        let Layout::VBucket { table, forward } = &self.layout else {
            return RemapPlan::NoAlternative;
        };
        if partition >= table.len() {
            return RemapPlan::NoAlternative;
        }

        let current = table.row(partition)[0];
        if current != rejected as i32 {
            return match usize::try_from(current) {
                Ok(ix) => RemapPlan::Unchanged(ix),
                Err(_) => RemapPlan::NoAlternative,
            };
        }

        let mut patched = table.clone();
        let mut candidate = current;
        if let Some(fwd) = forward {
            patched.copy_row_from(fwd, partition);
            candidate = patched.row(partition)[0];
        }

        if candidate == rejected as i32 {
            // No forward table, or it still names the rejecting server:
            // probe the server list once, skipping servers that own nothing.
            let nservers = self.servers.len();
            let found = (1..=nservers)
                .map(|step| (rejected + step) % nservers)
                .find(|&ix| self.servers[ix].owned_partitions() > 0);
            match found {
                Some(ix) if ix != rejected => {
                    patched.set_master(partition, ix);
                    candidate = ix as i32;
                }
                _ => return RemapPlan::NoAlternative,
            }
        }

        match usize::try_from(candidate) {
            Ok(master) if master != rejected => RemapPlan::Updated {
                master,
                table: patched,
            },
            _ => RemapPlan::NoAlternative,
        }
    }
}
