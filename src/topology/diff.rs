//! Comparing topology snapshots across revisions.
//!
//! Servers are matched across snapshots by their authority string. The diff
//! is an ephemeral value: computed when a new snapshot arrives, consumed to
//! decide how much reconfiguration work is needed, then discarded.

use crate::topology::TopologySnapshot;

/// How many partitions changed masters between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionChanges {
    /// Both snapshots had the same partition count; this many masters moved.
    Count(usize),
    /// The partition counts differ; treat every partition as changed.
    Incomparable,
}

/// What changed between two topology snapshots.
#[derive(Debug, Clone)]
pub struct TopologyDiff {
    servers_added: Vec<String>,
    servers_removed: Vec<String>,
    sequence_changed: bool,
    partition_changes: PartitionChanges,
}

impl TopologyDiff {
    /// Compare two snapshots, `from` being the older one.
    pub fn between(from: &TopologySnapshot, to: &TopologySnapshot) -> Self {
        let servers_added = authority_difference(to, from);
        let servers_removed = authority_difference(from, to);

        let sequence_changed = if from.num_servers() != to.num_servers() {
            true
        } else {
            from.servers()
                .iter()
                .zip(to.servers())
                .any(|(a, b)| a.authority() != b.authority())
        };

        let partition_changes = if from.num_partitions() == to.num_partitions() {
            match (from.partition_table(), to.partition_table()) {
                (Some(old), Some(new)) => PartitionChanges::Count(
                    old.masters()
                        .zip(new.masters())
                        .filter(|(a, b)| a != b)
                        .count(),
                ),
                _ => PartitionChanges::Count(0),
            }
        } else {
            PartitionChanges::Incomparable
        };

        Self {
            servers_added,
            servers_removed,
            sequence_changed,
            partition_changes,
        }
    }

    /// Authorities present in the newer snapshot but not the older one.
    pub fn servers_added(&self) -> &[String] {
        &self.servers_added
    }

    /// Authorities present in the older snapshot but not the newer one.
    pub fn servers_removed(&self) -> &[String] {
        &self.servers_removed
    }

    /// True if the server counts differ, or any position holds a different
    /// server than before.
    pub fn sequence_changed(&self) -> bool {
        self.sequence_changed
    }

    /// How many partition masters moved.
    pub fn partition_changes(&self) -> PartitionChanges {
        self.partition_changes
    }

    /// True if any partition ownership changed. Callers seeing only this
    /// flag can patch routing state without resubscribing.
    pub fn is_map_modified(&self) -> bool {
        self.partition_changes != PartitionChanges::Count(0)
    }

    /// True if the server set or order changed. Callers typically tear down
    /// and rebuild per-server state when this is set.
    pub fn is_servers_modified(&self) -> bool {
        !self.servers_added.is_empty() || !self.servers_removed.is_empty() || self.sequence_changed
    }

    /// True when nothing observable changed.
    pub fn is_unchanged(&self) -> bool {
        !self.is_map_modified() && !self.is_servers_modified()
    }
}

impl TopologySnapshot {
    /// Diff this snapshot against a newer one.
    pub fn diff(&self, newer: &TopologySnapshot) -> TopologyDiff {
        TopologyDiff::between(self, newer)
    }
}

/// Authorities of `left` that do not appear in `right`, in `left` order.
fn authority_difference(left: &TopologySnapshot, right: &TopologySnapshot) -> Vec<String> {
    left.servers()
        .iter()
        .filter(|srv| {
            !right
                .servers()
                .iter()
                .any(|other| other.authority() == srv.authority())
        })
        .map(|srv| srv.authority().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(hosts: &[&str], map: &str) -> String {
        let nodes: Vec<String> = hosts
            .iter()
            .map(|h| format!(r#"{{"hostname": "{}", "services": {{"kv": 11210}}}}"#, h))
            .collect();
        format!(
            r#"{{
                "name": "default",
                "nodeLocator": "vbucket",
                "nodesExt": [{}],
                "vBucketServerMap": {{"numReplicas": 1, "vBucketMap": {}}}
            }}"#,
            nodes.join(","),
            map
        )
    }

    fn parse(hosts: &[&str], map: &str) -> TopologySnapshot {
        TopologySnapshot::parse_str(&descriptor(hosts, map)).unwrap()
    }

    #[test]
    fn test_self_diff_is_empty() {
        let snap = parse(&["a", "b", "c"], "[[0, 1], [1, 2], [2, 0]]");
        let diff = snap.diff(&snap);
        assert!(diff.servers_added().is_empty());
        assert!(diff.servers_removed().is_empty());
        assert!(!diff.sequence_changed());
        assert_eq!(diff.partition_changes(), PartitionChanges::Count(0));
        assert!(diff.is_unchanged());
        assert!(!diff.is_map_modified());
        assert!(!diff.is_servers_modified());
    }

    #[test]
    fn test_appended_server_with_untouched_map() {
        let old = parse(&["a", "b", "c"], "[[0, 1], [1, 2], [2, 0]]");
        let new = parse(&["a", "b", "c", "d"], "[[0, 1], [1, 2], [2, 0]]");

        let diff = old.diff(&new);
        assert_eq!(diff.servers_added(), ["d:11210"]);
        assert!(diff.servers_removed().is_empty());
        assert_eq!(diff.partition_changes(), PartitionChanges::Count(0));
        assert!(diff.sequence_changed());
        assert!(diff.is_servers_modified());
        assert!(!diff.is_map_modified());
    }

    #[test]
    fn test_replaced_server() {
        let old = parse(&["a", "b"], "[[0, 1], [1, 0]]");
        let new = parse(&["a", "c"], "[[0, 1], [1, 0]]");

        let diff = old.diff(&new);
        assert_eq!(diff.servers_added(), ["c:11210"]);
        assert_eq!(diff.servers_removed(), ["b:11210"]);
        assert!(diff.sequence_changed());
    }

    #[test]
    fn test_master_moves_are_counted() {
        let old = parse(&["a", "b"], "[[0, 1], [1, 0], [0, 1], [1, 0]]");
        let new = parse(&["a", "b"], "[[1, 0], [1, 0], [1, 0], [1, 0]]");

        let diff = old.diff(&new);
        assert_eq!(diff.partition_changes(), PartitionChanges::Count(2));
        assert!(diff.is_map_modified());
        // Replica-only changes don't count; same servers, same order.
        assert!(!diff.is_servers_modified());
    }

    #[test]
    fn test_reordered_servers_flip_sequence_only() {
        let old = parse(&["a", "b"], "[[0, 1], [1, 0]]");
        let new = parse(&["b", "a"], "[[0, 1], [1, 0]]");

        let diff = old.diff(&new);
        assert!(diff.servers_added().is_empty());
        assert!(diff.servers_removed().is_empty());
        assert!(diff.sequence_changed());
        assert!(diff.is_servers_modified());
    }

    #[test]
    fn test_mismatched_partition_counts_are_incomparable() {
        let old = parse(&["a", "b"], "[[0, 1], [1, 0]]");
        let new = parse(&["a", "b"], "[[0, 1], [1, 0], [0, 1], [1, 0]]");

        let diff = old.diff(&new);
        assert_eq!(diff.partition_changes(), PartitionChanges::Incomparable);
        assert!(diff.is_map_modified());
    }
}
