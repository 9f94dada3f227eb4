//! Key-to-server routing over a topology snapshot.
//!
//! Both paths are pure reads: the same key against the same snapshot always
//! routes identically, and nothing here allocates or mutates.

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::routing::KetamaRing;
use crate::topology::snapshot::{Layout, TopologySnapshot};

/// CRC-32 (IEEE) used to hash keys onto partitions.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Where a key routes: its partition and the owning server index.
///
/// In ketama mode no partition id is meaningful and it is reported as 0.
/// `server` is `None` when the partition's master is unassigned (or, in
/// ketama mode, when the ring is empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLocation {
    /// Partition index the key hashes to.
    pub partition: u32,
    /// Index of the server to contact.
    pub server: Option<usize>,
}

impl TopologySnapshot {
    /// The partition a key hashes to: CRC-32 of the key modulo the
    /// partition count. `None` in ketama mode.
    pub fn key_partition(&self, key: &[u8]) -> Option<u32> {
        match &self.layout {
            Layout::VBucket { table, .. } if !table.is_empty() => {
                Some(CRC32.checksum(key) % table.len() as u32)
            }
            _ => None,
        }
    }

    /// Route a key to its partition and owning server.
    pub fn map_key(&self, key: &[u8]) -> KeyLocation {
        match &self.layout {
            Layout::Ketama { ring } => KeyLocation {
                partition: 0,
                server: ring.locate(KetamaRing::key_digest(key)),
            },
            Layout::VBucket { .. } => match self.key_partition(key) {
                Some(partition) => KeyLocation {
                    partition,
                    server: self.master(partition as usize),
                },
                None => KeyLocation {
                    partition: 0,
                    server: None,
                },
            },
        }
    }

    /// The master server index for a partition, or `None` if unassigned or
    /// out of range (vbucket mode only).
    pub fn master(&self, partition: usize) -> Option<usize> {
        match &self.layout {
            Layout::VBucket { table, .. } if partition < table.len() => table.master(partition),
            _ => None,
        }
    }

    /// The `n`th replica's server index for a partition (vbucket mode only).
    pub fn replica(&self, partition: usize, n: usize) -> Option<usize> {
        match &self.layout {
            Layout::VBucket { table, .. } if partition < table.len() => {
                table.replica(partition, n)
            }
            _ => None,
        }
    }

    /// True if `server` holds the partition as master or replica.
    pub fn has_partition(&self, partition: usize, server: usize) -> bool {
        match &self.layout {
            Layout::VBucket { table, .. } if partition < table.len() => {
                table.contains(partition, server)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologySnapshot;
    use crate::types::Distribution;

    #[test]
    fn test_vbucket_routing_is_deterministic_and_in_range() {
        let snap = TopologySnapshot::generate(4, 1, 8).unwrap();
        for key in [&b"foo"[..], b"bar", b"user::1234", b"", b"\x00\xff"] {
            let first = snap.map_key(key);
            assert!(first.partition < 8);
            assert!(first.server.is_some());
            assert!(first.server.unwrap() < 4);
            for _ in 0..4 {
                assert_eq!(snap.map_key(key), first);
            }
        }
    }

    #[test]
    fn test_vbucket_partition_is_crc32_mod_count() {
        // crc32("foo") = 0x8c736521; 0x8c736521 % 8 == 1.
        let snap = TopologySnapshot::generate(4, 1, 8).unwrap();
        assert_eq!(snap.key_partition(b"foo"), Some(1));
        let loc = snap.map_key(b"foo");
        assert_eq!(loc.partition, 1);
        assert_eq!(loc.server, snap.master(1));
    }

    #[test]
    fn test_non_power_of_two_partition_count() {
        let snap = TopologySnapshot::generate(3, 0, 7).unwrap();
        for i in 0..64u32 {
            let key = format!("key-{}", i);
            let loc = snap.map_key(key.as_bytes());
            assert!(loc.partition < 7);
            assert_eq!(loc.server, Some(loc.partition as usize % 3));
        }
    }

    #[test]
    fn test_ketama_routing_matches_ring_scan() {
        let snap = TopologySnapshot::generate(3, 0, 8).unwrap().into_ketama();
        assert_eq!(snap.distribution(), Distribution::Ketama);

        let ring = snap.ring().unwrap();
        for key in [&b"foo"[..], b"bar", b"baz", b"another key"] {
            let loc = snap.map_key(key);
            assert_eq!(loc.partition, 0);

            // The routed server must match a linear scan for the smallest
            // point >= the key's folded digest, wrapping to the first point.
            let digest = KetamaRing::key_digest(key);
            let expect = ring
                .points()
                .iter()
                .find(|p| p.point >= digest)
                .unwrap_or(&ring.points()[0]);
            assert_eq!(loc.server, Some(expect.server as usize));
        }
    }

    #[test]
    fn test_ketama_key_is_stable_across_calls() {
        let snap = TopologySnapshot::generate(3, 0, 8).unwrap().into_ketama();
        let first = snap.map_key(b"foo").server.unwrap();
        assert!(first < 3);
        for _ in 0..16 {
            assert_eq!(snap.map_key(b"foo").server, Some(first));
        }
    }

    #[test]
    fn test_replica_and_membership_lookups() {
        let snap = TopologySnapshot::generate(4, 1, 8).unwrap();
        assert_eq!(snap.master(0), Some(0));
        assert_eq!(snap.replica(0, 0), Some(1));
        assert_eq!(snap.replica(0, 1), None);
        assert!(snap.has_partition(0, 0));
        assert!(snap.has_partition(0, 1));
        assert!(!snap.has_partition(0, 2));
        // Out of range partitions never match.
        assert_eq!(snap.master(99), None);
        assert!(!snap.has_partition(99, 0));
    }

    #[test]
    fn test_ketama_snapshot_has_no_partitions() {
        let snap = TopologySnapshot::generate(3, 0, 8).unwrap().into_ketama();
        assert_eq!(snap.key_partition(b"foo"), None);
        assert_eq!(snap.master(0), None);
        assert_eq!(snap.replica(0, 0), None);
        assert!(!snap.has_partition(0, 0));
    }
}
