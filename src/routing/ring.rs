//! Consistent-hash ring for ketama-mode distribution.
//!
//! Each server contributes 160 points to the ring: 40 sequential labels of
//! the form `<authority>-<n>`, each hashed with MD5, each 16-byte digest
//! split into four little-endian 32-bit words. Keys hash onto the ring with
//! the same digest (first four bytes, folded little-endian) and route to the
//! server owning the next point at or above the key's position.

use md5::{Digest, Md5};

use crate::topology::Server;

/// Hash labels generated per server.
const LABELS_PER_SERVER: u32 = 40;

/// Ring points carved out of each 16-byte label digest.
const POINTS_PER_LABEL: usize = 4;

/// One position on the ring: a hash point owned by a server index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingPoint {
    /// Position on the 32-bit ring.
    pub point: u32,
    /// Index into the snapshot's server list.
    pub server: u32,
}

/// A sorted ring of per-server hash points.
///
/// Points are ordered ascending by `(point, server)`: hash collisions
/// between servers break ties by server index, so rebuilds from the same
/// server set always produce the same ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KetamaRing {
    points: Vec<RingPoint>,
}

impl KetamaRing {
    /// Build the ring for a server list.
    ///
    /// Sorts `servers` by authority first so that rebuilds are deterministic
    /// across otherwise-equivalent inputs; ring points index into the sorted
    /// order, which becomes the snapshot's server order.
    pub(crate) fn build(servers: &mut [Server]) -> Self {
        servers.sort_by(|a, b| a.authority().cmp(b.authority()));

        let mut points = Vec::with_capacity(
            servers.len() * LABELS_PER_SERVER as usize * POINTS_PER_LABEL,
        );
        for (ix, srv) in servers.iter().enumerate() {
            for label in 0..LABELS_PER_SERVER {
                let digest = Md5::digest(format!("{}-{}", srv.authority(), label));
                for word in 0..POINTS_PER_LABEL {
                    let off = word * 4;
                    let point = u32::from_le_bytes([
                        digest[off],
                        digest[off + 1],
                        digest[off + 2],
                        digest[off + 3],
                    ]);
                    points.push(RingPoint {
                        point,
                        server: ix as u32,
                    });
                }
            }
        }

        points.sort_unstable_by_key(|p| (p.point, p.server));
        Self { points }
    }

    /// Map a key's folded digest to a server index: the first point with
    /// hash >= `digest`, wrapping to the ring's first point past the end.
    /// `None` only for an empty ring.
    pub fn locate(&self, digest: u32) -> Option<usize> {
        if self.points.is_empty() {
            return None;
        }
        let ix = self.points.partition_point(|p| p.point < digest);
        let point = if ix == self.points.len() {
            &self.points[0]
        } else {
            &self.points[ix]
        };
        Some(point.server as usize)
    }

    /// Fold a key into its 32-bit ring position: the first four bytes of its
    /// MD5 digest, little-endian.
    pub fn key_digest(key: &[u8]) -> u32 {
        let digest = Md5::digest(key);
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    /// Total number of points on the ring.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True if the ring has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The sorted points, ascending by `(point, server)`.
    pub fn points(&self) -> &[RingPoint] {
        &self.points
    }
}
