//! Key routing: partition tables, the consistent-hash ring, key-to-server
//! mapping, and ownership-rejection recovery.

pub mod partition;
pub mod remap;
pub mod ring;
pub mod router;

pub use partition::PartitionTable;
pub use ring::{KetamaRing, RingPoint};
pub use router::KeyLocation;

pub(crate) use remap::RemapPlan;
