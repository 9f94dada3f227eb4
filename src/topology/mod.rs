//! Cluster topology: descriptor parsing, server records, snapshots, and
//! revision-to-revision diffing.

pub mod diff;
pub mod parser;
pub mod server;
pub mod snapshot;

pub use diff::{PartitionChanges, TopologyDiff};
pub use server::{Server, ServicePorts};
pub use snapshot::TopologySnapshot;
