//! Client-side cluster topology and key routing for partitioned key-value
//! clusters.
//!
//! This crate turns a serialized cluster descriptor into an immutable
//! [`TopologySnapshot`] that answers one question deterministically: which
//! node owns this key? Two distribution modes are supported:
//!
//! - **vbucket** — keys hash (CRC-32) onto a fixed set of partitions; a
//!   partition table maps each partition to a master and its replicas.
//! - **ketama** — keys hash (MD5) directly onto a sorted ring of per-server
//!   points; no partition table exists.
//!
//! Around that core, the crate tracks topology churn: it diffs successive
//! cluster revisions ([`TopologyDiff`]), recovers when a node rejects a
//! request for a partition it no longer owns (the copy-on-write remap on
//! [`TopologyHandle`]), and substitutes the `$HOST` placeholder that
//! single-node clusters emit before they know their external address.
//!
//! # Example
//!
//! ```
//! use rudder::{TopologyHandle, TopologySnapshot};
//!
//! let descriptor = r#"{
//!     "name": "travel",
//!     "nodeLocator": "vbucket",
//!     "nodesExt": [
//!         {"hostname": "10.0.0.1", "services": {"kv": 11210, "mgmt": 8091}},
//!         {"hostname": "10.0.0.2", "services": {"kv": 11210, "mgmt": 8091}}
//!     ],
//!     "vBucketServerMap": {
//!         "numReplicas": 1,
//!         "vBucketMap": [[0, 1], [1, 0]]
//!     }
//! }"#;
//!
//! let snapshot = TopologySnapshot::parse_str(descriptor)?;
//! let handle = TopologyHandle::new(snapshot);
//!
//! let location = handle.route(b"user::1234");
//! assert!(location.server.is_some());
//!
//! // A node rejected the partition it used to own: ask for the next one.
//! if let Some(server) = location.server {
//!     let _retry = handle.remap_rejected(location.partition as usize, server);
//! }
//! # Ok::<(), rudder::Error>(())
//! ```
//!
//! # Concurrency
//!
//! Snapshots are immutable once published. [`TopologyHandle`] hands out
//! `Arc` clones for lock-free routing; adoption of a new topology and the
//! remap path swap the `Arc` under a single writer lock, so readers never
//! observe a half-updated table. A snapshot a reader still holds stays
//! valid until dropped.
//!
//! Request execution, retries, authentication, and connection management
//! are intentionally out of scope: callers feed this engine descriptors and
//! rejection events, and consume server indices.

pub mod error;
pub mod handle;
pub mod routing;
pub mod topology;
pub mod types;

pub use error::{DescriptorError, Error, Result};
pub use handle::TopologyHandle;
pub use routing::{KetamaRing, KeyLocation, PartitionTable, RingPoint};
pub use topology::{
    PartitionChanges, Server, ServicePorts, TopologyDiff, TopologySnapshot,
};
pub use types::{Distribution, ServiceMode, ServiceType, HOST_PLACEHOLDER, KETAMA_LOCATOR};
