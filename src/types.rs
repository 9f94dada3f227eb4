//! Core types shared across the topology and routing modules.

use serde::{Deserialize, Serialize};

/// Placeholder hostname emitted by single-node clusters that do not yet know
/// their externally visible address. Substituted via
/// [`TopologySnapshot::substitute_host`](crate::TopologySnapshot::substitute_host).
pub const HOST_PLACEHOLDER: &str = "$HOST";

/// The `nodeLocator` value that selects consistent-hash distribution.
/// Any other value selects partition-table distribution.
pub const KETAMA_LOCATOR: &str = "ketama";

/// Sentinel for an unassigned slot in a partition row.
pub const UNASSIGNED: i32 = -1;

/// Upper bound on the replica count a descriptor may declare.
pub const MAX_REPLICAS: usize = 4;

/// How keys are distributed across the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Distribution {
    /// Keys hash to a fixed partition; a partition table maps partitions to
    /// server indices.
    VBucket,
    /// Keys hash directly onto a sorted ring of per-server points; no
    /// partition table exists.
    Ketama,
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distribution::VBucket => write!(f, "vbucket"),
            Distribution::Ketama => write!(f, "ketama"),
        }
    }
}

/// A service a cluster node may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    /// Key-value data service.
    Data,
    /// Cluster management REST API.
    Management,
    /// View (map/reduce) API.
    Views,
    /// Query service.
    Query,
    /// Index administration.
    IndexAdmin,
    /// Index scan/query.
    IndexQuery,
}

impl ServiceType {
    /// Number of distinct service types.
    pub const COUNT: usize = 6;

    /// All service types, in wire order.
    pub const ALL: [ServiceType; Self::COUNT] = [
        ServiceType::Data,
        ServiceType::Management,
        ServiceType::Views,
        ServiceType::Query,
        ServiceType::IndexAdmin,
        ServiceType::IndexQuery,
    ];

    /// Stable slot index, used for the per-server endpoint cache.
    pub(crate) fn slot(self) -> usize {
        match self {
            ServiceType::Data => 0,
            ServiceType::Management => 1,
            ServiceType::Views => 2,
            ServiceType::Query => 3,
            ServiceType::IndexAdmin => 4,
            ServiceType::IndexQuery => 5,
        }
    }
}

/// Transport security for a service endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceMode {
    /// Cleartext transport.
    Plain,
    /// TLS transport.
    Tls,
}

impl ServiceMode {
    /// Stable slot index, used for the per-server endpoint cache.
    pub(crate) fn slot(self) -> usize {
        match self {
            ServiceMode::Plain => 0,
            ServiceMode::Tls => 1,
        }
    }
}
