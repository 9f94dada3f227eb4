//! The topology snapshot: one immutable view of the cluster.

use rand::Rng;
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::routing::{KetamaRing, PartitionTable};
use crate::topology::{parser, Server, ServicePorts};
use crate::types::{Distribution, ServiceMode, ServiceType, MAX_REPLICAS};

/// Mode-specific routing state. Exactly one of the partition table or the
/// ring exists, selected by the distribution mode.
#[derive(Debug, Clone)]
pub(crate) enum Layout {
    VBucket {
        table: PartitionTable,
        forward: Option<PartitionTable>,
    },
    Ketama {
        ring: KetamaRing,
    },
}

/// One immutable view of the cluster: bucket identity, server list, and the
/// routing structure for its distribution mode.
///
/// Snapshots are built whole (parse, generation, or copy-on-write patch) and
/// never mutated while shared; concurrent readers each hold a consistent
/// view. Replacement happens through
/// [`TopologyHandle`](crate::TopologyHandle).
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub(crate) name: String,
    pub(crate) uuid: Option<String>,
    pub(crate) revision: Option<u32>,
    pub(crate) servers: Vec<Server>,
    pub(crate) layout: Layout,
}

impl TopologySnapshot {
    pub(crate) fn from_parts(
        name: String,
        uuid: Option<String>,
        revision: Option<u32>,
        servers: Vec<Server>,
        layout: Layout,
    ) -> Self {
        Self {
            name,
            uuid,
            revision,
            servers,
            layout,
        }
    }

    /// Parse a snapshot from a decoded descriptor tree.
    pub fn parse_value(descriptor: &Value) -> Result<Self> {
        parser::parse(descriptor)
    }

    /// Parse a snapshot from descriptor text.
    pub fn parse_str(descriptor: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(descriptor)?;
        parser::parse(&value)
    }

    /// Bucket name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket UUID, when the descriptor carried one.
    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Topology revision; `None` means unknown.
    pub fn revision(&self) -> Option<u32> {
        self.revision
    }

    /// Distribution mode.
    pub fn distribution(&self) -> Distribution {
        match self.layout {
            Layout::VBucket { .. } => Distribution::VBucket,
            Layout::Ketama { .. } => Distribution::Ketama,
        }
    }

    /// Number of servers.
    pub fn num_servers(&self) -> usize {
        self.servers.len()
    }

    /// Replica slots per partition. Zero in ketama mode.
    pub fn num_replicas(&self) -> usize {
        match &self.layout {
            Layout::VBucket { table, .. } => table.replicas(),
            Layout::Ketama { .. } => 0,
        }
    }

    /// Number of partitions. Zero in ketama mode.
    pub fn num_partitions(&self) -> usize {
        match &self.layout {
            Layout::VBucket { table, .. } => table.len(),
            Layout::Ketama { .. } => 0,
        }
    }

    /// The ordered server list.
    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    /// One server by index.
    pub fn server(&self, ix: usize) -> Option<&Server> {
        self.servers.get(ix)
    }

    /// The live partition table (vbucket mode only).
    pub fn partition_table(&self) -> Option<&PartitionTable> {
        match &self.layout {
            Layout::VBucket { table, .. } => Some(table),
            Layout::Ketama { .. } => None,
        }
    }

    /// The forward (rebalance-target) partition table, when present.
    pub fn forward_table(&self) -> Option<&PartitionTable> {
        match &self.layout {
            Layout::VBucket { forward, .. } => forward.as_ref(),
            Layout::Ketama { .. } => None,
        }
    }

    /// The consistent-hash ring (ketama mode only).
    pub fn ring(&self) -> Option<&KetamaRing> {
        match &self.layout {
            Layout::VBucket { .. } => None,
            Layout::Ketama { ring } => Some(ring),
        }
    }

    pub(crate) fn replace_partition_table(&mut self, table: PartitionTable) {
        if let Layout::VBucket { table: live, .. } = &mut self.layout {
            *live = table;
        }
    }

    /// The port a server offers for a service, if any.
    pub fn port(&self, ix: usize, service: ServiceType, mode: ServiceMode) -> Option<u16> {
        self.server(ix)?.port(service, mode)
    }

    /// The composed `host:port` string for a server's service, if offered.
    pub fn hostport(&self, ix: usize, service: ServiceType, mode: ServiceMode) -> Option<&str> {
        self.server(ix)?.hostport(service, mode)
    }

    /// The full URL for a server's path-bearing service (views or query).
    pub fn service_url(&self, ix: usize, service: ServiceType, mode: ServiceMode) -> Option<&str> {
        self.server(ix)?.service_url(service, mode)
    }

    /// Pick a random server index offering the given service, probing
    /// forward from a random starting point. `None` when no server does.
    pub fn random_service_node(&self, service: ServiceType, mode: ServiceMode) -> Option<usize> {
        if self.servers.is_empty() {
            return None;
        }
        let start = rand::thread_rng().gen_range(0..self.servers.len());
        (0..self.servers.len())
            .map(|step| (start + step) % self.servers.len())
            .find(|&ix| self.servers[ix].port(service, mode).is_some())
    }

    /// Substitute the hostname placeholder with a concrete host on every
    /// server, rewriting authorities and derived endpoint strings.
    pub fn substitute_host(&mut self, host: &str) {
        for srv in &mut self.servers {
            srv.substitute_host(host);
        }
    }

    /// Re-serialize the snapshot as a current-dialect descriptor, primarily
    /// for cache persistence between process restarts. Forward tables and
    /// the legacy server-order list are not emitted.
    pub fn to_descriptor(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "nodeLocator".to_string(),
            json!(self.distribution().to_string()),
        );
        if let Some(uuid) = &self.uuid {
            root.insert("uuid".to_string(), json!(uuid));
        }
        if let Some(rev) = self.revision {
            root.insert("rev".to_string(), json!(rev));
        }
        root.insert("name".to_string(), json!(self.name));

        let nodes: Vec<Value> = self
            .servers
            .iter()
            .map(|srv| {
                let mut services = Map::new();
                for (mode, suffix) in [(ServiceMode::Plain, ""), (ServiceMode::Tls, "SSL")] {
                    for (svc, key) in [
                        (ServiceType::Management, "mgmt"),
                        (ServiceType::Views, "capi"),
                        (ServiceType::Data, "kv"),
                        (ServiceType::Query, "n1ql"),
                        (ServiceType::IndexQuery, "indexScan"),
                        (ServiceType::IndexAdmin, "indexAdmin"),
                    ] {
                        if let Some(port) = srv.port(svc, mode) {
                            services.insert(format!("{}{}", key, suffix), json!(port));
                        }
                    }
                }
                json!({"hostname": srv.hostname(), "services": services})
            })
            .collect();
        root.insert("nodesExt".to_string(), Value::Array(nodes));

        if let Layout::VBucket { table, .. } = &self.layout {
            let rows: Vec<Value> = (0..table.len())
                .map(|p| Value::Array(table.row(p).iter().map(|&s| json!(s)).collect()))
                .collect();
            root.insert(
                "vBucketServerMap".to_string(),
                json!({
                    "numReplicas": table.replicas(),
                    "vBucketMap": rows,
                }),
            );
        }

        Value::Object(root)
    }

    /// [`to_descriptor`](Self::to_descriptor), rendered as compact JSON text.
    pub fn to_json_string(&self) -> String {
        self.to_descriptor().to_string()
    }

    /// Synthesize a vbucket snapshot over `localhost` servers with
    /// round-robin partition assignment, for tests and bootstrap tooling.
    pub fn generate(nservers: usize, nreplicas: usize, npartitions: usize) -> Result<Self> {
        let servers = (0..nservers)
            .map(|i| {
                Server::new(
                    "localhost".to_string(),
                    ServicePorts {
                        data: Some(1000 + i as u16),
                        views: Some(2000 + i as u16),
                        management: Some(3000 + i as u16),
                        ..ServicePorts::default()
                    },
                    ServicePorts::default(),
                    Some("/default".to_string()),
                    None,
                )
            })
            .collect();
        Self::generate_with_servers("default", None, servers, nreplicas, npartitions)
    }

    /// Synthesize a vbucket snapshot over explicit servers. Partition `p`
    /// gets master `p % nservers` and replicas on the following indices.
    pub fn generate_with_servers(
        name: &str,
        uuid: Option<&str>,
        mut servers: Vec<Server>,
        nreplicas: usize,
        npartitions: usize,
    ) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::Generation("server list is empty".to_string()));
        }
        if npartitions == 0 {
            return Err(Error::Generation("partition count is zero".to_string()));
        }
        if nreplicas >= servers.len() {
            return Err(Error::Generation(format!(
                "replica count {} must be less than server count {}",
                nreplicas,
                servers.len()
            )));
        }
        if nreplicas > MAX_REPLICAS {
            return Err(Error::Generation(format!(
                "replica count {} exceeds the maximum of {}",
                nreplicas, MAX_REPLICAS
            )));
        }

        let nservers = servers.len();
        let mut table = PartitionTable::new(npartitions, nreplicas);
        let mut row = vec![0i32; nreplicas + 1];
        for p in 0..npartitions {
            let master = p % nservers;
            for (slot, entry) in row.iter_mut().enumerate() {
                *entry = ((master + slot) % nservers) as i32;
            }
            table.set_row(p, &row);
        }

        let mut counts = vec![0u32; nservers];
        table.accumulate_ownership(&mut counts);
        for (srv, count) in servers.iter_mut().zip(counts) {
            srv.set_owned_partitions(count);
        }

        Ok(Self::from_parts(
            name.to_string(),
            uuid.map(str::to_string),
            None,
            servers,
            Layout::VBucket {
                table,
                forward: None,
            },
        ))
    }

    /// Convert the snapshot to ketama distribution, rebuilding the server
    /// order and ring. A no-op for snapshots already in ketama mode.
    pub fn into_ketama(mut self) -> Self {
        if matches!(self.layout, Layout::Ketama { .. }) {
            return self;
        }
        let ring = KetamaRing::build(&mut self.servers);
        self.layout = Layout::Ketama { ring };
        self
    }
}
