//! Per-node records: hostnames, service ports, and endpoint strings.

use std::sync::OnceLock;

use crate::error::{DescriptorError, Result};
use crate::types::{ServiceMode, ServiceType, HOST_PLACEHOLDER};

/// Port numbers for every service a node may offer over one transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServicePorts {
    /// Key-value data port.
    pub data: Option<u16>,
    /// Management REST port.
    pub management: Option<u16>,
    /// Views API port.
    pub views: Option<u16>,
    /// Query service port.
    pub query: Option<u16>,
    /// Index administration port.
    pub index_admin: Option<u16>,
    /// Index scan port.
    pub index_query: Option<u16>,
}

impl ServicePorts {
    /// The port for a service, if offered.
    pub fn get(&self, service: ServiceType) -> Option<u16> {
        match service {
            ServiceType::Data => self.data,
            ServiceType::Management => self.management,
            ServiceType::Views => self.views,
            ServiceType::Query => self.query,
            ServiceType::IndexAdmin => self.index_admin,
            ServiceType::IndexQuery => self.index_query,
        }
    }
}

/// Lazily composed endpoint strings, filled on first access.
///
/// Reset wholesale when the hostname changes (placeholder substitution);
/// every cached string re-derives from the hostname and a port.
#[derive(Debug, Clone, Default)]
struct EndpointCache {
    hostports: [[OnceLock<String>; ServiceType::COUNT]; 2],
    view_urls: [OnceLock<String>; 2],
    query_urls: [OnceLock<String>; 2],
}

/// One cluster node: address, service ports, and derived endpoint strings.
///
/// The authority string (`host:port` of the plain data service) is the
/// node's identity key: topology diffs join servers across revisions on it,
/// and the consistent-hash ring derives its points from it. Authorities are
/// expected to be unique within a snapshot.
#[derive(Debug, Clone)]
pub struct Server {
    hostname: String,
    authority: String,
    plain: ServicePorts,
    tls: ServicePorts,
    view_path: Option<String>,
    query_path: Option<String>,
    owned_partitions: u32,
    cache: EndpointCache,
}

impl Server {
    /// Create a server record; the authority is derived immediately from the
    /// hostname and plain data port.
    pub(crate) fn new(
        hostname: String,
        plain: ServicePorts,
        tls: ServicePorts,
        view_path: Option<String>,
        query_path: Option<String>,
    ) -> Self {
        let authority = compose_authority(&hostname, plain.data);
        Self {
            hostname,
            authority,
            plain,
            tls,
            view_path,
            query_path,
            owned_partitions: 0,
            cache: EndpointCache::default(),
        }
    }

    /// Synthesize a placeholder record from a bare `host:port` authority
    /// string, as used for servers declared only in a legacy server-order
    /// list. Only the data port is known.
    pub(crate) fn placeholder(authority: &str) -> Result<Self> {
        let (host, port) = authority
            .split_once(':')
            .ok_or_else(|| DescriptorError::MalformedAddress(authority.to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| DescriptorError::MalformedAddress(authority.to_string()))?;
        Ok(Self::new(
            host.to_string(),
            ServicePorts {
                data: Some(port),
                ..ServicePorts::default()
            },
            ServicePorts::default(),
            None,
            None,
        ))
    }

    /// The node's hostname (no port).
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// The node's identity key: `host:port` of the plain data service.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Number of partitions this server owns (master or replica slots).
    /// Zero in ketama mode or for servers absent from the partition table.
    pub fn owned_partitions(&self) -> u32 {
        self.owned_partitions
    }

    pub(crate) fn set_owned_partitions(&mut self, count: u32) {
        self.owned_partitions = count;
    }

    /// The port for a service over a transport, if offered.
    pub fn port(&self, service: ServiceType, mode: ServiceMode) -> Option<u16> {
        self.ports(mode).get(service)
    }

    /// The composed `host:port` string for a service, if offered. Computed
    /// on first access and cached.
    pub fn hostport(&self, service: ServiceType, mode: ServiceMode) -> Option<&str> {
        let port = self.port(service, mode)?;
        let slot = &self.cache.hostports[mode.slot()][service.slot()];
        Some(slot.get_or_init(|| format!("{}:{}", self.hostname, port)))
    }

    /// The full URL for a path-bearing service (views or query), if both the
    /// port and the path are known. Computed on first access and cached.
    pub fn service_url(&self, service: ServiceType, mode: ServiceMode) -> Option<&str> {
        let (path, slot) = match service {
            ServiceType::Views => (self.view_path.as_deref()?, &self.cache.view_urls),
            ServiceType::Query => (self.query_path.as_deref()?, &self.cache.query_urls),
            _ => return None,
        };
        let port = self.port(service, mode)?;
        let scheme = match mode {
            ServiceMode::Plain => "http",
            ServiceMode::Tls => "https",
        };
        Some(slot[mode.slot()].get_or_init(|| {
            format!("{}://{}:{}{}", scheme, self.hostname, port, path)
        }))
    }

    /// Replace the first hostname-placeholder occurrence with a concrete
    /// host, rederiving the authority and dropping cached endpoint strings.
    pub(crate) fn substitute_host(&mut self, replacement: &str) {
        if !self.hostname.contains(HOST_PLACEHOLDER) {
            return;
        }
        self.hostname = self.hostname.replacen(HOST_PLACEHOLDER, replacement, 1);
        self.authority = compose_authority(&self.hostname, self.plain.data);
        self.cache = EndpointCache::default();
    }

    fn ports(&self, mode: ServiceMode) -> &ServicePorts {
        match mode {
            ServiceMode::Plain => &self.plain,
            ServiceMode::Tls => &self.tls,
        }
    }
}

fn compose_authority(hostname: &str, data_port: Option<u16>) -> String {
    format!("{}:{}", hostname, data_port.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> Server {
        Server::new(
            "node1.example".to_string(),
            ServicePorts {
                data: Some(11210),
                management: Some(8091),
                views: Some(8092),
                query: Some(8093),
                ..ServicePorts::default()
            },
            ServicePorts {
                data: Some(11207),
                ..ServicePorts::default()
            },
            Some("/travel".to_string()),
            Some("/query/service".to_string()),
        )
    }

    #[test]
    fn test_authority_uses_plain_data_port() {
        assert_eq!(server().authority(), "node1.example:11210");
    }

    #[test]
    fn test_port_lookup() {
        let srv = server();
        assert_eq!(srv.port(ServiceType::Data, ServiceMode::Plain), Some(11210));
        assert_eq!(srv.port(ServiceType::Data, ServiceMode::Tls), Some(11207));
        assert_eq!(srv.port(ServiceType::Views, ServiceMode::Tls), None);
        assert_eq!(srv.port(ServiceType::IndexAdmin, ServiceMode::Plain), None);
    }

    #[test]
    fn test_hostport_is_cached() {
        let srv = server();
        let first = srv.hostport(ServiceType::Management, ServiceMode::Plain);
        assert_eq!(first, Some("node1.example:8091"));
        let first = first.map(|s| s as *const str);
        let second = srv
            .hostport(ServiceType::Management, ServiceMode::Plain)
            .map(|s| s as *const str);
        assert_eq!(first, second, "second access must return the cached string");
    }

    #[test]
    fn test_hostport_missing_service() {
        assert_eq!(
            server().hostport(ServiceType::IndexQuery, ServiceMode::Plain),
            None
        );
    }

    #[test]
    fn test_service_urls() {
        let srv = server();
        assert_eq!(
            srv.service_url(ServiceType::Views, ServiceMode::Plain),
            Some("http://node1.example:8092/travel")
        );
        assert_eq!(
            srv.service_url(ServiceType::Query, ServiceMode::Plain),
            Some("http://node1.example:8093/query/service")
        );
        // No TLS views port, no URL.
        assert_eq!(srv.service_url(ServiceType::Views, ServiceMode::Tls), None);
        // Non-URL services never compose one.
        assert_eq!(srv.service_url(ServiceType::Data, ServiceMode::Plain), None);
    }

    #[test]
    fn test_placeholder_substitution() {
        let mut srv = Server::new(
            "$HOST".to_string(),
            ServicePorts {
                data: Some(11210),
                management: Some(8091),
                ..ServicePorts::default()
            },
            ServicePorts::default(),
            None,
            None,
        );
        assert_eq!(srv.authority(), "$HOST:11210");
        // Prime the cache, then substitute.
        assert_eq!(
            srv.hostport(ServiceType::Management, ServiceMode::Plain),
            Some("$HOST:8091")
        );

        srv.substitute_host("10.4.2.1");
        assert_eq!(srv.hostname(), "10.4.2.1");
        assert_eq!(srv.authority(), "10.4.2.1:11210");
        assert_eq!(
            srv.hostport(ServiceType::Management, ServiceMode::Plain),
            Some("10.4.2.1:8091")
        );
    }

    #[test]
    fn test_substitution_without_placeholder_is_noop() {
        let mut srv = server();
        srv.substitute_host("10.4.2.1");
        assert_eq!(srv.hostname(), "node1.example");
        assert_eq!(srv.authority(), "node1.example:11210");
    }

    #[test]
    fn test_placeholder_server_from_authority() {
        let srv = Server::placeholder("left.example:11210").unwrap();
        assert_eq!(srv.hostname(), "left.example");
        assert_eq!(srv.authority(), "left.example:11210");
        assert_eq!(srv.port(ServiceType::Data, ServiceMode::Plain), Some(11210));
        assert_eq!(srv.port(ServiceType::Management, ServiceMode::Plain), None);

        assert!(Server::placeholder("no-port-here").is_err());
        assert!(Server::placeholder("bad:port:x").is_err());
    }
}
