//! Cluster descriptor parsing.
//!
//! Turns a decoded JSON tree into a [`TopologySnapshot`]. Two node-list
//! dialects are understood: the current `nodesExt` form with explicit
//! per-service port maps, and the legacy `nodes` form that derives ports
//! from a combined `host:port` field, a nested `ports` map, and a views API
//! base URL. Any structural problem fails the whole parse; no partial
//! snapshot is ever produced.

use serde_json::{Map, Value};

use crate::error::{DescriptorError, Result};
use crate::routing::{KetamaRing, PartitionTable};
use crate::topology::snapshot::{Layout, TopologySnapshot};
use crate::topology::{Server, ServicePorts};
use crate::types::{HOST_PLACEHOLDER, KETAMA_LOCATOR};

type Obj = Map<String, Value>;

pub(crate) fn parse(root: &Value) -> Result<TopologySnapshot> {
    let root = root.as_object().ok_or(DescriptorError::WrongType {
        field: "<root>",
        expected: "an object",
    })?;

    let name = req_str(root, "name")?.to_string();
    let locator = req_str(root, "nodeLocator")?;
    let uuid = root
        .get("uuid")
        .and_then(Value::as_str)
        .map(str::to_string);
    let revision = root
        .get("rev")
        .and_then(Value::as_u64)
        .and_then(|r| u32::try_from(r).ok());

    let (nodes, legacy) = if let Some(v) = root.get("nodesExt") {
        (as_array(v, "nodesExt")?, false)
    } else if let Some(v) = root.get("nodes") {
        (as_array(v, "nodes")?, true)
    } else {
        return Err(DescriptorError::MissingField("nodesExt").into());
    };

    let mut servers = Vec::with_capacity(nodes.len());
    for node in nodes {
        let node = node.as_object().ok_or(DescriptorError::WrongType {
            field: if legacy { "nodes" } else { "nodesExt" },
            expected: "an array of objects",
        })?;
        servers.push(if legacy {
            parse_node_legacy(node)?
        } else {
            parse_node_ext(node, &name)?
        });
    }

    let layout = if locator == KETAMA_LOCATOR {
        Layout::Ketama {
            ring: KetamaRing::build(&mut servers),
        }
    } else {
        let (table, forward) = parse_server_map(root, &mut servers, legacy)?;
        Layout::VBucket { table, forward }
    };

    Ok(TopologySnapshot::from_parts(
        name, uuid, revision, servers, layout,
    ))
}

/// Parse `vBucketServerMap`: replica count, live map, optional forward map,
/// and (legacy dialect) the canonical server order. Recomputes per-server
/// ownership counts over both tables.
fn parse_server_map(
    root: &Obj,
    servers: &mut Vec<Server>,
    legacy: bool,
) -> Result<(PartitionTable, Option<PartitionTable>)> {
    let map = match root.get("vBucketServerMap") {
        Some(v) => v.as_object().ok_or(DescriptorError::WrongType {
            field: "vBucketServerMap",
            expected: "an object",
        })?,
        None => return Err(DescriptorError::MissingField("vBucketServerMap").into()),
    };

    let replicas = req_u64(map, "numReplicas")? as usize;
    let table = build_table(as_array(req(map, "vBucketMap")?, "vBucketMap")?, replicas)?;

    let forward = match map.get("vBucketMapForward") {
        Some(v) => {
            let fwd = build_table(as_array(v, "vBucketMapForward")?, replicas)?;
            if fwd.len() != table.len() {
                return Err(DescriptorError::ForwardShape {
                    got: fwd.len(),
                    want: table.len(),
                }
                .into());
            }
            Some(fwd)
        }
        None => None,
    };

    if legacy {
        let list = as_array(req(map, "serverList")?, "serverList")?;
        *servers = pair_server_list(servers, list)?;
    }

    let mut counts = vec![0u32; servers.len()];
    table.accumulate_ownership(&mut counts);
    if let Some(fwd) = &forward {
        fwd.accumulate_ownership(&mut counts);
    }
    for (srv, count) in servers.iter_mut().zip(counts) {
        srv.set_owned_partitions(count);
    }

    Ok((table, forward))
}

/// Build a partition table from a 2-D array of server indices. Every row
/// must be exactly `replicas + 1` wide.
fn build_table(rows: &[Value], replicas: usize) -> Result<PartitionTable> {
    if rows.is_empty() {
        return Err(DescriptorError::EmptyPartitionMap.into());
    }

    let width = replicas + 1;
    let mut parsed = Vec::with_capacity(rows.len());
    for (ix, row) in rows.iter().enumerate() {
        let row = row.as_array().ok_or(DescriptorError::WrongType {
            field: "vBucketMap",
            expected: "an array of arrays",
        })?;
        if row.len() != width {
            return Err(DescriptorError::PartitionRowShape {
                row: ix,
                got: row.len(),
                want: width,
            }
            .into());
        }
        let mut entries = Vec::with_capacity(width);
        for slot in row {
            let n = slot.as_i64().ok_or(DescriptorError::WrongType {
                field: "vBucketMap",
                expected: "arrays of integers",
            })?;
            entries.push(n as i32);
        }
        parsed.push(entries);
    }

    Ok(PartitionTable::from_rows(parsed, replicas))
}

/// Reorder the server array to match the legacy `serverList` declaration,
/// synthesizing placeholder records for servers declared there but absent
/// from the node list.
fn pair_server_list(servers: &[Server], list: &[Value]) -> Result<Vec<Server>> {
    let mut ordered = Vec::with_capacity(list.len());
    for entry in list {
        let authority = entry.as_str().ok_or(DescriptorError::WrongType {
            field: "serverList",
            expected: "an array of strings",
        })?;
        match servers.iter().find(|srv| srv.authority() == authority) {
            Some(found) => ordered.push(found.clone()),
            None => ordered.push(Server::placeholder(authority)?),
        }
    }
    Ok(ordered)
}

/// Parse one node of the current dialect: explicit per-service port maps,
/// TLS ports via the `SSL` key suffix.
fn parse_node_ext(node: &Obj, bucket: &str) -> Result<Server> {
    let hostname = match node.get("hostname") {
        Some(v) => v
            .as_str()
            .ok_or(DescriptorError::WrongType {
                field: "hostname",
                expected: "a string",
            })?
            .to_string(),
        None => HOST_PLACEHOLDER.to_string(),
    };

    let services = match node.get("services") {
        Some(v) => v.as_object().ok_or(DescriptorError::WrongType {
            field: "services",
            expected: "an object",
        })?,
        None => return Err(DescriptorError::MissingField("services").into()),
    };

    let plain = extract_services(services, false)?;
    let tls = extract_services(services, true)?;

    let view_path = plain.views.map(|_| format!("/{}", bucket));
    let query_path = plain.query.map(|_| "/query/service".to_string());

    Ok(Server::new(hostname, plain, tls, view_path, query_path))
}

fn extract_services(services: &Obj, tls: bool) -> Result<ServicePorts> {
    let (kv, mgmt, capi, n1ql, ixadmin, ixscan) = if tls {
        ("kvSSL", "mgmtSSL", "capiSSL", "n1qlSSL", "indexAdminSSL", "indexScanSSL")
    } else {
        ("kv", "mgmt", "capi", "n1ql", "indexAdmin", "indexScan")
    };
    Ok(ServicePorts {
        data: port_field(services, kv)?,
        management: port_field(services, mgmt)?,
        views: port_field(services, capi)?,
        query: port_field(services, n1ql)?,
        index_admin: port_field(services, ixadmin)?,
        index_query: port_field(services, ixscan)?,
    })
}

fn port_field(obj: &Obj, key: &'static str) -> Result<Option<u16>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => {
            let n = v.as_i64().ok_or(DescriptorError::WrongType {
                field: key,
                expected: "an integer port",
            })?;
            let port =
                u16::try_from(n).map_err(|_| DescriptorError::PortOutOfRange(n))?;
            Ok(Some(port))
        }
    }
}

/// Parse one node of the legacy dialect: `hostname` is `host:mgmt-port`,
/// the data port lives under `ports.direct`, and the optional
/// `couchApiBase` URL contributes the views port and path.
fn parse_node_legacy(node: &Obj) -> Result<Server> {
    let full = req_str(node, "hostname")?;
    let (host, mgmt) = full
        .split_once(':')
        .ok_or_else(|| DescriptorError::MalformedAddress(full.to_string()))?;
    let management: u16 = mgmt
        .parse()
        .map_err(|_| DescriptorError::MalformedAddress(full.to_string()))?;

    let (views, view_path) = match node.get("couchApiBase") {
        None => (None, None),
        Some(v) => {
            let url = v.as_str().ok_or(DescriptorError::WrongType {
                field: "couchApiBase",
                expected: "a string",
            })?;
            let (port, path) = parse_views_url(url)?;
            (Some(port), Some(path))
        }
    };

    let ports = match node.get("ports") {
        Some(v) => v.as_object().ok_or(DescriptorError::WrongType {
            field: "ports",
            expected: "an object",
        })?,
        None => return Err(DescriptorError::MissingField("ports").into()),
    };
    let data = match port_field(ports, "direct")? {
        Some(p) => p,
        None => return Err(DescriptorError::MissingField("direct").into()),
    };

    Ok(Server::new(
        host.to_string(),
        ServicePorts {
            data: Some(data),
            management: Some(management),
            views,
            ..ServicePorts::default()
        },
        ServicePorts::default(),
        view_path,
        None,
    ))
}

/// Split a views base URL (`http://host:port/path`) into its port and path.
fn parse_views_url(url: &str) -> Result<(u16, String)> {
    let colon = url
        .rfind(':')
        .ok_or_else(|| DescriptorError::MalformedUrl(url.to_string()))?;
    let rest = &url[colon + 1..];
    let slash = rest
        .find('/')
        .ok_or_else(|| DescriptorError::MalformedUrl(url.to_string()))?;
    let port: u16 = rest[..slash]
        .parse()
        .map_err(|_| DescriptorError::MalformedUrl(url.to_string()))?;
    Ok((port, rest[slash..].to_string()))
}

fn req<'a>(obj: &'a Obj, field: &'static str) -> Result<&'a Value> {
    obj.get(field)
        .ok_or_else(|| DescriptorError::MissingField(field).into())
}

fn req_str<'a>(obj: &'a Obj, field: &'static str) -> Result<&'a str> {
    req(obj, field)?.as_str().ok_or_else(|| {
        DescriptorError::WrongType {
            field,
            expected: "a string",
        }
        .into()
    })
}

fn req_u64(obj: &Obj, field: &'static str) -> Result<u64> {
    req(obj, field)?.as_u64().ok_or_else(|| {
        DescriptorError::WrongType {
            field,
            expected: "an unsigned integer",
        }
        .into()
    })
}

fn as_array<'a>(v: &'a Value, field: &'static str) -> Result<&'a [Value]> {
    v.as_array().map(Vec::as_slice).ok_or_else(|| {
        DescriptorError::WrongType {
            field,
            expected: "an array",
        }
        .into()
    })
}
