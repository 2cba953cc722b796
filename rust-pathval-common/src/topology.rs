//! Static topology model for the fixed four-switch, four-host network.
//!
//! The topology is pure data: swapping networks means loading a different
//! table of devices, host attachments, and per-hop egress ports, not changing
//! code. Edges for a given (source, destination) host pair are kept in path
//! order, first hop first.

use crate::error::Error;
use crate::types::{DeviceId, PortNumber};
use crate::Result;
use pnet::util::MacAddr;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// One directed hop of a host-to-host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEdge {
    /// Link-layer address of the originating host.
    pub src: MacAddr,
    /// Link-layer address of the destination host.
    pub dst: MacAddr,
    /// Device this hop traverses.
    pub device: DeviceId,
    /// Egress port on `device` toward the next hop.
    pub port: PortNumber,
}

/// A host endpoint and the switch port it hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAttachment {
    /// Short human name, e.g. `h1`.
    pub name: String,
    /// Link-layer address of the host interface.
    pub mac: MacAddr,
    /// Edge device the host is attached to.
    pub device: DeviceId,
    /// Port on `device` facing the host.
    pub port: PortNumber,
}

/// The validated, in-memory topology.
#[derive(Debug, Clone)]
pub struct Topology {
    devices: Vec<DeviceId>,
    hosts: Vec<HostAttachment>,
    edges: Vec<TopologyEdge>,
}

impl Topology {
    /// All devices, in configuration order.
    pub fn devices(&self) -> &[DeviceId] {
        &self.devices
    }

    /// All host attachments.
    pub fn hosts(&self) -> &[HostAttachment] {
        &self.hosts
    }

    /// Every directed hop of every configured path.
    pub fn edges(&self) -> &[TopologyEdge] {
        &self.edges
    }

    /// Look up a host attachment by its short name.
    pub fn host(&self, name: &str) -> Option<&HostAttachment> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Edges of the directed path between two hosts, in hop order.
    pub fn path(&self, src: MacAddr, dst: MacAddr) -> Vec<&TopologyEdge> {
        self.edges
            .iter()
            .filter(|e| e.src == src && e.dst == dst)
            .collect()
    }

    /// Load and validate a topology from a JSON description file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let config: TopologyConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()
    }

    /// The built-in four-switch, four-host reference topology.
    ///
    /// Hosts h1/h2 hang off s1, hosts d1/d2 hang off s4; s2 and s3 are the
    /// two transit switches between them.
    pub fn reference() -> Self {
        let s1 = DeviceId::new_unchecked("of:0000000000000001");
        let s2 = DeviceId::new_unchecked("of:0000000000000002");
        let s3 = DeviceId::new_unchecked("of:0000000000000003");
        let s4 = DeviceId::new_unchecked("of:0000000000000004");

        let h1 = MacAddr::new(0, 0, 0, 0, 0, 1);
        let h2 = MacAddr::new(0, 0, 0, 0, 0, 2);
        let d1 = MacAddr::new(0, 0, 0, 0, 0, 3);
        let d2 = MacAddr::new(0, 0, 0, 0, 0, 4);

        let hosts = vec![
            host("h1", h1, &s1, 1),
            host("h2", h2, &s1, 3),
            host("d1", d1, &s4, 2),
            host("d2", d2, &s4, 4),
        ];

        let edges = vec![
            // h1 <-> d1 via s2
            edge(h1, d1, &s1, 2),
            edge(h1, d1, &s2, 2),
            edge(h1, d1, &s4, 2),
            edge(d1, h1, &s4, 1),
            edge(d1, h1, &s2, 1),
            edge(d1, h1, &s1, 1),
            // h2 <-> d1 via s3
            edge(h2, d1, &s1, 4),
            edge(h2, d1, &s3, 2),
            edge(h2, d1, &s4, 2),
            edge(d1, h2, &s4, 3),
            edge(d1, h2, &s3, 1),
            edge(d1, h2, &s1, 3),
            // h1 <-> d2 via s3
            edge(h1, d2, &s1, 4),
            edge(h1, d2, &s3, 2),
            edge(h1, d2, &s4, 4),
            edge(d2, h1, &s4, 3),
            edge(d2, h1, &s3, 1),
            edge(d2, h1, &s1, 1),
            // h2 <-> d2 via s2
            edge(h2, d2, &s1, 2),
            edge(h2, d2, &s2, 2),
            edge(h2, d2, &s4, 4),
            edge(d2, h2, &s4, 1),
            edge(d2, h2, &s2, 1),
            edge(d2, h2, &s1, 3),
        ];

        Self {
            devices: vec![s1, s2, s3, s4],
            hosts,
            edges,
        }
    }
}

fn host(name: &str, mac: MacAddr, device: &DeviceId, port: u64) -> HostAttachment {
    HostAttachment {
        name: name.to_string(),
        mac,
        device: device.clone(),
        port: PortNumber(port),
    }
}

fn edge(src: MacAddr, dst: MacAddr, device: &DeviceId, port: u64) -> TopologyEdge {
    TopologyEdge {
        src,
        dst,
        device: device.clone(),
        port: PortNumber(port),
    }
}

/// On-disk form of the topology, all addresses as plain strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub devices: Vec<String>,
    pub hosts: Vec<HostConfig>,
    pub edges: Vec<EdgeConfig>,
}

/// On-disk form of a host attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    pub mac: String,
    pub device: String,
    pub port: u64,
}

/// On-disk form of a directed hop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub src: String,
    pub dst: String,
    pub device: String,
    pub port: u64,
}

impl TopologyConfig {
    /// Parse and cross-check the raw configuration.
    ///
    /// Malformed addresses or device ids, and edges or hosts referring to
    /// devices absent from the device list, are configuration errors and
    /// abort startup.
    pub fn validate(self) -> Result<Topology> {
        let devices = self
            .devices
            .into_iter()
            .map(DeviceId::new)
            .collect::<Result<Vec<_>>>()?;

        let known: HashSet<&DeviceId> = devices.iter().collect();

        let hosts = self
            .hosts
            .into_iter()
            .map(|h| {
                let device = DeviceId::new(h.device)?;
                if !known.contains(&device) {
                    return Err(Error::Topology(format!(
                        "host {} attached to unknown device {}",
                        h.name, device
                    )));
                }
                Ok(HostAttachment {
                    name: h.name,
                    mac: parse_mac(&h.mac)?,
                    device,
                    port: PortNumber(h.port),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let edges = self
            .edges
            .into_iter()
            .map(|e| {
                let device = DeviceId::new(e.device)?;
                if !known.contains(&device) {
                    return Err(Error::Topology(format!(
                        "edge through unknown device {}",
                        device
                    )));
                }
                Ok(TopologyEdge {
                    src: parse_mac(&e.src)?,
                    dst: parse_mac(&e.dst)?,
                    device,
                    port: PortNumber(e.port),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Topology {
            devices,
            hosts,
            edges,
        })
    }
}

fn parse_mac(s: &str) -> Result<MacAddr> {
    MacAddr::from_str(s).map_err(|_| Error::InvalidAddress(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_topology_shape() {
        let topo = Topology::reference();
        assert_eq!(topo.devices().len(), 4);
        assert_eq!(topo.hosts().len(), 4);
        // 4 host pairs, both directions, 3 hops each.
        assert_eq!(topo.edges().len(), 24);
    }

    #[test]
    fn path_is_returned_in_hop_order() {
        let topo = Topology::reference();
        let h1 = topo.host("h1").unwrap().mac;
        let d1 = topo.host("d1").unwrap().mac;

        let path: Vec<&str> = topo
            .path(h1, d1)
            .iter()
            .map(|e| e.device.as_str())
            .collect();
        assert_eq!(
            path,
            vec![
                "of:0000000000000001",
                "of:0000000000000002",
                "of:0000000000000004",
            ]
        );
    }

    #[test]
    fn validate_rejects_bad_mac() {
        let config = TopologyConfig {
            devices: vec!["of:01".into()],
            hosts: vec![HostConfig {
                name: "h1".into(),
                mac: "not-a-mac".into(),
                device: "of:01".into(),
                port: 1,
            }],
            edges: vec![],
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn validate_rejects_unknown_device() {
        let config = TopologyConfig {
            devices: vec!["of:01".into()],
            hosts: vec![],
            edges: vec![EdgeConfig {
                src: "00:00:00:00:00:01".into(),
                dst: "00:00:00:00:00:02".into(),
                device: "of:99".into(),
                port: 1,
            }],
        };
        assert!(matches!(config.validate(), Err(Error::Topology(_))));
    }

    #[test]
    fn validate_accepts_reference_shaped_config() {
        let config = TopologyConfig {
            devices: vec!["of:01".into(), "of:02".into()],
            hosts: vec![HostConfig {
                name: "h1".into(),
                mac: "00:00:00:00:00:01".into(),
                device: "of:01".into(),
                port: 1,
            }],
            edges: vec![EdgeConfig {
                src: "00:00:00:00:00:01".into(),
                dst: "00:00:00:00:00:02".into(),
                device: "of:02".into(),
                port: 2,
            }],
        };
        let topo = config.validate().unwrap();
        assert_eq!(topo.devices().len(), 2);
        assert_eq!(topo.edges()[0].port, PortNumber(2));
    }
}
