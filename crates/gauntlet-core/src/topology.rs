//! Topology planning
//!
//! Allocates ports, data directories and roles for every node of a run before
//! any process exists. Index 0 is always the genesis node and every other node
//! bootstraps from it directly, including nodes added by later growth stages.

use std::collections::HashSet;
use std::fmt;
use std::net::TcpListener;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::TopologyError;
use crate::types::{NodeDescriptor, NodeRole, NodeStatus, PortBases};

// ----------------------------------------------------------------------------
// Port Probing
// ----------------------------------------------------------------------------

/// Port classes handed out by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortClass {
    P2p,
    Http,
    Admin,
}

impl fmt::Display for PortClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PortClass::P2p => "p2p",
            PortClass::Http => "http",
            PortClass::Admin => "admin",
        };
        f.write_str(s)
    }
}

/// Answers whether a port is already bound on the host
pub trait PortProbe {
    fn is_bound(&self, port: u16) -> bool;
}

impl<F> PortProbe for F
where
    F: Fn(u16) -> bool,
{
    fn is_bound(&self, port: u16) -> bool {
        self(port)
    }
}

/// Probe that tries to bind the port on all interfaces
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPortProbe;

impl PortProbe for HostPortProbe {
    fn is_bound(&self, port: u16) -> bool {
        TcpListener::bind(("0.0.0.0", port)).is_err()
    }
}

// ----------------------------------------------------------------------------
// Topology Planner
// ----------------------------------------------------------------------------

/// Deterministic planner for node descriptors
pub struct TopologyPlanner<P = HostPortProbe> {
    work_dir: PathBuf,
    bootstrap_host: String,
    probe: P,
}

impl TopologyPlanner<HostPortProbe> {
    /// Planner that checks candidate ports against the local host
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_probe(work_dir, HostPortProbe)
    }
}

impl<P: PortProbe> TopologyPlanner<P> {
    pub fn with_probe(work_dir: impl Into<PathBuf>, probe: P) -> Self {
        Self {
            work_dir: work_dir.into(),
            bootstrap_host: "127.0.0.1".to_string(),
            probe,
        }
    }

    /// Host placed in bootstrap multiaddrs
    pub fn bootstrap_host(mut self, host: impl Into<String>) -> Self {
        self.bootstrap_host = host.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Plan `node_count` fresh nodes starting at index 0
    pub fn plan(
        &self,
        node_count: usize,
        adversarial_indices: &[usize],
        bases: PortBases,
    ) -> Result<Vec<NodeDescriptor>, TopologyError> {
        if node_count == 0 {
            return Err(TopologyError::Empty);
        }
        for &index in adversarial_indices {
            if index == 0 {
                return Err(TopologyError::GenesisAdversarial { index });
            }
            if index >= node_count {
                return Err(TopologyError::IndexOutOfRange { index, node_count });
            }
        }

        let mut allocator = PortAllocator::new(&self.probe, bases, HashSet::new());
        let mut nodes = Vec::with_capacity(node_count);
        let mut genesis_addr = None;

        for index in 0..node_count {
            let role = if index == 0 {
                NodeRole::Genesis
            } else if adversarial_indices.contains(&index) {
                NodeRole::Adversarial
            } else {
                NodeRole::Normal
            };
            let node = self.descriptor(index, role, &mut allocator, genesis_addr.clone())?;
            if index == 0 {
                genesis_addr = Some(node.dial_multiaddr(&self.bootstrap_host));
            }
            nodes.push(node);
        }

        debug!(node_count, "Planned topology");
        Ok(nodes)
    }

    /// Plan `additional` nodes continuing after `existing`
    ///
    /// New nodes bootstrap from the existing genesis and never reuse a port
    /// already held by `existing`. Indices in `adversarial_indices` are absolute;
    /// ones that fall inside `existing` are ignored.
    pub fn extend(
        &self,
        existing: &[NodeDescriptor],
        additional: usize,
        adversarial_indices: &[usize],
        bases: PortBases,
    ) -> Result<Vec<NodeDescriptor>, TopologyError> {
        if additional == 0 {
            return Ok(Vec::new());
        }
        let genesis = existing
            .iter()
            .find(|n| n.is_genesis())
            .ok_or(TopologyError::MissingGenesis)?;
        let genesis_addr = genesis.dial_multiaddr(&self.bootstrap_host);

        let start = existing.iter().map(|n| n.index + 1).max().unwrap_or(0);
        let total = start + additional;
        for &index in adversarial_indices {
            if index >= total {
                return Err(TopologyError::IndexOutOfRange {
                    index,
                    node_count: total,
                });
            }
        }

        let taken: HashSet<u16> = existing.iter().flat_map(|n| n.ports()).collect();
        let mut allocator = PortAllocator::new(&self.probe, bases, taken);
        let mut nodes = Vec::with_capacity(additional);
        for index in start..total {
            let role = if adversarial_indices.contains(&index) {
                NodeRole::Adversarial
            } else {
                NodeRole::Normal
            };
            nodes.push(self.descriptor(index, role, &mut allocator, Some(genesis_addr.clone()))?);
        }

        debug!(start, additional, "Extended topology");
        Ok(nodes)
    }

    fn descriptor(
        &self,
        index: usize,
        role: NodeRole,
        allocator: &mut PortAllocator<'_, P>,
        bootstrap_address: Option<String>,
    ) -> Result<NodeDescriptor, TopologyError> {
        let id = NodeDescriptor::id_for(index);
        let p2p_port = allocator.next(PortClass::P2p)?;
        let http_port = allocator.next(PortClass::Http)?;
        let admin_port = allocator.next(PortClass::Admin)?;
        Ok(NodeDescriptor {
            data_dir: self.work_dir.join("data").join(&id),
            log_file: self.work_dir.join("logs").join(format!("{}.log", id)),
            id,
            index,
            role,
            p2p_port,
            http_port,
            admin_port,
            bootstrap_address,
            pid: 0,
            status: NodeStatus::Stopped,
        })
    }
}

// ----------------------------------------------------------------------------
// Port Allocation
// ----------------------------------------------------------------------------

/// Per-class cursors over a single taken-set shared by all classes
struct PortAllocator<'a, P> {
    probe: &'a P,
    bases: PortBases,
    cursors: [u32; 3],
    taken: HashSet<u16>,
}

impl<'a, P: PortProbe> PortAllocator<'a, P> {
    fn new(probe: &'a P, bases: PortBases, taken: HashSet<u16>) -> Self {
        Self {
            probe,
            bases,
            cursors: [bases.p2p as u32, bases.http as u32, bases.admin as u32],
            taken,
        }
    }

    fn next(&mut self, class: PortClass) -> Result<u16, TopologyError> {
        let (slot, base) = match class {
            PortClass::P2p => (0, self.bases.p2p),
            PortClass::Http => (1, self.bases.http),
            PortClass::Admin => (2, self.bases.admin),
        };
        while self.cursors[slot] <= u16::MAX as u32 {
            let candidate = self.cursors[slot] as u16;
            self.cursors[slot] += 1;
            if candidate == 0 || self.taken.contains(&candidate) {
                continue;
            }
            if self.probe.is_bound(candidate) {
                debug!(port = candidate, %class, "Skipping bound port");
                continue;
            }
            self.taken.insert(candidate);
            return Ok(candidate);
        }
        Err(TopologyError::PortsExhausted { class, base })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free(_: u16) -> bool {
        false
    }

    #[test]
    fn test_plan_assigns_roles_and_star_bootstrap() {
        let planner = TopologyPlanner::with_probe("/tmp/run", free);
        let nodes = planner
            .plan(5, &[3, 4], PortBases::default())
            .expect("Failed to plan topology");

        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes[0].role, NodeRole::Genesis);
        assert!(nodes[0].bootstrap_address.is_none());
        assert_eq!(nodes[1].role, NodeRole::Normal);
        assert_eq!(nodes[3].role, NodeRole::Adversarial);
        for node in &nodes[1..] {
            assert_eq!(
                node.bootstrap_address.as_deref(),
                Some("/ip4/127.0.0.1/tcp/9000")
            );
        }
        assert_eq!(nodes[2].http_port, 18002);
        assert_eq!(nodes[4].data_dir, PathBuf::from("/tmp/run/data/node04"));
        assert_eq!(nodes[4].log_file, PathBuf::from("/tmp/run/logs/node04.log"));
    }

    #[test]
    fn test_plan_skips_occupied_ports() {
        let occupied = |port: u16| (9000..=9002).contains(&port);
        let planner = TopologyPlanner::with_probe("/tmp/run", occupied);
        let nodes = planner
            .plan(3, &[], PortBases::default())
            .expect("Failed to plan topology");

        let p2p: Vec<u16> = nodes.iter().map(|n| n.p2p_port).collect();
        assert_eq!(p2p, vec![9003, 9004, 9005]);
        assert_eq!(
            nodes[1].bootstrap_address.as_deref(),
            Some("/ip4/127.0.0.1/tcp/9003")
        );
    }

    #[test]
    fn test_overlapping_bases_stay_distinct() {
        let planner = TopologyPlanner::with_probe("/tmp/run", free);
        let bases = PortBases {
            p2p: 9000,
            http: 9001,
            admin: 9002,
        };
        let nodes = planner.plan(4, &[], bases).expect("Failed to plan topology");
        let mut all: Vec<u16> = nodes.iter().flat_map(|n| n.ports()).collect();
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), count);
    }

    #[test]
    fn test_plan_rejects_bad_input() {
        let planner = TopologyPlanner::with_probe("/tmp/run", free);
        assert!(matches!(
            planner.plan(0, &[], PortBases::default()),
            Err(TopologyError::Empty)
        ));
        assert!(matches!(
            planner.plan(3, &[0], PortBases::default()),
            Err(TopologyError::GenesisAdversarial { index: 0 })
        ));
        assert!(matches!(
            planner.plan(3, &[3], PortBases::default()),
            Err(TopologyError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_plan_reports_exhausted_ports() {
        let planner = TopologyPlanner::with_probe("/tmp/run", free);
        let bases = PortBases {
            p2p: 65535,
            http: 18000,
            admin: 18500,
        };
        assert!(matches!(
            planner.plan(2, &[], bases),
            Err(TopologyError::PortsExhausted {
                class: PortClass::P2p,
                ..
            })
        ));
    }

    #[test]
    fn test_extend_continues_indices_from_genesis() {
        let planner = TopologyPlanner::with_probe("/tmp/run", free);
        let first = planner
            .plan(3, &[], PortBases::default())
            .expect("Failed to plan topology");
        let more = planner
            .extend(&first, 2, &[1, 4], PortBases::default())
            .expect("Failed to extend topology");

        assert_eq!(more.len(), 2);
        assert_eq!(more[0].id, "node03");
        assert_eq!(more[1].role, NodeRole::Adversarial);
        assert_eq!(more[0].p2p_port, 9003);
        for node in &more {
            assert_eq!(
                node.bootstrap_address.as_deref(),
                Some("/ip4/127.0.0.1/tcp/9000")
            );
        }
    }

    #[test]
    fn test_extend_requires_genesis() {
        let planner = TopologyPlanner::with_probe("/tmp/run", free);
        let mut nodes = planner
            .plan(2, &[], PortBases::default())
            .expect("Failed to plan topology");
        nodes.remove(0);
        assert!(matches!(
            planner.extend(&nodes, 1, &[], PortBases::default()),
            Err(TopologyError::MissingGenesis)
        ));
    }
}
