//! Node descriptors and the roles and statuses they move through

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ----------------------------------------------------------------------------
// Roles and Status
// ----------------------------------------------------------------------------

/// Role a node plays in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// First node of the run and sole bootstrap point for everyone else
    Genesis,
    Normal,
    /// Node whose traffic is scripted by the attack engine
    Adversarial,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Genesis => "genesis",
            NodeRole::Normal => "normal",
            NodeRole::Adversarial => "adversarial",
        }
    }

    /// Value handed to the node binary's `--role` flag.
    ///
    /// Adversarial nodes run the stock binary; their behaviour comes from the harness.
    pub fn launch_role(&self) -> &'static str {
        match self {
            NodeRole::Genesis => "bootstrap",
            NodeRole::Normal | NodeRole::Adversarial => "normal",
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a managed node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Failed,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Stopped => "stopped",
            NodeStatus::Starting => "starting",
            NodeStatus::Running => "running",
            NodeStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ----------------------------------------------------------------------------
// Port Bases
// ----------------------------------------------------------------------------

/// First candidate port of each port class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBases {
    pub p2p: u16,
    pub http: u16,
    pub admin: u16,
}

impl Default for PortBases {
    fn default() -> Self {
        Self {
            p2p: 9000,
            http: 18000,
            admin: 18500,
        }
    }
}

// ----------------------------------------------------------------------------
// Node Descriptor
// ----------------------------------------------------------------------------

/// Identity and runtime binding for one managed node
///
/// Created by the topology planner before any process exists. Only a process
/// supervisor touches `pid` and `status` afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    pub id: String,
    pub index: usize,
    pub role: NodeRole,
    pub p2p_port: u16,
    pub http_port: u16,
    pub admin_port: u16,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
    pub bootstrap_address: Option<String>,
    pub pid: u32,
    pub status: NodeStatus,
}

impl NodeDescriptor {
    /// Stable identifier for the node at `index`
    pub fn id_for(index: usize) -> String {
        format!("node{:02}", index)
    }

    pub fn ports(&self) -> [u16; 3] {
        [self.p2p_port, self.http_port, self.admin_port]
    }

    pub fn is_genesis(&self) -> bool {
        self.role == NodeRole::Genesis
    }

    pub fn is_adversarial(&self) -> bool {
        self.role == NodeRole::Adversarial
    }

    pub fn is_running(&self) -> bool {
        self.status == NodeStatus::Running
    }

    pub fn http_base_url(&self, host: &str) -> String {
        format!("http://{}:{}", host, self.http_port)
    }

    pub fn admin_base_url(&self, host: &str) -> String {
        format!("http://{}:{}", host, self.admin_port)
    }

    /// Multiaddr the node listens on for p2p traffic
    pub fn listen_multiaddr(&self, listen_host: &str) -> String {
        format!("/ip4/{}/tcp/{}", listen_host, self.p2p_port)
    }

    /// Multiaddr other nodes dial to reach this one
    pub fn dial_multiaddr(&self, host: &str) -> String {
        format!("/ip4/{}/tcp/{}", host, self.p2p_port)
    }
}
