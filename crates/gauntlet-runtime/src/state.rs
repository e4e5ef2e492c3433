//! Shared run state
//!
//! Owned by one orchestrator and handed to components by reference. The only
//! data touched by concurrent tasks lives here: per-node descriptors behind
//! their own lock, and append-only logs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use gauntlet_core::{AttackEvent, NetworkSample, NodeDescriptor, StageOutcome};
use tokio::sync::{Mutex, RwLock};

/// One descriptor, exclusively updated through its lock
pub type NodeHandle = Arc<RwLock<NodeDescriptor>>;

pub fn node_handle(descriptor: NodeDescriptor) -> NodeHandle {
    Arc::new(RwLock::new(descriptor))
}

/// Append-only log shared between tasks
#[derive(Debug)]
pub struct AppendLog<T> {
    entries: Mutex<Vec<T>>,
}

impl<T: Clone> AppendLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub async fn push(&self, entry: T) {
        self.entries.lock().await.push(entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<T> {
        self.entries.lock().await.clone()
    }
}

impl<T: Clone> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a run accumulates
#[derive(Debug)]
pub struct RunState {
    pub started_at: DateTime<Utc>,
    nodes: RwLock<Vec<NodeHandle>>,
    pub events: AppendLog<AttackEvent>,
    pub samples: AppendLog<NetworkSample>,
    pub stages: AppendLog<StageOutcome>,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            nodes: RwLock::new(Vec::new()),
            events: AppendLog::new(),
            samples: AppendLog::new(),
            stages: AppendLog::new(),
        }
    }

    /// Register planned nodes and return their handles
    pub async fn add_nodes(&self, descriptors: Vec<NodeDescriptor>) -> Vec<NodeHandle> {
        let handles: Vec<NodeHandle> = descriptors.into_iter().map(node_handle).collect();
        self.nodes.write().await.extend(handles.iter().cloned());
        handles
    }

    /// Handles in registration order
    pub async fn nodes(&self) -> Vec<NodeHandle> {
        self.nodes.read().await.clone()
    }

    /// Consistent copies of every descriptor
    pub async fn descriptors(&self) -> Vec<NodeDescriptor> {
        let handles = self.nodes().await;
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.read().await.clone());
        }
        out
    }

    pub async fn running(&self) -> Vec<NodeDescriptor> {
        self.descriptors()
            .await
            .into_iter()
            .filter(|d| d.is_running())
            .collect()
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
