// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-chain aggregate node monitoring.
//!
//! [`ChainMonitor`] tracks, for a single chain, which node ids have
//! completed, are still pending, or have failed. It is a plain data
//! structure; emitting reports when a node's bucket changes is the
//! Supervisor's job (it is the one with a callback to call).

use crate::ids::NodeId;
use crate::node::NodeStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// A status-change event for a single node, destined for the reporting callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingMessage {
    pub chain_id: String,
    pub node_id: NodeId,
    pub status: NodeStatus,
    pub timestamp: u64,
}

impl ReportingMessage {
    #[must_use]
    pub fn now(chain_id: impl Into<String>, node_id: NodeId, status: NodeStatus) -> Self {
        Self { chain_id: chain_id.into(), node_id, status, timestamp: now_millis() }
    }
}

/// A chain-level aggregate, destined for the broadcast-reporting callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastReportingMessage {
    pub chain_id: String,
    pub completed: Vec<NodeId>,
    pub pending: Vec<NodeId>,
    pub failed: Vec<NodeId>,
    pub timestamp: u64,
}

/// An atomic read of a [`ChainMonitor`]'s three buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainState {
    pub completed: Vec<NodeId>,
    pub pending: Vec<NodeId>,
    pub failed: Vec<NodeId>,
}

/// Tracks aggregate chain state: which node ids are completed, pending, or failed.
///
/// The three buckets are disjoint; a node occupies at most one of them
/// (nodes that are `Paused` or `InProgress` are tracked by membership but
/// occupy none of the three).
#[derive(Debug, Default)]
pub struct ChainMonitor {
    members: HashSet<NodeId>,
    completed: HashSet<NodeId>,
    pending: HashSet<NodeId>,
    failed: HashSet<NodeId>,
}

impl ChainMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node as a member of this chain, starting it in `pending`.
    pub fn add_node(&mut self, id: NodeId) {
        self.members.insert(id.clone());
        self.completed.remove(&id);
        self.failed.remove(&id);
        self.pending.insert(id);
    }

    pub fn remove_node(&mut self, id: &NodeId) {
        self.members.remove(id);
        self.completed.remove(id);
        self.pending.remove(id);
        self.failed.remove(id);
    }

    /// Moves `id` into the bucket matching `status`. Statuses without a
    /// matching bucket (`InProgress`, `Paused`) remove the node from all
    /// three, since it is neither finished nor awaiting a dependency.
    pub fn on_status_change(&mut self, id: &NodeId, status: NodeStatus) {
        if !self.members.contains(id) {
            self.members.insert(id.clone());
        }
        self.completed.remove(id);
        self.pending.remove(id);
        self.failed.remove(id);
        match status {
            NodeStatus::Completed => {
                self.completed.insert(id.clone());
            },
            NodeStatus::Pending => {
                self.pending.insert(id.clone());
            },
            NodeStatus::Failed => {
                self.failed.insert(id.clone());
            },
            NodeStatus::InProgress | NodeStatus::Paused => {},
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ChainState {
        ChainState {
            completed: self.completed.iter().cloned().collect(),
            pending: self.pending.iter().cloned().collect(),
            failed: self.failed.iter().cloned().collect(),
        }
    }

    #[must_use]
    pub fn is_completed(&self, id: &NodeId) -> bool {
        self.completed.contains(id)
    }
}

fn now_millis() -> u64 {
    #[allow(clippy::unwrap_used)]
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
