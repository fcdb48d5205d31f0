// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Process-wide monitoring state: one [`ChainMonitor`] per chain this host
//! is tracking, plus the chain-to-monitoring-host map used to route reports.

use fabricflow_core::{ChainMonitor, ChainState, FabricError, NodeId, NodeStatus};
use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks every chain this connector currently monitors.
///
/// A chain is "monitored" here if this host is where `/chains` was
/// initially called, or if a peer named this host as the monitoring target
/// in a setup broadcast. [`crate::resolver::MonitoringResolver`] answers "where
/// do I send reports for this chain"; this type answers "what do I know
/// about this chain's nodes".
#[derive(Default)]
pub struct MonitoringAgent {
    chains: Mutex<HashMap<String, ChainMonitor>>,
}

impl MonitoringAgent {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new chain, creating an empty monitor for it if absent.
    pub fn register_chain(&self, chain_id: &str) {
        #[allow(clippy::unwrap_used)]
        self.chains.lock().unwrap().entry(chain_id.to_string()).or_default();
    }

    pub fn add_node(&self, chain_id: &str, node_id: NodeId) {
        #[allow(clippy::unwrap_used)]
        let mut chains = self.chains.lock().unwrap();
        chains.entry(chain_id.to_string()).or_default().add_node(node_id);
    }

    /// Applies a single node's status report to its chain's monitor.
    pub fn record_status(&self, chain_id: &str, node_id: &NodeId, status: NodeStatus) {
        #[allow(clippy::unwrap_used)]
        let mut chains = self.chains.lock().unwrap();
        chains.entry(chain_id.to_string()).or_default().on_status_change(node_id, status);
    }

    pub fn snapshot(&self, chain_id: &str) -> Result<ChainState, FabricError> {
        #[allow(clippy::unwrap_used)]
        let chains = self.chains.lock().unwrap();
        chains
            .get(chain_id)
            .map(ChainMonitor::snapshot)
            .ok_or_else(|| FabricError::MonitoringNotFound { chain_id: chain_id.to_string() })
    }

    #[must_use]
    pub fn is_known(&self, chain_id: &str) -> bool {
        #[allow(clippy::unwrap_used)]
        self.chains.lock().unwrap().contains_key(chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_chain_snapshot_errors() {
        let agent = MonitoringAgent::new();
        assert!(agent.snapshot("chain-1").is_err());
    }

    #[test]
    fn record_status_moves_node_between_buckets() {
        let agent = MonitoringAgent::new();
        let node_id = NodeId::new();
        agent.add_node("chain-1", node_id.clone());
        let snap = agent.snapshot("chain-1").unwrap();
        assert_eq!(snap.pending, vec![node_id.clone()]);

        agent.record_status("chain-1", &node_id, NodeStatus::Completed);
        let snap = agent.snapshot("chain-1").unwrap();
        assert_eq!(snap.completed, vec![node_id]);
        assert!(snap.pending.is_empty());
    }
}
