// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for FabricFlow.
//!
//! Every variant here corresponds to an entry in the pipeline supervisor's
//! error taxonomy: state-machine errors are recorded on the offending node
//! and propagated to monitoring, transport errors surface to the immediate
//! caller, and resolver misses degrade gracefully. Nothing here is meant to
//! terminate the process.

use crate::ids::NodeId;
use thiserror::Error;

/// Main error type for FabricFlow operations.
#[derive(Debug, Error)]
pub enum FabricError {
    /// A node's status change is not a legal transition.
    #[error("invalid status transition for node {node_id}")]
    InvalidTransition { node_id: NodeId },

    /// `execute` was attempted while upstream dependencies have not completed.
    #[error("dependencies not met for node {node_id}: {ids:?}")]
    DependenciesNotMet { node_id: NodeId, ids: Vec<NodeId> },

    /// A processor in the pipeline raised during `execute`.
    #[error("processing failed for node {node_id} at stage {stage_index}: {cause}")]
    ProcessingFailed { node_id: NodeId, stage_index: usize, cause: String },

    /// `send_data` was invoked without a prior successful `execute`.
    #[error("no output to send for node {node_id}")]
    NoOutput { node_id: NodeId },

    /// The downstream hand-off callback could not resolve a host for the target.
    #[error("no connector resolved for target '{target_id}'")]
    NoNextConnector { target_id: String },

    /// A downstream hand-off was attempted without a chain id.
    #[error("missing chain id for downstream hand-off")]
    MissingChainId,

    /// The setup broadcast could not be dispatched at all.
    #[error("broadcast failed for chain {chain_id}")]
    BroadcastFailed { chain_id: String },

    /// A single peer's setup POST failed; other peers are unaffected.
    #[error("setup POST to peer '{peer}' failed: {cause}")]
    SetupPostFailed { peer: String, cause: String },

    /// No monitoring host is registered for a chain; the report is dropped.
    #[error("no monitoring host registered for chain {chain_id}")]
    MonitoringNotFound { chain_id: String },

    /// A control signal carried an unrecognized tag.
    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    /// Malformed configuration or request payload.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure (connection refused, timeout, non-2xx, ...).
    #[error("network error: {0}")]
    Network(String),

    /// I/O error surfaced from the transport or config layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for Results using [`FabricError`].
pub type Result<T> = std::result::Result<T, FabricError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_node_id() {
        let err = FabricError::NoOutput { node_id: NodeId::from_raw("n-1".into()) };
        assert_eq!(err.to_string(), "no output to send for node n-1");
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: FabricError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }
}
