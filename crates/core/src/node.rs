// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node abstractions and the [`Processor`] trait.
//!
//! This module defines the fundamental interface through which caller
//! code plugs into the supervisor: a [`Processor`] is a pure transformer,
//! a [`Node`] is an ordered sequence of them executed over a payload.

use crate::error::FabricError;
use crate::ids::NodeId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A pure, user-supplied transformer: `run(payload) -> payload`.
///
/// Processors have no identity of their own; a [`Node`] owns an ordered
/// sequence of them.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError>;
}

/// The lifecycle state of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Paused,
}

/// A normalized downstream target: a service id plus optional routing metadata.
///
/// Wire messages accept either a bare string or `{targetId, meta}`; both are
/// normalized into this shape at ingress so downstream code sees one shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl TargetRef {
    #[must_use]
    pub fn new(target_id: impl Into<String>) -> Self {
        Self { target_id: target_id.into(), meta: None }
    }
}

/// Ordered sequence of [`Processor`]s, executed over a payload.
///
/// Owns its own status, delay, dependency set, and last-produced output.
/// A `Node` never reaches into the Supervisor that owns it; downstream
/// hand-off is performed by the Supervisor after calling
/// [`Node::take_output_for_send`], which keeps the two free of a cyclic
/// reference.
pub struct Node {
    id: NodeId,
    pipeline: Vec<Arc<dyn Processor>>,
    dependencies: HashSet<NodeId>,
    status: NodeStatus,
    delay: Duration,
    output: Option<serde_json::Value>,
    next_target: Option<TargetRef>,
}

impl Node {
    /// Creates a freshly-minted, empty node in `Pending` status.
    #[must_use]
    pub fn new(dependencies: HashSet<NodeId>) -> Self {
        Self {
            id: NodeId::new(),
            pipeline: Vec::new(),
            dependencies,
            status: NodeStatus::Pending,
            delay: Duration::ZERO,
            output: None,
            next_target: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    #[must_use]
    pub fn dependencies(&self) -> &HashSet<NodeId> {
        &self.dependencies
    }

    #[must_use]
    pub fn next_target(&self) -> Option<&TargetRef> {
        self.next_target.as_ref()
    }

    pub fn set_next_target(&mut self, target: Option<TargetRef>) {
        self.next_target = target;
    }

    /// Extends `pipeline`; only legal while `status` is `Pending` or `Paused`.
    pub fn append_pipeline(
        &mut self,
        processors: impl IntoIterator<Item = Arc<dyn Processor>>,
    ) -> Result<(), FabricError> {
        match self.status {
            NodeStatus::Pending | NodeStatus::Paused => {
                self.pipeline.extend(processors);
                Ok(())
            },
            NodeStatus::InProgress | NodeStatus::Completed | NodeStatus::Failed => {
                Err(FabricError::InvalidTransition { node_id: self.id.clone() })
            },
        }
    }

    /// Applies a status transition, rejecting transitions not in the legal set.
    pub fn update_status(&mut self, next: NodeStatus) -> Result<(), FabricError> {
        let legal = match (self.status, next) {
            (NodeStatus::Pending, NodeStatus::InProgress) => true,
            (NodeStatus::InProgress, NodeStatus::Completed | NodeStatus::Failed) => true,
            (_, NodeStatus::Paused) if self.status != NodeStatus::Paused => {
                !matches!(self.status, NodeStatus::Completed | NodeStatus::Failed)
            },
            (NodeStatus::Paused, NodeStatus::Paused) => true,
            (NodeStatus::Paused, NodeStatus::Pending) => true,
            _ => false,
        };
        if legal {
            self.status = next;
            Ok(())
        } else {
            Err(FabricError::InvalidTransition { node_id: self.id.clone() })
        }
    }

    /// Stores the per-execution delay; takes effect at the next `execute`.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    /// Sleeps `delay`, transitions `Pending -> InProgress`, and applies each
    /// processor in order. Dependency checks are the Supervisor's
    /// responsibility and are not repeated here.
    pub async fn execute(
        &mut self,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, FabricError> {
        self.update_status(NodeStatus::InProgress)?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut value = input;
        for (stage_index, processor) in self.pipeline.iter().enumerate() {
            match processor.run(value).await {
                Ok(next) => value = next,
                Err(cause) => {
                    // InProgress -> Failed is always legal; the unwrap below cannot fail.
                    #[allow(clippy::unwrap_used)]
                    self.update_status(NodeStatus::Failed).unwrap();
                    return Err(FabricError::ProcessingFailed {
                        node_id: self.id.clone(),
                        stage_index,
                        cause: cause.to_string(),
                    });
                },
            }
        }

        self.output = Some(value.clone());
        #[allow(clippy::unwrap_used)]
        self.update_status(NodeStatus::Completed).unwrap();
        Ok(value)
    }

    /// Requires `status == Completed` and a present `output`; clears and
    /// returns it. The caller (the Supervisor) is responsible for actually
    /// forwarding the data downstream.
    pub fn take_output_for_send(&mut self) -> Result<serde_json::Value, FabricError> {
        if self.status != NodeStatus::Completed {
            return Err(FabricError::NoOutput { node_id: self.id.clone() });
        }
        self.output.take().ok_or_else(|| FabricError::NoOutput { node_id: self.id.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AddOne;
    #[async_trait]
    impl Processor for AddOne {
        async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
            let n = payload.as_i64().unwrap_or_default();
            Ok(serde_json::json!(n + 1))
        }
    }

    struct DoubleIt;
    #[async_trait]
    impl Processor for DoubleIt {
        async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
            let n = payload.as_i64().unwrap_or_default();
            Ok(serde_json::json!(n * 2))
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Processor for AlwaysFails {
        async fn run(&self, _payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
            Err(FabricError::Configuration("boom".into()))
        }
    }

    #[tokio::test]
    async fn execute_applies_processors_in_order() {
        let mut node = Node::new(HashSet::new());
        node.append_pipeline([Arc::new(AddOne) as Arc<dyn Processor>, Arc::new(DoubleIt)]).unwrap();
        let out = node.execute(serde_json::json!(3)).await.unwrap();
        assert_eq!(out, serde_json::json!(8));
        assert_eq!(node.status(), NodeStatus::Completed);
    }

    #[tokio::test]
    async fn execute_records_failure_and_stage_index() {
        let mut node = Node::new(HashSet::new());
        node.append_pipeline([Arc::new(AlwaysFails) as Arc<dyn Processor>]).unwrap();
        let err = node.execute(serde_json::json!(1)).await.unwrap_err();
        assert_eq!(node.status(), NodeStatus::Failed);
        match err {
            FabricError::ProcessingFailed { stage_index, .. } => assert_eq!(stage_index, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn append_pipeline_rejected_once_running() {
        let mut node = Node::new(HashSet::new());
        node.update_status(NodeStatus::InProgress).unwrap();
        let err = node.append_pipeline([Arc::new(AddOne) as Arc<dyn Processor>]).unwrap_err();
        assert!(matches!(err, FabricError::InvalidTransition { .. }));
    }

    #[test]
    fn paused_can_resume_to_pending() {
        let mut node = Node::new(HashSet::new());
        node.update_status(NodeStatus::Paused).unwrap();
        node.update_status(NodeStatus::Pending).unwrap();
        assert_eq!(node.status(), NodeStatus::Pending);
    }

    #[test]
    fn repeated_pause_is_idempotent() {
        let mut node = Node::new(HashSet::new());
        node.update_status(NodeStatus::Paused).unwrap();
        node.update_status(NodeStatus::Paused).unwrap();
        assert_eq!(node.status(), NodeStatus::Paused);
    }

    #[test]
    fn completed_node_cannot_be_paused() {
        let mut node = Node::new(HashSet::new());
        node.update_status(NodeStatus::InProgress).unwrap();
        node.update_status(NodeStatus::Completed).unwrap();
        assert!(node.update_status(NodeStatus::Paused).is_err());
    }

    #[tokio::test]
    async fn send_without_execute_fails_with_no_output() {
        let mut node = Node::new(HashSet::new());
        let err = node.take_output_for_send().unwrap_err();
        assert!(matches!(err, FabricError::NoOutput { .. }));
    }

    #[tokio::test]
    async fn take_output_clears_it() {
        let mut node = Node::new(HashSet::new());
        node.append_pipeline([Arc::new(AddOne) as Arc<dyn Processor>]).unwrap();
        node.execute(serde_json::json!(41)).await.unwrap();
        let out = node.take_output_for_send().unwrap();
        assert_eq!(out, serde_json::json!(42));
        assert!(matches!(node.take_output_for_send(), Err(FabricError::NoOutput { .. })));
    }
}
