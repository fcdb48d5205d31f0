// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The process-wide [`Supervisor`]: owns every [`Node`] on this connector,
//! dispatches control signals, and drives chain start.

use crate::callbacks::CallbackWiring;
use crate::monitoring_agent::MonitoringAgent;
use fabricflow_api::SupervisorSignal;
use fabricflow_core::{
    BroadcastReportingMessage, ChainId, FabricError, Node, NodeId, NodeStatus, ReportingMessage,
    StageConfig, TargetRef,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Process-wide singleton owning every node this connector is executing.
///
/// `uid` is fixed at construction. Nodes are individually locked so two
/// unrelated nodes can run concurrently; the outer map lock is only held
/// for the short duration of an insert/remove/lookup.
pub struct Supervisor {
    uid: String,
    nodes: Mutex<HashMap<NodeId, Arc<Mutex<Node>>>>,
    /// Chain a node was created under, when known. Nodes minted through the
    /// chain-start algorithm always have an entry; nodes minted through a
    /// bare `NodeCreate` signal do not, and status reports for them are
    /// skipped (logged) rather than sent to a nonexistent chain.
    node_chain: Mutex<HashMap<NodeId, ChainId>>,
    /// `target_id -> node_id`, established as stages are materialized
    /// locally, so an inbound run POST can route `data` to the right node.
    target_routes: Mutex<HashMap<String, NodeId>>,
    monitoring: Arc<MonitoringAgent>,
    wiring: Arc<dyn CallbackWiring>,
}

impl Supervisor {
    #[must_use]
    pub fn new(uid: impl Into<String>, wiring: Arc<dyn CallbackWiring>, monitoring: Arc<MonitoringAgent>) -> Self {
        Self {
            uid: uid.into(),
            nodes: Mutex::new(HashMap::new()),
            node_chain: Mutex::new(HashMap::new()),
            target_routes: Mutex::new(HashMap::new()),
            monitoring,
            wiring,
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Registers `node_id` as the local handler for `target_id`, so a
    /// subsequent inbound run POST for that target routes here.
    pub async fn bind_target(&self, target_id: impl Into<String>, node_id: NodeId) {
        self.target_routes.lock().await.insert(target_id.into(), node_id);
    }

    pub async fn route_for_target(&self, target_id: &str) -> Option<NodeId> {
        self.target_routes.lock().await.get(target_id).cloned()
    }

    /// Creates and registers a bare node, with no chain association.
    pub async fn create_node(&self, dependencies: HashSet<NodeId>) -> NodeId {
        let node = Node::new(dependencies);
        let id = node.id().clone();
        self.nodes.lock().await.insert(id.clone(), Arc::new(Mutex::new(node)));
        id
    }

    /// Creates and registers a node, associating it with `chain_id` for
    /// reporting and dependency checks. Used both by chain start and by the
    /// inbound setup receiver, which materializes nodes for a chain it did
    /// not initiate.
    pub async fn create_node_for_chain(&self, chain_id: &ChainId, dependencies: HashSet<NodeId>) -> NodeId {
        let id = self.create_node(dependencies).await;
        self.node_chain.lock().await.insert(id.clone(), chain_id.clone());
        self.monitoring.add_node(chain_id.as_str(), id.clone());
        id
    }

    pub async fn delete_node(&self, id: &NodeId) {
        if self.nodes.lock().await.remove(id).is_none() {
            tracing::warn!(node_id = %id, "NodeDelete for unknown node id, ignoring");
        }
        self.node_chain.lock().await.remove(id);
    }

    async fn node_handle(&self, id: &NodeId) -> Result<Arc<Mutex<Node>>, FabricError> {
        self.nodes
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| FabricError::InvalidTransition { node_id: id.clone() })
    }

    pub async fn pause_node(&self, id: &NodeId) -> Result<(), FabricError> {
        let handle = self.node_handle(id).await?;
        let mut node = handle.lock().await;
        node.update_status(NodeStatus::Paused)
    }

    pub async fn delay_node(&self, id: &NodeId, delay: Duration) -> Result<(), FabricError> {
        let handle = self.node_handle(id).await?;
        let mut node = handle.lock().await;
        node.set_delay(delay);
        Ok(())
    }

    /// Extends a node's processor pipeline and, optionally, its downstream target.
    pub async fn append_pipeline(
        &self,
        id: &NodeId,
        processors: Vec<Arc<dyn fabricflow_core::Processor>>,
        next_target: Option<TargetRef>,
    ) -> Result<(), FabricError> {
        let handle = self.node_handle(id).await?;
        let mut node = handle.lock().await;
        node.append_pipeline(processors)?;
        if next_target.is_some() {
            node.set_next_target(next_target);
        }
        Ok(())
    }

    async fn chain_for(&self, id: &NodeId) -> Option<ChainId> {
        self.node_chain.lock().await.get(id).cloned()
    }

    async fn report(&self, id: &NodeId, status: NodeStatus) {
        let Some(chain_id) = self.chain_for(id).await else {
            tracing::debug!(node_id = %id, "status report skipped, no chain association");
            return;
        };
        self.wiring
            .reporting(ReportingMessage::now(chain_id.as_str().to_string(), id.clone(), status))
            .await;

        if let Ok(snapshot) = self.monitoring.snapshot(chain_id.as_str()) {
            self.wiring
                .broadcast_reporting(BroadcastReportingMessage {
                    chain_id: chain_id.as_str().to_string(),
                    completed: snapshot.completed,
                    pending: snapshot.pending,
                    failed: snapshot.failed,
                    timestamp: now_millis(),
                })
                .await;
        }
    }

    /// Checks that every dependency of `id` has completed. A dependency
    /// missing from this process entirely counts as unmet.
    async fn dependencies_met(&self, dependencies: &HashSet<NodeId>) -> bool {
        let nodes = self.nodes.lock().await;
        for dep in dependencies {
            match nodes.get(dep) {
                Some(handle) => {
                    if handle.lock().await.status() != NodeStatus::Completed {
                        return false;
                    }
                },
                None => return false,
            }
        }
        true
    }

    /// `NodeRun`: checks dependencies, then executes the node's pipeline.
    pub async fn run_node(
        &self,
        id: &NodeId,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, FabricError> {
        let handle = self.node_handle(id).await?;
        let dependencies = handle.lock().await.dependencies().clone();

        if !self.dependencies_met(&dependencies).await {
            let unmet: Vec<NodeId> = dependencies.into_iter().collect();
            self.report(id, NodeStatus::Failed).await;
            return Err(FabricError::DependenciesNotMet { node_id: id.clone(), ids: unmet });
        }

        let result = handle.lock().await.execute(data).await;
        match &result {
            Ok(_) => self.report(id, NodeStatus::Completed).await,
            Err(_) => self.report(id, NodeStatus::Failed).await,
        }
        result
    }

    /// `NodeSendData`: takes the node's last output and hands it to the
    /// remote-service callback at its configured next target.
    pub async fn send_data(&self, id: &NodeId) -> Result<(), FabricError> {
        let handle = self.node_handle(id).await?;
        let (output, target) = {
            let mut node = handle.lock().await;
            let output = node.take_output_for_send()?;
            let target = node.next_target().cloned();
            (output, target)
        };
        let Some(target) = target else {
            return Err(FabricError::NoNextConnector { target_id: id.to_string() });
        };
        let chain_id = self.chain_for(id).await.unwrap_or_else(|| ChainId::from_raw(String::new()));
        self.wiring.remote_service(&chain_id, &target, output).await
    }

    /// Applies a [`SupervisorSignal`], returning an optional JSON body for
    /// the HTTP caller (presently only `NodeCreate` returns one: its id).
    pub async fn handle_signal(
        &self,
        signal: SupervisorSignal,
    ) -> Result<serde_json::Value, FabricError> {
        match signal {
            SupervisorSignal::NodeCreate { dependencies } => {
                let id = self.create_node(dependencies.into_iter().collect()).await;
                Ok(serde_json::json!({ "id": id.as_str() }))
            },
            SupervisorSignal::NodeDelete { id } => {
                self.delete_node(&id).await;
                Ok(serde_json::Value::Null)
            },
            SupervisorSignal::NodePause { id } => {
                self.pause_node(&id).await?;
                Ok(serde_json::Value::Null)
            },
            SupervisorSignal::NodeDelay { id, delay_ms } => {
                self.delay_node(&id, Duration::from_millis(delay_ms)).await?;
                Ok(serde_json::Value::Null)
            },
            SupervisorSignal::NodeRun { id, data } => {
                let out = self.run_node(&id, data).await?;
                Ok(out)
            },
            SupervisorSignal::NodeSendData { id } => {
                self.send_data(&id).await?;
                Ok(serde_json::Value::Null)
            },
            SupervisorSignal::Unknown(tag) => {
                tracing::warn!(signal = %tag, "unrecognized control signal, ignoring");
                Err(FabricError::UnknownSignal(tag))
            },
        }
    }

    /// Chain start: allocates a fresh [`ChainId`], creates local nodes for
    /// each `local` stage, and fires the setup broadcast for every `remote`
    /// stage. Returns the new chain id and the local nodes created, indexed
    /// by stage position, so the caller can wire per-stage processors.
    pub async fn start_chain(&self, stages: Vec<StageConfig>) -> Result<(ChainId, Vec<Option<NodeId>>), FabricError> {
        let chain_id = ChainId::generate(&self.uid);
        self.monitoring.register_chain(chain_id.as_str());

        let mut local_nodes = Vec::with_capacity(stages.len());
        let mut remote_stages = Vec::new();

        for (stage_index, stage) in stages.iter().enumerate() {
            if stage.services.is_empty() {
                tracing::warn!(stage_index, %chain_id, "stage has no services, skipping");
                local_nodes.push(None);
                continue;
            }
            match stage.location {
                fabricflow_core::Location::Local => {
                    let id = self.create_node_for_chain(&chain_id, HashSet::new()).await;
                    if let Some(target) = stage.first_target() {
                        self.bind_target(target.target_id.clone(), id.clone()).await;
                    }
                    local_nodes.push(Some(id));
                },
                fabricflow_core::Location::Remote => {
                    remote_stages.push(stage.clone());
                    local_nodes.push(None);
                },
            }
        }

        if !remote_stages.is_empty() {
            self.wiring.broadcast_setup(&chain_id, &remote_stages).await;
        }

        Ok((chain_id, local_nodes))
    }

    #[must_use]
    pub fn target_ref(target_id: impl Into<String>, meta: Option<serde_json::Value>) -> TargetRef {
        TargetRef { target_id: target_id.into(), meta }
    }
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    #[allow(clippy::unwrap_used)]
    let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::{DefaultWiring, WirePaths};
    use crate::resolver::{StaticHostResolver, StaticMonitoringResolver};
    use crate::transport::{HttpPoster, PostResponse};
    use async_trait::async_trait;
    use fabricflow_core::Processor;
    use std::collections::HashMap;

    struct NoopPoster;
    #[async_trait]
    impl HttpPoster for NoopPoster {
        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<PostResponse, FabricError> {
            Ok(PostResponse { status: 200, body: serde_json::Value::Null })
        }
    }

    fn supervisor() -> Supervisor {
        let monitoring = Arc::new(MonitoringAgent::new());
        let wiring = DefaultWiring::new(
            Arc::new(StaticHostResolver::new(HashMap::new())),
            Arc::new(StaticMonitoringResolver::new()),
            Arc::new(NoopPoster),
            Arc::clone(&monitoring),
            WirePaths::default(),
        );
        Supervisor::new("sup-1", Arc::new(wiring), monitoring)
    }

    struct Identity;
    #[async_trait]
    impl Processor for Identity {
        async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
            Ok(payload)
        }
    }

    struct FailingPoster;
    #[async_trait]
    impl HttpPoster for FailingPoster {
        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<PostResponse, FabricError> {
            Ok(PostResponse { status: 500, body: serde_json::Value::Null })
        }
    }

    #[tokio::test]
    async fn node_run_fails_dependencies_not_met() {
        let sup = supervisor();
        let dep = NodeId::new();
        let mut deps = HashSet::new();
        deps.insert(dep);
        let id = sup.create_node(deps).await;
        let err = sup.run_node(&id, serde_json::json!(1)).await.unwrap_err();
        assert!(matches!(err, FabricError::DependenciesNotMet { .. }));
    }

    #[tokio::test]
    async fn node_run_succeeds_once_dependency_completes() {
        let sup = supervisor();
        let dep_id = sup.create_node(HashSet::new()).await;
        {
            let handle = sup.node_handle(&dep_id).await.unwrap();
            let mut node = handle.lock().await;
            node.append_pipeline([Arc::new(Identity) as Arc<dyn Processor>]).unwrap();
            node.execute(serde_json::json!(1)).await.unwrap();
        }

        let mut deps = HashSet::new();
        deps.insert(dep_id);
        let id = sup.create_node(deps).await;
        {
            let handle = sup.node_handle(&id).await.unwrap();
            handle.lock().await.append_pipeline([Arc::new(Identity) as Arc<dyn Processor>]).unwrap();
        }

        let out = sup.run_node(&id, serde_json::json!(42)).await.unwrap();
        assert_eq!(out, serde_json::json!(42));
    }

    #[tokio::test]
    async fn unknown_node_operations_error() {
        let sup = supervisor();
        let bogus = NodeId::new();
        assert!(sup.pause_node(&bogus).await.is_err());
        assert!(sup.run_node(&bogus, serde_json::json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn start_chain_creates_local_nodes_and_skips_empty_stages() {
        let sup = supervisor();
        let stages = vec![
            StageConfig { services: vec![], location: fabricflow_core::Location::Local, processor: None },
            StageConfig {
                services: vec![fabricflow_core::ServiceEntry::Bare("svc-a".to_string())],
                location: fabricflow_core::Location::Local,
                processor: None,
            },
        ];
        let (chain_id, nodes) = sup.start_chain(stages).await.unwrap();
        assert!(chain_id.as_str().starts_with("sup-1-"));
        assert!(nodes[0].is_none());
        assert!(nodes[1].is_some());
    }

    #[tokio::test]
    async fn handle_signal_unknown_tag_errors_without_mutating_state() {
        let sup = supervisor();
        let result = sup.handle_signal(SupervisorSignal::Unknown("BOGUS".to_string())).await;
        assert!(matches!(result, Err(FabricError::UnknownSignal(_))));
    }

    #[tokio::test]
    async fn send_data_failure_leaves_node_completed() {
        let mut hosts = HashMap::new();
        hosts.insert("svc-b".to_string(), "http://peer-b".to_string());
        let monitoring = Arc::new(MonitoringAgent::new());
        let wiring = DefaultWiring::new(
            Arc::new(StaticHostResolver::new(hosts)),
            Arc::new(StaticMonitoringResolver::new()),
            Arc::new(FailingPoster),
            Arc::clone(&monitoring),
            WirePaths::default(),
        );
        let sup = Supervisor::new("sup-1", Arc::new(wiring), monitoring);

        let id = sup.create_node(HashSet::new()).await;
        sup.append_pipeline(
            &id,
            vec![Arc::new(Identity) as Arc<dyn Processor>],
            Some(TargetRef::new("svc-b")),
        )
        .await
        .unwrap();
        sup.run_node(&id, serde_json::json!(1)).await.unwrap();

        let err = sup.send_data(&id).await.unwrap_err();
        assert!(matches!(err, FabricError::Network(_)));

        let handle = sup.node_handle(&id).await.unwrap();
        assert_eq!(handle.lock().await.status(), NodeStatus::Completed);
    }
}
