// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The four injectable callbacks a [`crate::supervisor::Supervisor`] is
//! wired with at construction time, and the default HTTP-backed policy.
//!
//! Keeping these as trait objects injected once, rather than methods on
//! the Supervisor itself, is what keeps a [`fabricflow_core::Node`] free of
//! any reference back to its owner: the Supervisor calls a callback, the
//! callback calls out over HTTP, nothing ever calls back into a `Node`.

use crate::monitoring_agent::MonitoringAgent;
use crate::resolver::{HostResolver, MonitoringResolver};
use crate::transport::HttpPoster;
use async_trait::async_trait;
use fabricflow_api::{BroadcastNotifyRequest, RemoteStageConfig, RunRequest, SetupRequest};
use fabricflow_core::{
    BroadcastReportingMessage, ChainId, FabricError, ReportingMessage, StageConfig, TargetRef,
};
use std::sync::Arc;

/// The policy a Supervisor is wired with at construction.
#[async_trait]
pub trait CallbackWiring: Send + Sync {
    /// Broadcasts setup to every remote stage's first service. Each POST is
    /// spawned on its own task; this method returns once all are dispatched,
    /// not once they complete.
    async fn broadcast_setup(&self, chain_id: &ChainId, stages: &[StageConfig]);

    /// Hands data to a downstream peer and awaits the result.
    async fn remote_service(
        &self,
        chain_id: &ChainId,
        target: &TargetRef,
        data: serde_json::Value,
    ) -> Result<(), FabricError>;

    /// Records a single node's status change.
    async fn reporting(&self, message: ReportingMessage);

    /// Records a chain-level aggregate.
    async fn broadcast_reporting(&self, message: BroadcastReportingMessage);
}

/// Paths the default wiring POSTs to on a resolved peer.
#[derive(Debug, Clone)]
pub struct WirePaths {
    pub setup: String,
    pub run: String,
    pub notify: String,
}

impl Default for WirePaths {
    fn default() -> Self {
        Self {
            setup: "/fabric/setup".to_string(),
            run: "/fabric/run".to_string(),
            notify: "/fabric/notify".to_string(),
        }
    }
}

/// The default HTTP-backed callback policy described in the supervisor's
/// callback-wiring contract: fire-and-forget setup broadcast, awaited
/// downstream hand-off, and reporting routed through the local
/// [`MonitoringAgent`] plus an awaited notify POST to the chain's
/// monitoring host.
pub struct DefaultWiring {
    host_resolver: Arc<dyn HostResolver>,
    monitoring_resolver: Arc<dyn MonitoringResolver>,
    poster: Arc<dyn HttpPoster>,
    monitoring: Arc<MonitoringAgent>,
    paths: WirePaths,
}

impl DefaultWiring {
    #[must_use]
    pub fn new(
        host_resolver: Arc<dyn HostResolver>,
        monitoring_resolver: Arc<dyn MonitoringResolver>,
        poster: Arc<dyn HttpPoster>,
        monitoring: Arc<MonitoringAgent>,
        paths: WirePaths,
    ) -> Self {
        Self { host_resolver, monitoring_resolver, poster, monitoring, paths }
    }
}

#[async_trait]
impl CallbackWiring for DefaultWiring {
    async fn broadcast_setup(&self, chain_id: &ChainId, stages: &[StageConfig]) {
        for (stage_index, stage) in stages.iter().enumerate() {
            let Some(target) = stage.first_target() else {
                tracing::warn!(stage_index, "stage has no services, skipping setup broadcast");
                continue;
            };
            if stage.services.len() > 1 {
                tracing::warn!(
                    stage_index,
                    fan_out = stage.services.len(),
                    addressed = %target.target_id,
                    "stage has more than one service, only the first is addressed by setup"
                );
            }
            let host = match self.host_resolver.resolve(&target.target_id, target.meta.as_ref()) {
                Ok(host) => host,
                Err(err) => {
                    tracing::warn!(stage_index, target = %target.target_id, %err, "setup broadcast skipped");
                    continue;
                },
            };

            let url = format!("{host}{}", self.paths.setup);
            let body = SetupRequest {
                chain_id: chain_id.as_str().to_string(),
                remote_configs: RemoteStageConfig::from_stage(stage),
            };
            let poster = Arc::clone(&self.poster);
            let chain_id = chain_id.clone();

            tokio::spawn(async move {
                let Ok(payload) = serde_json::to_value(&body) else {
                    tracing::error!(%chain_id, "failed to serialize setup request");
                    return;
                };
                if let Err(err) = poster.post_json(&url, &payload).await {
                    tracing::warn!(%chain_id, %url, %err, "setup POST failed");
                }
            });
        }
    }

    async fn remote_service(
        &self,
        chain_id: &ChainId,
        target: &TargetRef,
        data: serde_json::Value,
    ) -> Result<(), FabricError> {
        if chain_id.as_str().is_empty() {
            return Err(FabricError::MissingChainId);
        }
        let host = self.host_resolver.resolve(&target.target_id, target.meta.as_ref())?;
        let url = format!("{host}{}", self.paths.run);
        let body = RunRequest {
            chain_id: chain_id.as_str().to_string(),
            target_id: target.target_id.clone(),
            meta: target.meta.clone(),
            data,
        };
        let payload = serde_json::to_value(&body)
            .map_err(|e| FabricError::Configuration(format!("run request: {e}")))?;
        let response = self.poster.post_json(&url, &payload).await?;
        if !response.is_success() {
            return Err(FabricError::Network(format!(
                "peer {url} responded with status {}",
                response.status
            )));
        }
        Ok(())
    }

    async fn reporting(&self, message: ReportingMessage) {
        self.monitoring.record_status(&message.chain_id, &message.node_id, message.status);
    }

    async fn broadcast_reporting(&self, message: BroadcastReportingMessage) {
        let host = match self.monitoring_resolver.resolve(&message.chain_id).await {
            Ok(host) => host,
            Err(err) => {
                tracing::warn!(chain_id = %message.chain_id, %err, "broadcast report dropped");
                return;
            },
        };
        let url = format!("{host}{}", self.paths.notify);
        let body = BroadcastNotifyRequest {
            chain_id: message.chain_id.clone(),
            completed: message.completed.iter().map(ToString::to_string).collect(),
            pending: message.pending.iter().map(ToString::to_string).collect(),
            failed: message.failed.iter().map(ToString::to_string).collect(),
            timestamp: message.timestamp,
        };
        let Ok(payload) = serde_json::to_value(&body) else {
            tracing::error!(chain_id = %message.chain_id, "failed to serialize notify request");
            return;
        };
        if let Err(err) = self.poster.post_json(&url, &payload).await {
            tracing::warn!(chain_id = %message.chain_id, %url, %err, "notify POST failed");
        }
    }
}
