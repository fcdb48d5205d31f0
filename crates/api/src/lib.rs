// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! fabricflow-api: the wire contract between FabricFlow connectors.
//!
//! All peer-to-peer communication uses JSON over HTTP POST. This crate
//! defines the three inbound message shapes (setup, run, notify) and the
//! in-process [`SupervisorSignal`] control surface, normalizing wire-level
//! ambiguity (an unrecognized signal tag) into an explicit variant instead
//! of a deserialization failure, matching §4.3/§8-S6 of the supervisor's
//! control-signal contract: an unknown signal is reported, never fatal.

use fabricflow_core::{ChainId, NodeId, NodeStatus, StageConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Body of `POST <peer>/<setup-path>`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetupRequest {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "remoteConfigs")]
    pub remote_configs: RemoteStageConfig,
}

/// `remoteConfigs` strips `location` from the stage config: a recipient
/// materializes whichever stages its own resolver can place.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemoteStageConfig {
    pub services: Vec<String>,
}

impl RemoteStageConfig {
    #[must_use]
    pub fn from_stage(stage: &StageConfig) -> Self {
        Self {
            services: stage.services.iter().map(|s| s.normalize().target_id).collect(),
        }
    }
}

/// Body of `POST <peer>/<run-path>`: a downstream data hand-off.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunRequest {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    pub data: serde_json::Value,
}

/// Body of `POST <monitoring-host>/<notify-path>`: a single node's report.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotifyRequest {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    pub status: NodeStatus,
    pub timestamp: u64,
}

/// The Supervisor's in-process control-signal surface, also reachable over
/// HTTP via `POST /signal` on the connector binary (see `apps/fabricd`).
///
/// Deserializes from `{"signal": "NODE_CREATE", ...}`-shaped JSON. A tag
/// that doesn't match one of the six known signals becomes
/// [`SupervisorSignal::Unknown`] instead of a hard parse failure, so a
/// malformed-but-well-formed-JSON request can still be reported and
/// dropped rather than rejected at the transport boundary.
#[derive(Debug, Clone)]
pub enum SupervisorSignal {
    NodeCreate { dependencies: Vec<NodeId> },
    NodeDelete { id: NodeId },
    NodePause { id: NodeId },
    NodeDelay { id: NodeId, delay_ms: u64 },
    NodeRun { id: NodeId, data: serde_json::Value },
    NodeSendData { id: NodeId },
    Unknown(String),
}

impl<'de> Deserialize<'de> for SupervisorSignal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let signal = raw.get("signal").and_then(serde_json::Value::as_str).unwrap_or("");

        let field = |name: &str| raw.get(name).cloned();
        let as_node_id = |v: Option<serde_json::Value>| -> Option<NodeId> {
            v.and_then(|v| v.as_str().map(|s| NodeId::from_raw(s.to_string())))
        };

        let parsed = match signal {
            "NODE_CREATE" => {
                let dependencies = field("dependencies")
                    .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
                    .unwrap_or_default()
                    .into_iter()
                    .map(NodeId::from_raw)
                    .collect();
                Some(Self::NodeCreate { dependencies })
            },
            "NODE_DELETE" => as_node_id(field("id")).map(|id| Self::NodeDelete { id }),
            "NODE_PAUSE" => as_node_id(field("id")).map(|id| Self::NodePause { id }),
            "NODE_DELAY" => {
                let id = as_node_id(field("id"));
                let delay_ms = field("delay").and_then(|v| v.as_u64());
                match (id, delay_ms) {
                    (Some(id), Some(delay_ms)) => Some(Self::NodeDelay { id, delay_ms }),
                    _ => None,
                }
            },
            "NODE_RUN" => {
                let id = as_node_id(field("id"));
                let data = field("data").unwrap_or(serde_json::Value::Null);
                id.map(|id| Self::NodeRun { id, data })
            },
            "NODE_SEND_DATA" => as_node_id(field("id")).map(|id| Self::NodeSendData { id }),
            _ => None,
        };

        Ok(parsed.unwrap_or_else(|| Self::Unknown(signal.to_string())))
    }
}

impl Serialize for SupervisorSignal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        match self {
            Self::NodeCreate { dependencies } => {
                map.serialize_entry("signal", "NODE_CREATE")?;
                map.serialize_entry("dependencies", dependencies)?;
            },
            Self::NodeDelete { id } => {
                map.serialize_entry("signal", "NODE_DELETE")?;
                map.serialize_entry("id", id)?;
            },
            Self::NodePause { id } => {
                map.serialize_entry("signal", "NODE_PAUSE")?;
                map.serialize_entry("id", id)?;
            },
            Self::NodeDelay { id, delay_ms } => {
                map.serialize_entry("signal", "NODE_DELAY")?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("delay", delay_ms)?;
            },
            Self::NodeRun { id, data } => {
                map.serialize_entry("signal", "NODE_RUN")?;
                map.serialize_entry("id", id)?;
                map.serialize_entry("data", data)?;
            },
            Self::NodeSendData { id } => {
                map.serialize_entry("signal", "NODE_SEND_DATA")?;
                map.serialize_entry("id", id)?;
            },
            Self::Unknown(tag) => {
                map.serialize_entry("signal", tag)?;
            },
        }
        map.end()
    }
}

/// Body of `POST <monitoring-host>/<notify-path>` for a chain-level
/// aggregate report, reusing the notify path with a bucket breakdown
/// instead of `NotifyRequest`'s per-node shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BroadcastNotifyRequest {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    pub completed: Vec<String>,
    pub pending: Vec<String>,
    pub failed: Vec<String>,
    pub timestamp: u64,
}

/// Reporting for a chain's aggregate state, exposed read-only by the
/// connector's `GET /chains/{id}/state` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChainStateResponse {
    pub chain_id: String,
    pub completed: Vec<String>,
    pub pending: Vec<String>,
    pub failed: Vec<String>,
}

impl ChainStateResponse {
    #[must_use]
    pub fn new(chain_id: &ChainId, state: &fabricflow_core::ChainState) -> Self {
        Self {
            chain_id: chain_id.as_str().to_string(),
            completed: state.completed.iter().map(ToString::to_string).collect(),
            pending: state.pending.iter().map(ToString::to_string).collect(),
            failed: state.failed.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_signal_does_not_fail_to_parse() {
        let signal: SupervisorSignal = serde_json::from_str(r#"{"signal":"BOGUS"}"#).unwrap();
        assert!(matches!(signal, SupervisorSignal::Unknown(ref s) if s == "BOGUS"));
    }

    #[test]
    fn node_run_round_trips_id_and_data() {
        let signal: SupervisorSignal =
            serde_json::from_str(r#"{"signal":"NODE_RUN","id":"n-1","data":42}"#).unwrap();
        match signal {
            SupervisorSignal::NodeRun { id, data } => {
                assert_eq!(id.as_str(), "n-1");
                assert_eq!(data, serde_json::json!(42));
            },
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn remote_stage_config_strips_location() {
        let stage: StageConfig =
            serde_json::from_str(r#"{"services":["a","b"],"location":"remote"}"#).unwrap();
        let remote = RemoteStageConfig::from_stage(&stage);
        assert_eq!(remote.services, vec!["a".to_string(), "b".to_string()]);
    }
}
