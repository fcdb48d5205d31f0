// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Peer resolution: mapping a target id or chain id to a base URL.
//!
//! Resolvers are trait objects so the connector binary can back them with
//! whatever source of truth it has (static config, service discovery, a
//! database) without the engine crate knowing about any of that.

use async_trait::async_trait;
use fabricflow_core::FabricError;
use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves a downstream target id to the base URL of the peer that hosts it.
///
/// `meta` carries the target's opaque `TargetRef.meta`, passed through in
/// case a discovery backend keys on it (e.g. a region hint); the static
/// table-backed resolver ignores it.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, target_id: &str, meta: Option<&serde_json::Value>) -> Result<String, FabricError>;
}

/// A resolver backed by a static, in-memory `target_id -> base_url` table.
///
/// Grounded on the connector configuration's peer table: entries are loaded
/// once at startup and looked up read-only per request.
#[derive(Debug, Default)]
pub struct StaticHostResolver {
    hosts: RwLock<HashMap<String, String>>,
}

impl StaticHostResolver {
    #[must_use]
    pub fn new(hosts: HashMap<String, String>) -> Self {
        Self { hosts: RwLock::new(hosts) }
    }

    /// Adds or replaces a single mapping, e.g. after a dynamic peer join.
    pub fn insert(&self, target_id: impl Into<String>, base_url: impl Into<String>) {
        #[allow(clippy::unwrap_used)]
        self.hosts.write().unwrap().insert(target_id.into(), base_url.into());
    }
}

impl HostResolver for StaticHostResolver {
    fn resolve(&self, target_id: &str, _meta: Option<&serde_json::Value>) -> Result<String, FabricError> {
        #[allow(clippy::unwrap_used)]
        self.hosts
            .read()
            .unwrap()
            .get(target_id)
            .cloned()
            .ok_or_else(|| FabricError::NoNextConnector { target_id: target_id.to_string() })
    }
}

/// Resolves a chain id to the base URL of its monitoring host.
///
/// Unlike [`HostResolver`], this is async: a monitoring backend is more
/// likely to live behind its own discovery round trip (e.g. a registry
/// lookup) than the downstream peer table is.
#[async_trait]
pub trait MonitoringResolver: Send + Sync {
    async fn resolve(&self, chain_id: &str) -> Result<String, FabricError>;
}

/// A resolver backed by a static, in-memory `chain_id -> base_url` table,
/// populated as chains are registered with [`crate::monitoring_agent::MonitoringAgent`].
#[derive(Debug, Default)]
pub struct StaticMonitoringResolver {
    hosts: RwLock<HashMap<String, String>>,
}

impl StaticMonitoringResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, chain_id: impl Into<String>, base_url: impl Into<String>) {
        #[allow(clippy::unwrap_used)]
        self.hosts.write().unwrap().insert(chain_id.into(), base_url.into());
    }
}

#[async_trait]
impl MonitoringResolver for StaticMonitoringResolver {
    async fn resolve(&self, chain_id: &str) -> Result<String, FabricError> {
        #[allow(clippy::unwrap_used)]
        self.hosts
            .read()
            .unwrap()
            .get(chain_id)
            .cloned()
            .ok_or_else(|| FabricError::MonitoringNotFound { chain_id: chain_id.to_string() })
    }
}
