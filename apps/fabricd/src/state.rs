// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared application state threaded through every Axum handler.

use crate::config::Config;
use fabricflow_engine::{MonitoringAgent, StaticHostResolver, StaticMonitoringResolver, Supervisor};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub supervisor: Arc<Supervisor>,
    pub monitoring: Arc<MonitoringAgent>,
    /// Concrete peer table, held alongside the `Arc<dyn HostResolver>` given
    /// to the supervisor's wiring so the setup handler can resolve a chain
    /// initiator's uid to a base URL directly.
    pub host_resolver: Arc<StaticHostResolver>,
    /// Concrete monitoring-host table, populated by the setup handler as
    /// inbound broadcasts name their initiator.
    pub monitoring_resolver: Arc<StaticMonitoringResolver>,
}
