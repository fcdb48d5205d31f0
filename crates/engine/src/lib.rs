// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! FabricFlow Engine — the Supervisor, its callback wiring, peer
//! resolution, and process-wide monitoring state.
//!
//! ## Modules
//!
//! - [`supervisor`]: the [`supervisor::Supervisor`] control-signal dispatcher and chain-start algorithm
//! - [`callbacks`]: the four injectable callbacks ([`callbacks::CallbackWiring`]) and the default HTTP policy
//! - [`resolver`]: [`resolver::HostResolver`] / [`resolver::MonitoringResolver`] traits and static implementations
//! - [`transport`]: the [`transport::HttpPoster`] trait and its `reqwest`-backed implementation
//! - [`monitoring_agent`]: process-wide per-chain monitoring state

pub mod callbacks;
pub mod monitoring_agent;
pub mod resolver;
pub mod supervisor;
pub mod transport;

pub use callbacks::{CallbackWiring, DefaultWiring, WirePaths};
pub use monitoring_agent::MonitoringAgent;
pub use resolver::{HostResolver, MonitoringResolver, StaticHostResolver, StaticMonitoringResolver};
pub use supervisor::Supervisor;
pub use transport::{HttpPoster, PostResponse, ReqwestPoster};
