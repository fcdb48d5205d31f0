// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! FabricFlow Core — node, chain, and monitoring primitives for the
//! distributed pipeline supervisor.
//!
//! ## Modules
//!
//! - [`node`]: the [`node::Processor`] trait and the [`node::Node`] state machine
//! - [`chain`]: chain/stage configuration types
//! - [`monitoring`]: per-chain aggregate node state ([`monitoring::ChainMonitor`])
//! - [`ids`]: [`ids::NodeId`] and [`ids::ChainId`]
//! - [`error`]: the [`error::FabricError`] taxonomy

pub use async_trait::async_trait;

pub mod chain;
pub mod error;
pub mod ids;
pub mod monitoring;
pub mod node;

pub use chain::{Location, ServiceEntry, StageConfig};
pub use error::FabricError;
pub use ids::{ChainId, NodeId};
pub use monitoring::{BroadcastReportingMessage, ChainMonitor, ChainState, ReportingMessage};
pub use node::{Node, NodeStatus, Processor, TargetRef};
