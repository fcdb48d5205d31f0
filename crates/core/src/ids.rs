// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Identifiers for nodes and chains.
//!
//! [`NodeId`] is a fresh UUID-backed identifier minted at node creation and
//! never reused. [`ChainId`] follows the fabric-wide convention
//! `<initiator-uid>-<unix-ms>-<8-hex>`, which keeps collisions vanishingly
//! unlikely without requiring a coordinated allocator across peers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a [`crate::node::Node`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Mints a fresh, never-reused id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wraps an existing string as a [`NodeId`], e.g. one received over the wire.
    #[must_use]
    pub fn from_raw(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for a chain, of the form `<initiator-uid>-<unix-ms>-<8-hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    /// Allocates a fresh chain id for the given initiator.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch, which would
    /// indicate a misconfigured host clock rather than a recoverable error.
    #[must_use]
    pub fn generate(initiator_uid: &str) -> Self {
        #[allow(clippy::unwrap_used)]
        let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{initiator_uid}-{millis}-{}", &suffix[..8]))
    }

    #[must_use]
    pub fn from_raw(id: String) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChainId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn node_ids_are_unique() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(NodeId::new()));
        }
    }

    #[test]
    fn chain_id_matches_shape() {
        let id = ChainId::generate("ci");
        let raw = id.as_str();
        assert!(raw.starts_with("ci-"));
        let hex_suffix = &raw[raw.rfind('-').expect("chain id must contain a hyphen") + 1..];
        assert_eq!(hex_suffix.len(), 8);
        assert!(hex_suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn chain_ids_are_unique_across_many_allocations() {
        let mut seen = HashSet::new();
        for _ in 0..50_000 {
            assert!(seen.insert(ChainId::generate("ci")));
        }
    }
}
