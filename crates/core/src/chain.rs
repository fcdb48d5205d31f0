// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Chain configuration types.
//!
//! A chain is an ordered list of [`StageConfig`]s declared once by an
//! initiator. Each stage names one or more services and whether the stage
//! is expected to run on this host or a remote peer.

use crate::node::TargetRef;
use serde::{Deserialize, Serialize};

/// Where a stage's node(s) should be materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Local,
    Remote,
}

/// Wire shape for a stage's service list: `string | {targetId, meta}`.
///
/// Normalized into [`TargetRef`] at ingress so downstream code only ever
/// deals with one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Bare(String),
    Detailed {
        #[serde(rename = "targetId")]
        target_id: String,
        #[serde(default)]
        meta: Option<serde_json::Value>,
    },
}

impl ServiceEntry {
    /// Normalizes a wire-shape entry into a [`TargetRef`].
    #[must_use]
    pub fn normalize(&self) -> TargetRef {
        match self {
            Self::Bare(target_id) => TargetRef::new(target_id.clone()),
            Self::Detailed { target_id, meta } => {
                TargetRef { target_id: target_id.clone(), meta: meta.clone() }
            },
        }
    }
}

/// One position in a chain's ordered configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Non-empty ordered list of target identifiers (a stage may fan out;
    /// only the first is currently addressed by the setup broadcast).
    pub services: Vec<ServiceEntry>,
    pub location: Location,
    /// Name of a built-in demo processor to install for this stage, used
    /// only by the connector's `POST /chains` convenience endpoint. Real
    /// callers wire processors as Rust trait objects and leave this unset.
    #[serde(default)]
    pub processor: Option<String>,
}

impl StageConfig {
    /// The first normalized target, or `None` for an (invalid but tolerated) empty stage.
    #[must_use]
    pub fn first_target(&self) -> Option<TargetRef> {
        self.services.first().map(ServiceEntry::normalize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_normalizes_without_meta() {
        let entry: ServiceEntry = serde_json::from_str("\"svc-a\"").unwrap();
        let target = entry.normalize();
        assert_eq!(target.target_id, "svc-a");
        assert!(target.meta.is_none());
    }

    #[test]
    fn detailed_entry_normalizes_with_meta() {
        let entry: ServiceEntry =
            serde_json::from_str(r#"{"targetId":"svc-b","meta":{"region":"eu"}}"#).unwrap();
        let target = entry.normalize();
        assert_eq!(target.target_id, "svc-b");
        assert_eq!(target.meta, Some(serde_json::json!({"region": "eu"})));
    }

    #[test]
    fn empty_stage_has_no_first_target() {
        let stage = StageConfig { services: Vec::new(), location: Location::Local, processor: None };
        assert!(stage.first_target().is_none());
    }
}
