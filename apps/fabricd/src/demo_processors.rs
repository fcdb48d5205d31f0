// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A small built-in processor set, selectable by name from `POST /chains`.
//!
//! Real callers wire processors as Rust trait objects at compile time;
//! these exist only so the HTTP chain-start surface is exercisable without
//! a custom binary.

use async_trait::async_trait;
use fabricflow_core::{FabricError, Processor};
use std::sync::Arc;

struct Identity;

#[async_trait]
impl Processor for Identity {
    async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
        Ok(payload)
    }
}

struct Uppercase;

#[async_trait]
impl Processor for Uppercase {
    async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
        match payload {
            serde_json::Value::String(s) => Ok(serde_json::Value::String(s.to_uppercase())),
            other => Ok(other),
        }
    }
}

struct JsonMerge;

#[async_trait]
impl Processor for JsonMerge {
    async fn run(&self, payload: serde_json::Value) -> Result<serde_json::Value, FabricError> {
        let serde_json::Value::Object(mut merged) = payload else {
            return Ok(payload);
        };
        merged.insert("merged".to_string(), serde_json::Value::Bool(true));
        Ok(serde_json::Value::Object(merged))
    }
}

/// Resolves a demo processor by name. An unrecognized name falls back to
/// `identity` rather than failing chain start over a cosmetic typo.
#[must_use]
pub fn by_name(name: Option<&str>) -> Arc<dyn Processor> {
    match name {
        Some("uppercase") => Arc::new(Uppercase),
        Some("json-merge") => Arc::new(JsonMerge),
        _ => Arc::new(Identity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uppercase_transforms_strings() {
        let out = by_name(Some("uppercase")).run(serde_json::json!("hi")).await.unwrap();
        assert_eq!(out, serde_json::json!("HI"));
    }

    #[tokio::test]
    async fn json_merge_tags_objects() {
        let out = by_name(Some("json-merge")).run(serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(out, serde_json::json!({"a": 1, "merged": true}));
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_identity() {
        let out = by_name(Some("bogus")).run(serde_json::json!(7)).await.unwrap();
        assert_eq!(out, serde_json::json!(7));
    }
}
