// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Outbound HTTP transport to peer connectors.
//!
//! [`HttpPoster`] is a trait so callback wiring and tests can swap in an
//! in-memory double; [`ReqwestPoster`] is the production implementation,
//! sharing a single client the way a long-lived connector should.

use async_trait::async_trait;
use fabricflow_core::FabricError;
use std::sync::OnceLock;
use std::time::Duration;

/// The outcome of a peer POST: callers only ever need the status and body.
#[derive(Debug, Clone)]
pub struct PostResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl PostResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a JSON body to a peer connector and reports back the response.
#[async_trait]
pub trait HttpPoster: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<PostResponse, FabricError>;
}

/// A `reqwest`-backed [`HttpPoster`] sharing one client across calls.
///
/// Redirects are disabled: a peer connector is addressed by exact
/// configured URL, and following a redirect would let a compromised peer
/// silently retarget a setup or run POST.
#[derive(Debug, Default)]
pub struct ReqwestPoster {
    timeout: Duration,
}

impl ReqwestPoster {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn shared_client() -> Result<&'static reqwest::Client, FabricError> {
        static CLIENT: OnceLock<Result<reqwest::Client, reqwest::Error>> = OnceLock::new();
        CLIENT
            .get_or_init(|| {
                reqwest::Client::builder()
                    .redirect(reqwest::redirect::Policy::none())
                    .connect_timeout(Duration::from_secs(5))
                    .build()
            })
            .as_ref()
            .map_err(|e| FabricError::Network(format!("failed to initialize HTTP client: {e}")))
    }
}

#[async_trait]
impl HttpPoster for ReqwestPoster {
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<PostResponse, FabricError> {
        let client = Self::shared_client()?;
        let response = client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| FabricError::Network(format!("POST {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await.unwrap_or(serde_json::Value::Null);
        Ok(PostResponse { status, body })
    }
}
