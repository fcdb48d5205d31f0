// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The connector's HTTP surface: chain bootstrap, the control-signal
//! endpoint, the three inbound peer callbacks, and monitoring readback.

use crate::config::Config;
use crate::demo_processors;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fabricflow_api::{
    BroadcastNotifyRequest, ChainStateResponse, NotifyRequest, RunRequest, SetupRequest,
    SupervisorSignal,
};
use fabricflow_core::{ChainId, FabricError, NodeId, StageConfig};
use fabricflow_engine::{
    CallbackWiring, DefaultWiring, HostResolver, MonitoringAgent, StaticHostResolver,
    StaticMonitoringResolver, Supervisor, WirePaths,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /chains`: allocates a chain, materializes local nodes, wires each
/// one's demo processor, and fires the setup broadcast for remote stages.
async fn create_chain_handler(
    State(state): State<Arc<AppState>>,
    Json(stages): Json<Vec<StageConfig>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let processors: Vec<Option<String>> = stages.iter().map(|s| s.processor.clone()).collect();
    let next_targets: Vec<Option<serde_json::Value>> = (0..stages.len())
        .map(|i| {
            stages.get(i + 1).and_then(StageConfig::first_target).map(|t| {
                serde_json::json!({"targetId": t.target_id, "meta": t.meta})
            })
        })
        .collect();

    let (chain_id, node_ids) = state.supervisor.start_chain(stages).await?;

    for (stage_index, node_id) in node_ids.iter().enumerate() {
        let Some(node_id) = node_id else { continue };
        let processor = demo_processors::by_name(processors[stage_index].as_deref());
        let next_target = next_targets[stage_index].as_ref().and_then(|v| {
            Some(fabricflow_core::TargetRef {
                target_id: v.get("targetId")?.as_str()?.to_string(),
                meta: v.get("meta").cloned().filter(|m| !m.is_null()),
            })
        });
        state.supervisor.append_pipeline(node_id, vec![processor], next_target).await?;
    }

    Ok(Json(serde_json::json!({
        "chainId": chain_id.as_str(),
        "nodes": node_ids.iter().map(|id| id.as_ref().map(NodeId::as_str)).collect::<Vec<_>>(),
    })))
}

/// `POST /signal`: the in-process control surface, reachable over HTTP.
async fn signal_handler(
    State(state): State<Arc<AppState>>,
    Json(signal): Json<SupervisorSignal>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state.supervisor.handle_signal(signal).await?;
    Ok(Json(result))
}

/// Recovers the initiator's uid from a chain id of the form
/// `<initiator-uid>-<unix-ms>-<8-hex>`. Splitting from the right tolerates
/// a uid that itself contains hyphens, since the millisecond and hex
/// segments never do.
fn initiator_uid_from_chain_id(chain_id: &str) -> Option<&str> {
    let mut parts = chain_id.rsplitn(3, '-');
    let _hex = parts.next()?;
    let _millis = parts.next()?;
    let uid = parts.next()?;
    if uid.is_empty() { None } else { Some(uid) }
}

/// `POST <setup-path>`: an inbound setup broadcast from a chain's
/// initiator. Materializes a local node for every named service this
/// connector is configured to host, and registers the initiator as the
/// chain's monitoring host so later reports know where to go.
///
/// Nodes created here are never assigned a demo processor: the wire
/// contract strips `StageConfig::processor` (see
/// [`fabricflow_api::RemoteStageConfig::from_stage`]), so a connector
/// receiving a setup broadcast has no signal of which one to install. A
/// real deployment wires its own `Processor` for each `local_services`
/// entry at startup; this leaves the node pipeline empty until one does.
async fn setup_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetupRequest>,
) -> Result<StatusCode, AppError> {
    let chain_id = ChainId::from_raw(request.chain_id.clone());

    if let Some(uid) = initiator_uid_from_chain_id(&request.chain_id) {
        if let Ok(host) = state.host_resolver.resolve(uid, None) {
            state.monitoring_resolver.register(request.chain_id.clone(), host);
        } else {
            warn!(%uid, chain_id = %request.chain_id, "no peer host for chain initiator, monitoring reports will be dropped");
        }
    } else {
        warn!(chain_id = %request.chain_id, "chain id did not match the expected shape, skipping monitoring registration");
    }

    let hosted: Vec<&String> = request
        .remote_configs
        .services
        .iter()
        .filter(|target_id| state.config.server.local_services.contains(target_id))
        .collect();

    for target_id in hosted {
        let node_id = state.supervisor.create_node_for_chain(&chain_id, Default::default()).await;
        state.supervisor.bind_target(target_id.clone(), node_id).await;
        info!(%target_id, chain_id = %chain_id, "materialized local node for inbound setup");
    }

    Ok(StatusCode::ACCEPTED)
}

/// `POST <run-path>`: a downstream data hand-off from a peer. Routes by
/// `targetId` to whichever local node was bound to it, and runs it.
async fn run_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let node_id = state
        .supervisor
        .route_for_target(&request.target_id)
        .await
        .ok_or_else(|| FabricError::NoNextConnector { target_id: request.target_id.clone() })?;
    let output = state.supervisor.run_node(&node_id, request.data).await?;
    Ok(Json(output))
}

/// `POST <notify-path>`: accepts either a per-node [`NotifyRequest`] or a
/// chain-level [`BroadcastNotifyRequest`], recording whichever shape
/// parses into this connector's monitoring state.
async fn notify_handler(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<StatusCode, AppError> {
    if let Ok(notify) = serde_json::from_slice::<NotifyRequest>(&body) {
        state.monitoring.register_chain(&notify.chain_id);
        state.monitoring.record_status(
            &notify.chain_id,
            &NodeId::from_raw(notify.node_id),
            notify.status,
        );
        return Ok(StatusCode::ACCEPTED);
    }
    if let Ok(broadcast) = serde_json::from_slice::<BroadcastNotifyRequest>(&body) {
        state.monitoring.register_chain(&broadcast.chain_id);
        return Ok(StatusCode::ACCEPTED);
    }
    Err(AppError::Fabric(FabricError::Configuration(
        "notify body matched neither NotifyRequest nor BroadcastNotifyRequest".to_string(),
    )))
}

/// `GET /chains/{id}/state`: the chain's aggregate monitoring snapshot.
async fn chain_state_handler(
    State(state): State<Arc<AppState>>,
    Path(chain_id): Path<String>,
) -> Result<Json<ChainStateResponse>, AppError> {
    let snapshot = state.monitoring.snapshot(&chain_id)?;
    let id = ChainId::from_raw(chain_id);
    Ok(Json(ChainStateResponse::new(&id, &snapshot)))
}

fn build_wiring(
    config: &Config,
    monitoring: &Arc<MonitoringAgent>,
    host_resolver: &Arc<StaticHostResolver>,
    monitoring_resolver: &Arc<StaticMonitoringResolver>,
) -> Arc<dyn CallbackWiring> {
    let poster = Arc::new(fabricflow_engine::ReqwestPoster::new(Duration::from_millis(
        config.server.request_timeout_ms,
    )));
    let paths = WirePaths {
        setup: config.server.setup_path.clone(),
        run: config.server.run_path.clone(),
        notify: config.server.notify_path.clone(),
    };
    Arc::new(DefaultWiring::new(
        Arc::clone(host_resolver) as Arc<dyn fabricflow_engine::HostResolver>,
        Arc::clone(monitoring_resolver) as Arc<dyn fabricflow_engine::MonitoringResolver>,
        poster,
        Arc::clone(monitoring),
        paths,
    ))
}

/// Builds the Axum app and its shared state without binding a listener,
/// so tests can drive it in-process via `into_make_service`.
#[must_use]
pub fn create_app(config: Config) -> (Router, Arc<AppState>) {
    let monitoring = Arc::new(MonitoringAgent::new());
    let mut hosts = std::collections::HashMap::new();
    for (target_id, base_url) in &config.peers.hosts {
        hosts.insert(target_id.clone(), base_url.clone());
    }
    let host_resolver = Arc::new(StaticHostResolver::new(hosts));
    let monitoring_resolver = Arc::new(StaticMonitoringResolver::new());

    let wiring = build_wiring(&config, &monitoring, &host_resolver, &monitoring_resolver);
    let supervisor = Arc::new(Supervisor::new(
        config.server.uid.clone(),
        wiring,
        Arc::clone(&monitoring),
    ));

    let state = Arc::new(AppState {
        config,
        supervisor,
        monitoring,
        host_resolver,
        monitoring_resolver,
    });

    let setup_path = state.config.server.setup_path.clone();
    let run_path = state.config.server.run_path.clone();
    let notify_path = state.config.server.notify_path.clone();

    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/chains", post(create_chain_handler))
        .route("/chains/{id}/state", get(chain_state_handler))
        .route("/signal", post(signal_handler))
        .route(&setup_path, post(setup_handler))
        .route(&run_path, post(run_handler))
        .route(&notify_path, post(notify_handler))
        .with_state(Arc::clone(&state))
        .layer(TraceLayer::new_for_http());

    (router, state)
}

/// Binds and serves the connector, shutting down gracefully on Ctrl+C or
/// `SIGTERM`.
///
/// # Errors
///
/// Returns an error if `server.address` cannot be parsed as a socket
/// address, or if the underlying listener fails to bind.
pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.server.address.parse()?;
    let (app, _state) = create_app(config);

    #[allow(clippy::expect_used)]
    let shutdown_signal = async {
        let ctrl_c = async {
            tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {
                info!("received CTRL-C signal, initiating graceful shutdown");
            },
            () = terminate => {
                info!("received SIGTERM signal, initiating graceful shutdown");
            },
        }
    };

    info!(address = %addr, "starting fabricd connector");

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal.await;
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        }
    });

    axum_server::bind(addr).handle(handle).serve(app.into_make_service()).await.map_err(|e| {
        error!(error = %e, "connector server error");
        e.into()
    })
}

/// Wraps [`FabricError`] for the Axum handler boundary.
#[derive(Debug)]
enum AppError {
    Fabric(FabricError),
}

impl From<FabricError> for AppError {
    fn from(err: FabricError) -> Self {
        Self::Fabric(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let Self::Fabric(err) = self;
        let status = match &err {
            FabricError::InvalidTransition { .. }
            | FabricError::DependenciesNotMet { .. }
            | FabricError::ProcessingFailed { .. }
            | FabricError::NoOutput { .. }
            | FabricError::MissingChainId
            | FabricError::UnknownSignal(_)
            | FabricError::Configuration(_) => StatusCode::BAD_REQUEST,
            FabricError::NoNextConnector { .. } | FabricError::MonitoringNotFound { .. } => {
                StatusCode::NOT_FOUND
            },
            FabricError::BroadcastFailed { .. }
            | FabricError::SetupPostFailed { .. }
            | FabricError::Network(_)
            | FabricError::Io(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.server.uid = "node-a".to_string();
        config
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let (app, _state) = create_app(test_config());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_chain_wires_local_stage_and_returns_id() {
        let (app, _state) = create_app(test_config());
        let body = serde_json::json!([
            {"services": ["svc-a"], "location": "local", "processor": "uppercase"}
        ]);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chains")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_chain_state_returns_not_found() {
        let (app, _state) = create_app(test_config());
        let response = app
            .oneshot(
                Request::builder().uri("/chains/bogus/state").body(Body::empty()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn initiator_uid_survives_hyphenated_uid() {
        let chain_id = ChainId::generate("fabric-local");
        let uid = initiator_uid_from_chain_id(chain_id.as_str()).unwrap();
        assert_eq!(uid, "fabric-local");
    }
}
