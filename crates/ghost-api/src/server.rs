//! HTTP server implementation using axum.

use std::future::Future;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use ghost_core::{CommitmentHash, Pubkey};
use ghost_envelope::EncryptedEnvelope;
use ghost_monitor::{MonitorEvent, MonitorStatus, OrderRef};
use ghost_telemetry::Metrics;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::broadcast::run_heartbeat;
use crate::error::{ApiError, ApiResult};
use crate::state::{ApiState, ConnectionGuard};
use crate::types::{
    OwnerQuery, RunningResponse, SubmitOrderRequest, SubmitOrderResponse, TrackOrderRequest,
    TrackOrderResponse,
};

/// Create the axum router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/orders", post(submit_order))
        .route(
            "/api/envelopes/{hash}",
            get(get_envelope).delete(delete_envelope),
        )
        .route("/api/monitor/status", get(monitor_status))
        .route("/api/monitor/start", post(start_monitor))
        .route("/api/monitor/stop", post(stop_monitor))
        .route("/api/monitor/orders", post(track_order))
        .route("/api/monitor/orders/{owner}/{hash}", delete(untrack_order))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics() -> ApiResult<Response> {
    let body = Metrics::render().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Seal, store and register an order, then optionally start tracking it.
async fn submit_order(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<SubmitOrderRequest>,
) -> ApiResult<(StatusCode, Json<SubmitOrderResponse>)> {
    state.authorize(&headers)?;

    let owner = req.order.owner;
    let receipt = state.intake.submit(req.order, req.delegate).await?;
    let order_ref = OrderRef::new(owner, receipt.commitment);
    let tracked = req.track && state.monitor.add_order(order_ref).await;

    info!(
        owner = %owner.short(),
        commitment = %receipt.commitment.short(),
        tracked,
        "Order accepted"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitOrderResponse::new(receipt, order_ref.to_string(), tracked)),
    ))
}

async fn get_envelope(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> ApiResult<Json<EncryptedEnvelope>> {
    let commitment = CommitmentHash::from_hex(&hash)?;
    state
        .intake
        .store()
        .get(&commitment)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No envelope for {commitment}")))
}

/// Owner-scoped delete.
async fn delete_envelope(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(hash): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<StatusCode> {
    state.authorize(&headers)?;
    let commitment = CommitmentHash::from_hex(&hash)?;
    let owner = Pubkey::from_hex(&query.owner)?;

    state.intake.store().delete(&commitment, &owner)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn monitor_status(State(state): State<ApiState>) -> Json<MonitorStatus> {
    Json(state.monitor.status())
}

async fn start_monitor(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<RunningResponse>> {
    state.authorize(&headers)?;
    state.monitor.start()?;
    Ok(Json(RunningResponse {
        running: true,
        changed: true,
    }))
}

async fn stop_monitor(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<Json<RunningResponse>> {
    state.authorize(&headers)?;
    let changed = state.monitor.stop();
    Ok(Json(RunningResponse {
        running: false,
        changed,
    }))
}

async fn track_order(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(req): Json<TrackOrderRequest>,
) -> ApiResult<Json<TrackOrderResponse>> {
    state.authorize(&headers)?;
    let order_ref: OrderRef = req.order_ref.parse()?;

    if !state.monitor.add_order(order_ref).await {
        return Err(ApiError::NotFound(format!(
            "Order reference {order_ref} could not be resolved"
        )));
    }
    Ok(Json(TrackOrderResponse {
        order_ref: order_ref.to_string(),
        tracked: true,
    }))
}

async fn untrack_order(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((owner, hash)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.authorize(&headers)?;
    let order_ref = OrderRef::new(Pubkey::from_hex(&owner)?, CommitmentHash::from_hex(&hash)?);

    if state.monitor.remove_order(&order_ref) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Order {order_ref} is not tracked")))
    }
}

/// WebSocket upgrade handler for the event stream.
async fn ws_handler(State(state): State<ApiState>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = state.limiter.try_acquire() else {
        warn!(
            current = state.limiter.current_count(),
            max = state.limiter.max(),
            "Stream connection limit reached"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, guard))
}

async fn handle_ws_connection(socket: WebSocket, state: ApiState, _guard: ConnectionGuard) {
    Metrics::stream_client_connected();
    info!(
        connections = state.limiter.current_count(),
        "Stream client connected"
    );

    forward_events(socket, &state).await;

    Metrics::stream_client_disconnected();
    info!(
        connections = state.limiter.current_count().saturating_sub(1),
        "Stream client disconnected"
    );
}

/// Pump bus events to one client until either side goes away.
async fn forward_events(socket: WebSocket, state: &ApiState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.monitor.subscribe();

    if !send_event(&mut sender, &MonitorEvent::ping()).await {
        debug!("Failed to send initial ping, client disconnected");
        return;
    }

    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => {
                    debug!("Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Stream receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            result = events.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut sender, &event).await {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Stream client lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed");
                        break;
                    }
                }
            }
            _ = &mut incoming_task => {
                break;
            }
        }
    }

    incoming_task.abort();
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &MonitorEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            debug!(error = %e, kind = event.kind(), "Failed to serialize event");
            true
        }
    }
}

/// Run the API server until `shutdown` resolves.
pub async fn run_server(
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> ApiResult<()> {
    let config = state.config.clone();
    let heartbeat = tokio::spawn(run_heartbeat(
        state.monitor.events().clone(),
        config.heartbeat_interval_ms,
    ));

    let app = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Starting API server");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    heartbeat.abort();
    result?;

    info!("API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use axum::body::Body;
    use axum::http::Request;
    use ghost_core::{FeedId, Order, OrderSide, TriggerCondition};
    use ghost_envelope::{EnvelopeStore, ExecutorKeypair};
    use ghost_ledger::MemoryLedger;
    use ghost_monitor::{Monitor, MonitorConfig, OrderIntake, StaticPriceSource};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    const PROGRAM: Pubkey = Pubkey::new([0x42; 32]);
    const OWNER: Pubkey = Pubkey::new([1; 32]);

    fn test_state(token: Option<&str>, with_key: bool) -> ApiState {
        let ledger = Arc::new(MemoryLedger::new(PROGRAM));
        let prices = Arc::new(StaticPriceSource::new());
        let store = Arc::new(EnvelopeStore::new());
        let keypair = ExecutorKeypair::generate();
        let intake = Arc::new(OrderIntake::new(
            keypair.public_key(),
            store.clone(),
            ledger.clone(),
            Duration::from_secs(1),
        ));
        let monitor = Monitor::new(
            MonitorConfig::default(),
            ledger,
            prices,
            store,
            with_key.then(|| Arc::new(keypair)),
        );
        let config = ApiConfig {
            token: token.map(str::to_string),
            ..ApiConfig::default()
        };
        ApiState::new(monitor, intake, config)
    }

    fn order(order_id: u64) -> Order {
        Order {
            owner: OWNER,
            order_id,
            market_index: 0,
            trigger_price: 180_000_000,
            trigger_condition: TriggerCondition::Below,
            side: OrderSide::Long,
            base_asset_amount: 1_000_000,
            reduce_only: false,
            expiry: 0,
            feed_id: FeedId::new([0xef; 32]),
            salt: None,
        }
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_order_and_duplicate() {
        let app = create_router(test_state(None, true));

        let resp = app
            .clone()
            .oneshot(post_json("/api/orders", json!({ "order": order(1) })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        assert_eq!(body["commitment"].as_str().unwrap().len(), 64);
        assert_eq!(body["tracked"], true);
        assert_eq!(body["delegated"], true);
        assert!(body["authorizeSignature"].is_string());
        assert_eq!(body["envelope"]["version"], 1);

        let resp = app
            .oneshot(post_json("/api/orders", json!({ "order": order(1) })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_submit_invalid_order() {
        let app = create_router(test_state(None, true));
        let bad = Order {
            market_index: 1000,
            ..order(1)
        };
        let resp = app
            .oneshot(post_json("/api/orders", json!({ "order": bad })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_envelope_lookup() {
        let app = create_router(test_state(None, true));

        let resp = app
            .clone()
            .oneshot(empty("GET", "/api/envelopes/abcd"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let unknown = format!("/api/envelopes/{}", "00".repeat(32));
        let resp = app.clone().oneshot(empty("GET", &unknown)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .clone()
            .oneshot(post_json("/api/orders", json!({ "order": order(1) })))
            .await
            .unwrap();
        let hash = body_json(resp).await["commitment"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = app
            .oneshot(empty("GET", &format!("/api/envelopes/{hash}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["commitment"], hash);
        assert!(body.get("trigger_price").is_none());
    }

    #[tokio::test]
    async fn test_envelope_delete_is_owner_scoped() {
        let app = create_router(test_state(None, true));
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/orders",
                json!({ "order": order(1), "track": false }),
            ))
            .await
            .unwrap();
        let hash = body_json(resp).await["commitment"]
            .as_str()
            .unwrap()
            .to_string();

        let stranger = format!("/api/envelopes/{hash}?owner={}", "02".repeat(32));
        let resp = app.clone().oneshot(empty("DELETE", &stranger)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let owner = format!("/api/envelopes/{hash}?owner={}", OWNER.to_hex());
        let resp = app.clone().oneshot(empty("DELETE", &owner)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.oneshot(empty("DELETE", &owner)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let state = test_state(None, true);
        let app = create_router(state.clone());

        let resp = app
            .clone()
            .oneshot(empty("POST", "/api/monitor/start"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(state.monitor().is_running());

        let resp = app
            .clone()
            .oneshot(empty("POST", "/api/monitor/start"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .clone()
            .oneshot(empty("POST", "/api/monitor/stop"))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["changed"], true);

        let resp = app
            .oneshot(empty("POST", "/api/monitor/stop"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["changed"], false);
    }

    #[tokio::test]
    async fn test_start_without_key() {
        let app = create_router(test_state(None, false));
        let resp = app
            .oneshot(empty("POST", "/api/monitor/start"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_status_lists_tracked_orders() {
        let app = create_router(test_state(None, true));
        app.clone()
            .oneshot(post_json("/api/orders", json!({ "order": order(1) })))
            .await
            .unwrap();

        let resp = app
            .oneshot(empty("GET", "/api/monitor/status"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["running"], false);
        let orders = body["orders"].as_array().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["owner"], OWNER.to_hex());
        assert_eq!(orders[0]["status"], "pending");
        assert_eq!(orders[0]["hasDecryptedData"], false);
    }

    #[tokio::test]
    async fn test_track_and_untrack() {
        let app = create_router(test_state(None, true));

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/monitor/orders",
                json!({ "orderRef": "not-a-ref" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let unknown = format!("{}:{}", OWNER.to_hex(), "00".repeat(32));
        let resp = app
            .clone()
            .oneshot(post_json("/api/monitor/orders", json!({ "orderRef": unknown })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/orders",
                json!({ "order": order(1), "track": false }),
            ))
            .await
            .unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["tracked"], false);
        let order_ref = body["orderRef"].as_str().unwrap().to_string();
        let hash = body["commitment"].as_str().unwrap().to_string();

        let resp = app
            .clone()
            .oneshot(post_json("/api/monitor/orders", json!({ "orderRef": order_ref })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let path = format!("/api/monitor/orders/{}/{hash}", OWNER.to_hex());
        let resp = app.clone().oneshot(empty("DELETE", &path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = app.oneshot(empty("DELETE", &path)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_token_guards_mutations_only() {
        let app = create_router(test_state(Some("s3cret"), true));

        let resp = app
            .clone()
            .oneshot(empty("POST", "/api/monitor/start"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .clone()
            .oneshot(empty("GET", "/api/monitor/status"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let authed = Request::builder()
            .method("POST")
            .uri("/api/monitor/stop")
            .header(header::AUTHORIZATION, "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(authed).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        Metrics::tracked_orders(0);
        let app = create_router(test_state(None, true));
        let resp = app.oneshot(empty("GET", "/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("ghost_tracked_orders"));
    }
}
