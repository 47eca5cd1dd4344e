//! Axum-based Insight Gateway: entry point for Helios. Config-driven via GatewayConfig.

use axum::{
    extract::{Json, State},
    http::{Method, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use helios_core::{GatewayConfig, InsightContext, MemoryCache, ModuleKind, MODULES};
use helios_insight::{reconcile, InsightAdapter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::field::Visit;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Captures the "message" field from a tracing event.
struct MessageCollector<'a>(&'a mut String);

impl Visit for MessageCollector<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            *self.0 = value.to_string();
        }
    }
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            *self.0 = format!("{:?}", value);
        }
    }
}

/// Sends each tracing event as a line to a broadcast channel for SSE log streaming.
#[derive(Clone)]
struct LogBroadcastLayer {
    tx: broadcast::Sender<String>,
}

impl LogBroadcastLayer {
    fn new(tx: broadcast::Sender<String>) -> Self {
        Self { tx }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogBroadcastLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageCollector(&mut message));
        let line = format!(
            "{} [{}] {}",
            event.metadata().level(),
            event.metadata().target(),
            message
        );
        let _ = self.tx.send(line);
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!(
            "[helios-gateway] .env not loaded: {} (using system environment)",
            e
        );
    }

    let (log_tx, _) = broadcast::channel(1000);
    let log_layer = LogBroadcastLayer::new(log_tx.clone());

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(log_layer)
        .init();

    let config = Arc::new(GatewayConfig::load().expect("load GatewayConfig"));
    let cache = Arc::new(MemoryCache::new());
    let adapter = Arc::new(InsightAdapter::new(&config, cache));
    tracing::info!(mode = ?adapter.mode(), model = %config.llm_model, "insight adapter ready");

    let app = build_app(AppState {
        config: Arc::clone(&config),
        adapter,
        log_tx,
    });

    let port = config.port;
    let app_name = config.app_name.clone();
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("{} listening on {}", app_name, addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await.unwrap(), app)
        .await
        .unwrap();
}

fn build_app(state: AppState) -> Router {
    // CORS: allow Backend/API (8001-8099) and Frontend/UI (3001-3099) port ranges.
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            |origin: &axum::http::HeaderValue, _| {
                let s = origin.to_str().unwrap_or("");
                let port = s
                    .split(':')
                    .last()
                    .and_then(|p| p.parse::<u16>().ok())
                    .unwrap_or(0);
                (3001..=3099).contains(&port) || (8001..=8099).contains(&port)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .expose_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/insight", post(insight))
        .route("/api/v1/insight", post(insight))
        .route("/api/v1/health", get(health))
        .route("/api/v1/status", get(status))
        .route("/api/v1/modules", get(modules))
        .route("/api/v1/logs", get(logs_stream))
        .with_state(state)
        .layer(cors)
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) adapter: Arc<InsightAdapter>,
    pub(crate) log_tx: broadcast::Sender<String>,
}

/// GET /api/v1/health – liveness check for UI and scripts.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

/// GET /api/v1/status – app identity and upstream tuning from config.
async fn status(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "app_name": state.config.app_name,
        "port": state.config.port,
        "llm_mode": state.config.llm_mode,
        "llm_model": state.config.llm_model,
        "cache_ttl_secs": state.config.cache_ttl_secs,
        "modules": MODULES.iter().map(|m| m.as_str()).collect::<Vec<_>>(),
    }))
}

/// GET /api/v1/modules – the closed registry of insight modules.
async fn modules() -> axum::Json<serde_json::Value> {
    let listing: Vec<serde_json::Value> = MODULES
        .iter()
        .map(|m| serde_json::json!({ "id": m.as_str(), "label": m.label() }))
        .collect();
    axum::Json(serde_json::json!({ "modules": listing }))
}

/// GET /api/v1/logs – Server-Sent Events stream of gateway logs (tracing output).
async fn logs_stream(
    State(state): State<AppState>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>> + Send + 'static>
{
    use async_stream::stream;
    let mut rx = state.log_tx.subscribe();
    let stream = stream! {
        loop {
            tokio::select! {
                r = rx.recv() => match r {
                    Ok(line) => yield Ok(Event::default().data(line)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        yield Ok(Event::default().data(format!("... {} log lines dropped", n)));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("keepalive"));
                }
            }
        }
    };
    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

#[derive(serde::Deserialize)]
struct InsightRequest {
    /// Raw module value; normalization handles non-string and unknown inputs.
    #[serde(default)]
    module: serde_json::Value,
    #[serde(default)]
    context: Option<InsightContext>,
}

/// POST /api/insight – normalize the module, fetch a completion through the
/// adapter, and reconcile against the module's fallback payload. Always 200
/// with a usable envelope once the module id is valid; 400 otherwise.
async fn insight(State(state): State<AppState>, Json(req): Json<InsightRequest>) -> Response {
    let module = match ModuleKind::normalize(&req.module) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, "rejected insight request");
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(serde_json::json!({
                    "status": "invalid_module",
                    "error": e.to_string(),
                })),
            )
                .into_response();
        }
    };
    let context = req.context.unwrap_or_default();
    let request_id = uuid::Uuid::new_v4();
    tracing::info!(%request_id, module = module.as_str(), "insight request accepted");

    let outcome = state.adapter.fetch(module, &context).await;
    let fallback = module.fallback_payload(&context);
    let envelope = reconcile(module, outcome, fallback);
    tracing::info!(
        %request_id,
        module = module.as_str(),
        source = ?envelope.source,
        cached = envelope.cached,
        "insight request reconciled"
    );
    axum::Json(envelope).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use helios_insight::LlmMode;
    use tower::ServiceExt;

    fn test_log_tx() -> broadcast::Sender<String> {
        let (tx, _) = broadcast::channel(1);
        tx
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            app_name: "Test Insight Gateway".to_string(),
            port: 8010,
            llm_mode: "mock".to_string(),
            llm_model: "meta-llama/llama-3.3-70b-instruct".to_string(),
            llm_api_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            llm_max_tokens: 512,
            llm_temperature: 0.4,
            cache_ttl_secs: 300,
        }
    }

    fn test_app(mode: LlmMode) -> Router {
        let config = test_config();
        let adapter = Arc::new(InsightAdapter::with_mode(
            mode,
            &config,
            Arc::new(MemoryCache::new()),
        ));
        build_app(AppState {
            config: Arc::new(config),
            adapter,
            log_tx: test_log_tx(),
        })
    }

    fn insight_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/insight")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_ok() {
        let app = test_app(LlmMode::Mock);
        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/health")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_status_returns_app_identity() {
        let app = test_app(LlmMode::Mock);
        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/status")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(json["app_name"], "Test Insight Gateway");
        assert_eq!(json["port"], 8010);
        assert_eq!(json["llm_mode"], "mock");
    }

    #[tokio::test]
    async fn test_modules_lists_closed_registry() {
        let app = test_app(LlmMode::Mock);
        let req = Request::builder()
            .method("GET")
            .uri("/api/v1/modules")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        let json = json_body(res).await;
        let listing = json["modules"].as_array().unwrap();
        assert_eq!(listing.len(), 8);
        assert!(listing.iter().any(|m| m["id"] == "ai-dashboard"));
        assert!(listing.iter().any(|m| m["id"] == "expert-connect"));
    }

    #[tokio::test]
    async fn test_unknown_module_is_a_400() {
        let app = test_app(LlmMode::Mock);
        let res = app
            .oneshot(insight_request(serde_json::json!({ "module": "warp-drive" })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = json_body(res).await;
        assert_eq!(json["status"], "invalid_module");
        assert!(json["error"].as_str().unwrap().contains("warp-drive"));
    }

    #[tokio::test]
    async fn test_non_string_module_is_a_400() {
        let app = test_app(LlmMode::Mock);
        let res = app
            .oneshot(insight_request(serde_json::json!({ "module": 42 })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = json_body(res).await;
        assert_eq!(json["status"], "invalid_module");
    }

    #[tokio::test]
    async fn test_missing_module_is_a_400() {
        let app = test_app(LlmMode::Mock);
        let res = app
            .oneshot(insight_request(serde_json::json!({ "context": {} })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_module_id_is_case_insensitive() {
        let app = test_app(LlmMode::Mock);
        let res = app
            .oneshot(insight_request(
                serde_json::json!({ "module": "Market-Intel" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(json["module"], "market-intel");
    }

    #[tokio::test]
    async fn test_no_key_live_mode_serves_exact_fallback() {
        std::env::remove_var("HELIOS_LLM_API_KEY");
        std::env::remove_var("OPENROUTER_API_KEY");
        let app = test_app(LlmMode::Live);
        let res = app
            .oneshot(insight_request(serde_json::json!({
                "module": "AI-Dashboard",
                "context": { "metric": "peak load", "location": "Austin, TX" },
            })))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = json_body(res).await;
        assert_eq!(json["module"], "ai-dashboard");
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["cached"], false);
        assert_eq!(
            json["summary"],
            "Using cached analytics for peak load in Austin, TX."
        );
        assert_eq!(json["highlights"].as_array().unwrap().len(), 2);
        assert_eq!(json["actions"].as_array().unwrap().len(), 3);
        assert!(json["error"].as_str().unwrap().contains("API key"));
        assert!(json.get("parseError").is_none());
    }

    #[tokio::test]
    async fn test_mock_mode_reconciles_live_path_and_caches() {
        let app = test_app(LlmMode::Mock);
        let body = serde_json::json!({
            "module": "energy-forecast",
            "context": { "region": "ERCOT" },
        });

        let first = app.clone().oneshot(insight_request(body.clone())).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first_json = json_body(first).await;
        assert_eq!(first_json["source"], "openrouter");
        assert_eq!(first_json["cached"], false);
        assert!(!first_json["summary"].as_str().unwrap().is_empty());
        assert_eq!(first_json["metadata"]["mode"], "mock");

        let second = app.oneshot(insight_request(body)).await.unwrap();
        let second_json = json_body(second).await;
        assert_eq!(second_json["source"], "openrouter");
        assert_eq!(second_json["cached"], true);
        assert_eq!(second_json["summary"], first_json["summary"]);
    }
}
