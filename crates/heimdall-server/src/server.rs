//! `HeimdallServer`: Axum router, shared state and serve loop.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use heimdall_bifrost::{Bifrost, BifrostConfig, SUBSCRIBE_TOKEN_PURPOSE, SubscribeTokenService};
use heimdall_core::Sealer;
use heimdall_core::constants::{ACTIONS_PATH, BIFROST_STREAM_PATH, BIFROST_TOKEN_PATH, CSRF_PATH};
use heimdall_core::seal::{KEY_LEN, SealError, generate_key, load_or_create_key};
use heimdall_settings::{HeimdallSettings, SecuritySettings};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::actions::{ActionDispatcher, ActionRegistry, DispatchOptions, ServiceMap};
use crate::errors::ServerError;
use crate::health::{self, HealthCounters, HealthResponse};
use crate::security::Antiforgery;
use crate::shutdown::ShutdownCoordinator;
use crate::{actions, metrics, security, stream};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Resolves and invokes actions.
    pub dispatcher: Arc<ActionDispatcher>,
    /// Registered actions.
    pub registry: Arc<ActionRegistry>,
    /// Topic broker.
    pub bifrost: Bifrost,
    /// Subscribe token issuer/validator.
    pub tokens: Arc<SubscribeTokenService>,
    /// Anti-forgery issuer/validator.
    pub antiforgery: Arc<Antiforgery>,
    /// Shutdown coordinator; per-request tokens are children of its token.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Effective settings.
    pub settings: Arc<HeimdallSettings>,
    /// When the server was built.
    pub start_time: Instant,
    /// Prometheus handle, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

/// Configures a [`HeimdallServer`].
pub struct HeimdallServerBuilder {
    settings: HeimdallSettings,
    registry: ActionRegistry,
    services: ServiceMap,
    bifrost: Option<Bifrost>,
    key: Option<[u8; KEY_LEN]>,
    metrics: Option<PrometheusHandle>,
    extra: Router,
}

impl HeimdallServerBuilder {
    /// Actions to serve.
    #[must_use]
    pub fn actions(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Make `service` injectable into actions as `Service<T>`.
    #[must_use]
    pub fn service<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        let _ = self.services.insert(service);
        self
    }

    /// Like [`service`](Self::service) for an already shared value.
    #[must_use]
    pub fn service_arc<T: Send + Sync + 'static>(mut self, service: Arc<T>) -> Self {
        let _ = self.services.insert_arc(service);
        self
    }

    /// Use an existing broker instead of creating one from settings.
    #[must_use]
    pub fn bifrost(mut self, bifrost: Bifrost) -> Self {
        self.bifrost = Some(bifrost);
        self
    }

    /// Sealing key for subscribe and anti-forgery tokens.
    #[must_use]
    pub fn key(mut self, key: [u8; KEY_LEN]) -> Self {
        self.key = Some(key);
        self
    }

    /// Serve `/metrics` from this recorder handle.
    #[must_use]
    pub fn metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Host routes (pages, assets) served next to the Heimdall endpoints.
    #[must_use]
    pub fn routes(mut self, routes: Router) -> Self {
        self.extra = self.extra.merge(routes);
        self
    }

    /// Validate settings and service requirements, then assemble the server.
    pub fn build(self) -> Result<HeimdallServer, ServerError> {
        let Self {
            settings,
            registry,
            mut services,
            bifrost,
            key,
            metrics,
            extra,
        } = self;

        settings.validate()?;
        let key = resolve_key(key, &settings.security)?;

        let bifrost = bifrost.unwrap_or_else(|| Bifrost::new(BifrostConfig::from(&settings.bifrost)));
        let _ = services.insert(bifrost.clone());
        registry.validate_services(&services)?;

        let antiforgery = Arc::new(Antiforgery::new(&key, &settings.security));
        let tokens = Arc::new(SubscribeTokenService::new(
            &Sealer::new(&key, SUBSCRIBE_TOKEN_PURPOSE),
            Duration::from_secs(settings.bifrost.token_ttl_secs),
        ));
        let registry = Arc::new(registry);
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&registry),
            Arc::new(services),
            Arc::clone(&antiforgery),
            DispatchOptions::from(&settings.actions),
        ));
        let metrics = if settings.server.metrics_enabled {
            metrics
        } else {
            None
        };

        Ok(HeimdallServer {
            state: AppState {
                dispatcher,
                registry,
                bifrost,
                tokens,
                antiforgery,
                shutdown: Arc::new(ShutdownCoordinator::new()),
                settings: Arc::new(settings),
                start_time: Instant::now(),
                metrics,
            },
            extra,
        })
    }
}

fn resolve_key(
    explicit: Option<[u8; KEY_LEN]>,
    security: &SecuritySettings,
) -> Result<[u8; KEY_LEN], SealError> {
    if let Some(key) = explicit {
        return Ok(key);
    }
    match security.key_path.as_deref() {
        Some(path) => {
            let key = load_or_create_key(Path::new(path))?;
            info!(path, "sealing key loaded");
            Ok(key)
        }
        None => {
            warn!("no keyPath configured; tokens are sealed with an ephemeral key");
            Ok(generate_key())
        }
    }
}

/// The Heimdall HTTP server.
pub struct HeimdallServer {
    state: AppState,
    extra: Router,
}

impl std::fmt::Debug for HeimdallServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeimdallServer").finish_non_exhaustive()
    }
}

impl HeimdallServer {
    /// Start configuring a server.
    pub fn builder(settings: HeimdallSettings) -> HeimdallServerBuilder {
        HeimdallServerBuilder {
            settings,
            registry: ActionRegistry::new(),
            services: ServiceMap::new(),
            bifrost: None,
            key: None,
            metrics: None,
            extra: Router::new(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route(ACTIONS_PATH, post(actions::endpoints::invoke))
            .route(CSRF_PATH, get(security::endpoints::csrf))
            .route(BIFROST_TOKEN_PATH, get(stream::endpoints::token))
            .route(BIFROST_STREAM_PATH, get(stream::endpoints::stream));

        let base = self.state.settings.server.base_path.as_str();
        let router = if base.is_empty() {
            api
        } else {
            Router::new().nest(base, api)
        };

        router
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
            .merge(self.extra.clone())
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Bind the configured `host:port`.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let server = &self.state.settings.server;
        let listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
        Ok(listener)
    }

    /// Serve until shutdown is signalled, then close every stream and wait
    /// for tracked background tasks.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        info!(
            %addr,
            base_path = %self.state.settings.server.base_path,
            actions = self.state.registry.len(),
            "heimdall listening"
        );

        let token = self.state.shutdown.token();
        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

        self.state.bifrost.close_all();
        let timeout = Duration::from_millis(self.state.settings.server.shutdown_timeout_ms);
        self.state.shutdown.graceful_shutdown(Some(timeout)).await;
        info!("heimdall stopped");
        Ok(())
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Topic broker.
    pub fn bifrost(&self) -> &Bifrost {
        &self.state.bifrost
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Effective settings.
    pub fn settings(&self) -> &HeimdallSettings {
        &self.state.settings
    }

    /// Registered actions.
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.state.registry
    }

    /// Subscribe token service, for issuing tokens server-side.
    pub fn tokens(&self) -> &Arc<SubscribeTokenService> {
        &self.state.tokens
    }

    /// Anti-forgery service.
    pub fn antiforgery(&self) -> &Arc<Antiforgery> {
        &self.state.antiforgery
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        HealthCounters {
            topics: state.bifrost.topic_count(),
            subscribers: state.bifrost.total_subscribers(),
            actions: state.registry.len(),
            shutting_down: state.shutdown.is_shutting_down(),
        },
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            metrics::render(handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::body::Body;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{HeaderMap, Request};
    use heimdall_core::Html;
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use super::*;
    use crate::actions::{Payload, RegistrationError, Service};

    struct Greeter {
        greeting: &'static str,
    }

    #[derive(serde::Deserialize)]
    struct Name {
        name: String,
    }

    fn registry() -> ActionRegistry {
        let mut reg = ActionRegistry::new();
        let _ = reg
            .register("Home.Title", || async { Html::raw("<h1>Home</h1>") })
            .unwrap()
            .register_sync(
                "Home.Greet",
                |Service(g): Service<Greeter>, Payload(n): Payload<Name>| {
                    Html::text(&format!("{}, {}", g.greeting, n.name))
                },
            )
            .unwrap()
            .register_sync("Home.Noop", || ())
            .unwrap();
        reg
    }

    fn server_with(settings: HeimdallSettings) -> HeimdallServer {
        HeimdallServer::builder(settings)
            .actions(registry())
            .service(Greeter { greeting: "Hello" })
            .key(generate_key())
            .build()
            .unwrap()
    }

    fn server() -> HeimdallServer {
        server_with(HeimdallSettings::default())
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// Fetch a request token and return headers that pass anti-forgery.
    async fn csrf_headers(app: &Router) -> HeaderMap {
        let resp = app.clone().oneshot(get("/__heimdall/v1/csrf")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers()[SET_COOKIE].to_str().unwrap().to_string();
        let pair = cookie.split(';').next().unwrap().to_string();
        let token = body_json(resp).await["requestToken"]
            .as_str()
            .unwrap()
            .to_string();

        let mut headers = HeaderMap::new();
        let _ = headers.insert(COOKIE, HeaderValue::from_str(&pair).unwrap());
        let _ = headers.insert("requestverificationtoken", HeaderValue::from_str(&token).unwrap());
        headers
    }

    fn post_action(action: &str, body: &str, headers: &HeaderMap) -> Request<Body> {
        let mut req = Request::builder()
            .method("POST")
            .uri("/__heimdall/v1/content/actions")
            .header("x-heimdall-content-action", action)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        for (name, value) in headers {
            let _ = req.headers_mut().insert(name.clone(), value.clone());
        }
        req
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let server = server();
        let _sub = server.bifrost().subscribe("orders").unwrap();
        let resp = server.router().oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["topics"], 1);
        assert_eq!(json["subscribers"], 1);
        assert_eq!(json["actions"], 3);
    }

    #[tokio::test]
    async fn csrf_sets_cookie_and_no_cache() {
        let resp = server()
            .router()
            .oneshot(get("/__heimdall/v1/csrf"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[SET_COOKIE].to_str().unwrap().starts_with("heimdall.af="));
        assert!(resp.headers()["cache-control"].to_str().unwrap().contains("no-store"));
        assert!(body_json(resp).await["requestToken"].is_string());
    }

    #[tokio::test]
    async fn action_roundtrip() {
        let app = server().router();
        let headers = csrf_headers(&app).await;

        let resp = app
            .clone()
            .oneshot(post_action("Home.Title", "", &headers))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()[CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
        assert_eq!(body_text(resp).await, "<h1>Home</h1>");

        let resp = app
            .clone()
            .oneshot(post_action("Home.Greet", r#"{"name":"<Ana>"}"#, &headers))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "Hello, &lt;Ana&gt;");

        let resp = app
            .oneshot(post_action("Home.Noop", "", &headers))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn action_id_from_query() {
        let app = server().router();
        let headers = csrf_headers(&app).await;
        let mut req = Request::builder()
            .method("POST")
            .uri("/__heimdall/v1/content/actions?action=Home.Title")
            .body(Body::empty())
            .unwrap();
        req.headers_mut().extend(headers);
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn action_errors_map_to_status() {
        let app = server().router();
        let headers = csrf_headers(&app).await;

        let resp = app
            .clone()
            .oneshot(post_action("Home.Title", "", &HeaderMap::new()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers()[CONTENT_TYPE].to_str().unwrap(),
            "application/problem+json"
        );

        let resp = app
            .clone()
            .oneshot(post_action("Home.Missing", "", &headers))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app
            .clone()
            .oneshot(post_action("Home.Greet", "{not json", &headers))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["status"], 400);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut settings = HeimdallSettings::default();
        settings.server.max_body_bytes = 16;
        let app = server_with(settings).router();
        let headers = csrf_headers(&app).await;
        let body = format!(r#"{{"name":"{}"}}"#, "x".repeat(64));
        let resp = app
            .oneshot(post_action("Home.Greet", &body, &headers))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn antiforgery_is_checked_before_the_body_is_read() {
        let mut settings = HeimdallSettings::default();
        settings.server.max_body_bytes = 16;
        let app = server_with(settings).router();
        let body = format!(r#"{{"name":"{}"}}"#, "x".repeat(64));
        let resp = app
            .oneshot(post_action("Home.Greet", &body, &HeaderMap::new()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["status"], 401);
    }

    #[tokio::test]
    async fn token_endpoint_requires_antiforgery_and_topic() {
        let app = server().router();
        let resp = app
            .clone()
            .oneshot(get("/__heimdall/v1/bifrost/token?topic=orders"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let headers = csrf_headers(&app).await;
        let mut req = get("/__heimdall/v1/bifrost/token?topic=%20");
        req.headers_mut().extend(headers.clone());
        assert_eq!(app.clone().oneshot(req).await.unwrap().status(), StatusCode::BAD_REQUEST);

        let mut req = get("/__heimdall/v1/bifrost/token?topic=orders");
        req.headers_mut().extend(headers);
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["token"].as_str().is_some_and(|t| !t.is_empty()));
        assert_eq!(json["expiresInSeconds"], 120);
    }

    #[tokio::test]
    async fn stream_rejects_missing_topic_and_bad_token() {
        let server = server();
        let app = server.router();
        let resp = app.clone().oneshot(get("/__heimdall/v1/bifrost")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = app
            .clone()
            .oneshot(get("/__heimdall/v1/bifrost?topic=orders&st=garbage"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let other = server.tokens().create("invoices", None).unwrap();
        let uri = format!("/__heimdall/v1/bifrost?topic=orders&st={}", other.token);
        assert_eq!(app.oneshot(get(&uri)).await.unwrap().status(), StatusCode::UNAUTHORIZED);
        assert!(!server.bifrost().has_topic("orders"));
    }

    #[tokio::test]
    async fn stream_sends_connected_then_messages() {
        let server = server();
        let issued = server.tokens().create("Orders", None).unwrap();
        let uri = format!("/__heimdall/v1/bifrost?topic=orders&st={}", issued.token);
        let resp = server.router().oneshot(get(&uri)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/event-stream");
        assert_eq!(resp.headers()["cache-control"], "no-cache");
        assert_eq!(resp.headers()["x-accel-buffering"], "no");

        let mut body = resp.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.contains("event: heimdall:connected"), "{first}");
        assert!(first.contains("data: topic:orders"), "{first}");
        assert_eq!(server.bifrost().subscriber_count("orders"), 1);

        let cancel = tokio_util::sync::CancellationToken::new();
        let report = server
            .bifrost()
            .publish("orders", "<li>a\nb</li>", Duration::ZERO, &cancel)
            .unwrap();
        assert_eq!(report.delivered, 1);

        let frame = body.frame().await.unwrap().unwrap().into_data().unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();
        assert!(frame.contains("event: heimdall\n"), "{frame}");
        assert!(frame.contains("data: <li>a\ndata: b</li>\n"), "{frame}");
        assert!(frame.contains("id: "), "{frame}");

        drop(body);
        for _ in 0..100 {
            if !server.bifrost().has_topic("orders") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!server.bifrost().has_topic("orders"));
    }

    #[tokio::test]
    async fn shutdown_ends_open_streams() {
        let server = server();
        let issued = server.tokens().create("t", None).unwrap();
        let uri = format!("/__heimdall/v1/bifrost?topic=t&st={}", issued.token);
        let resp = server.router().oneshot(get(&uri)).await.unwrap();
        let mut body = resp.into_body();
        let _connected = body.frame().await.unwrap().unwrap();

        server.shutdown().shutdown();
        let end = tokio::time::timeout(Duration::from_secs(1), body.frame())
            .await
            .unwrap();
        assert!(end.is_none());
        assert!(!server.bifrost().has_topic("t"));
    }

    #[tokio::test]
    async fn host_routes_are_merged() {
        let server = HeimdallServer::builder(HeimdallSettings::default())
            .key(generate_key())
            .routes(Router::new().route("/", axum::routing::get(|| async { "index" })))
            .build()
            .unwrap();
        let resp = server.router().oneshot(get("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "index");
    }

    #[tokio::test]
    async fn empty_base_path_mounts_at_root() {
        let mut settings = HeimdallSettings::default();
        settings.server.base_path = String::new();
        let app = server_with(settings).router();
        let resp = app.oneshot(get("/v1/csrf")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_endpoint_depends_on_handle() {
        let resp = server().router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let handle = PrometheusBuilder::new().build_recorder().handle();
        let server = HeimdallServer::builder(HeimdallSettings::default())
            .key(generate_key())
            .metrics(handle)
            .build()
            .unwrap();
        let resp = server.router().oneshot(get("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[test]
    fn build_fails_on_missing_service() {
        let result = HeimdallServer::builder(HeimdallSettings::default())
            .actions(registry())
            .key(generate_key())
            .build();
        assert_matches!(
            result,
            Err(ServerError::Registration(RegistrationError::MissingService { .. }))
        );
    }

    #[test]
    fn bifrost_is_injectable_without_registration() {
        let mut reg = ActionRegistry::new();
        let _ = reg
            .register_sync("Notes.Count", |Service(b): Service<Bifrost>| {
                Html::raw(b.topic_count().to_string())
            })
            .unwrap();
        let server = HeimdallServer::builder(HeimdallSettings::default())
            .actions(reg)
            .key(generate_key())
            .build();
        assert!(server.is_ok());
    }

    #[test]
    fn build_rejects_invalid_settings() {
        let mut settings = HeimdallSettings::default();
        settings.server.base_path = "no-slash".into();
        let result = HeimdallServer::builder(settings).key(generate_key()).build();
        assert_matches!(result, Err(ServerError::Settings(_)));
    }

    #[test]
    fn key_file_is_created_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heimdall.key");
        let security = SecuritySettings {
            key_path: Some(path.to_string_lossy().into_owned()),
            ..SecuritySettings::default()
        };
        let first = resolve_key(None, &security).unwrap();
        let second = resolve_key(None, &security).unwrap();
        assert_eq!(first, second);
        assert!(path.exists());
    }
}
