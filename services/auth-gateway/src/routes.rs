//! HTTP routes for credential acquisition and inspection
//!
//! The gateway runs headless: consent is driven over HTTP instead of a local
//! browser. `/auth/url` hands out the consent URL with a CSRF state token,
//! the authorization server redirects to `/auth/callback` with the code, and
//! the rest of the system reads `/auth/token` whenever it needs a valid
//! bearer token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{info, warn};

use drive_auth::CredentialStore;

use crate::metrics;

/// Maximum age of a pending consent state before it expires.
const STATE_EXPIRY_SECS: u64 = 600; // 10 minutes

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    /// CSRF state tokens for in-progress consent flows, created by
    /// /auth/url and consumed by /auth/callback. Expired entries are
    /// removed lazily.
    pub pending_states: Arc<Mutex<HashMap<String, Instant>>>,
    pub started_at: Instant,
    pub prometheus: PrometheusHandle,
}

impl AppState {
    pub fn new(store: Arc<CredentialStore>, prometheus: PrometheusHandle) -> Self {
        Self {
            store,
            pending_states: Arc::new(Mutex::new(HashMap::new())),
            started_at: Instant::now(),
            prometheus,
        }
    }
}

/// Build the axum router with all routes and shared state.
///
/// Applies a concurrency limit layer based on `max_connections`.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/auth/url", get(auth_url))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/token", get(auth_token))
        .route("/auth/refresh", get(auth_refresh))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// GET /auth/url — generate a consent URL with a fresh CSRF state token.
async fn auth_url(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let csrf = drive_auth::generate_state();
    let url = state.store.authorization_url(&csrf);

    let mut pending = state.pending_states.lock().await;
    // Lazy cleanup: drop expired entries while holding the lock
    pending.retain(|_, created| created.elapsed().as_secs() < STATE_EXPIRY_SECS);
    pending.insert(csrf.clone(), Instant::now());

    info!("consent flow initiated");
    (StatusCode::OK, Json(json!({ "auth_url": url, "state": csrf })))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: String,
    state: String,
}

/// GET /auth/callback — verify the CSRF state and exchange the code.
async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Json<Value>) {
    let known = state.pending_states.lock().await.remove(&params.state);
    match known {
        Some(created) if created.elapsed().as_secs() < STATE_EXPIRY_SECS => {}
        _ => {
            warn!("callback with unknown or expired state parameter");
            metrics::record_exchange("error");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "unknown or expired state parameter" })),
            );
        }
    }

    match state.store.exchange_code_for_token(&params.code).await {
        Ok(access_token) => {
            metrics::record_exchange("ok");
            info!("authorization code exchanged, credential record stored");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "authorization complete",
                    "access_token": access_token,
                })),
            )
        }
        Err(e) => {
            warn!(error = %e, "authorization code exchange failed");
            metrics::record_exchange("error");
            error_response(&e)
        }
    }
}

/// GET /auth/token — the read path: stored token while valid, one refresh
/// once expired.
async fn auth_token(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.access_token().await {
        Ok(access_token) => {
            metrics::record_token_request("ok");
            let expiry = state.store.current_record().await.and_then(|r| r.expiry);
            (
                StatusCode::OK,
                Json(json!({ "access_token": access_token, "expiry": expiry })),
            )
        }
        Err(e) => {
            let outcome = if e.requires_consent() { "consent_required" } else { "error" };
            metrics::record_token_request(outcome);
            warn!(error = %e, "access token request failed");
            error_response(&e)
        }
    }
}

/// GET /auth/refresh — force a refresh grant regardless of stored expiry.
async fn auth_refresh(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.refresh().await {
        Ok(record) => {
            metrics::record_refresh("ok");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "token refreshed",
                    "access_token": record.access_token,
                    "expiry": record.expiry,
                })),
            )
        }
        Err(e) => {
            metrics::record_refresh(if e.requires_consent() { "rejected" } else { "error" });
            warn!(error = %e, "forced refresh failed");
            error_response(&e)
        }
    }
}

/// GET /health — liveness plus the credential record's current state.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let credential = match state.store.current_record().await {
        Some(record) if record.is_valid_at(Utc::now().naive_utc()) => "valid",
        Some(_) => "expired",
        None => "absent",
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "credential": credential,
            "uptime_seconds": state.started_at.elapsed().as_secs(),
        })),
    )
}

/// GET /metrics — Prometheus text exposition format.
async fn render_metrics(State(state): State<AppState>) -> ([(axum::http::HeaderName, &'static str); 1], String) {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Map a credential error to an HTTP response. The body always says whether
/// a new consent flow is required so callers can branch without parsing
/// error text.
fn error_response(e: &drive_auth::Error) -> (StatusCode, Json<Value>) {
    let status = match e {
        drive_auth::Error::NoCredential | drive_auth::Error::Refresh(_) => StatusCode::UNAUTHORIZED,
        drive_auth::Error::AuthExchange(_) => StatusCode::BAD_REQUEST,
        drive_auth::Error::Http(_) => StatusCode::BAD_GATEWAY,
        drive_auth::Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "error": e.to_string(),
            "consent_required": e.requires_consent(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeDelta;
    use drive_auth::{CredentialRecord, OAuthConfig};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    /// Minimal fake token endpoint: one canned reply, counts requests.
    struct FakeTokenEndpoint {
        uri: String,
        hits: Arc<AtomicUsize>,
    }

    async fn spawn_token_endpoint(body: Value) -> FakeTokenEndpoint {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/token",
            axum::routing::post(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(body)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let uri = format!("http://{}/token", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        FakeTokenEndpoint { uri, hits }
    }

    fn test_oauth_config(token_uri: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: "cid".into(),
            client_secret: "cs".into(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
            token_uri: token_uri.into(),
            redirect_uri: "http://127.0.0.1:8001/auth/callback".into(),
            scopes: vec!["https://www.googleapis.com/auth/drive".into()],
        }
    }

    async fn test_state(
        token_uri: &str,
        record: Option<CredentialRecord>,
    ) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        if let Some(record) = &record {
            record.save(&path).await.unwrap();
        }
        let store = CredentialStore::open(
            test_oauth_config(token_uri),
            path,
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let prometheus = PrometheusBuilder::new().build_recorder().handle();
        (AppState::new(Arc::new(store), prometheus), dir)
    }

    fn valid_record(token_uri: &str) -> CredentialRecord {
        CredentialRecord {
            access_token: "ya29.stored".into(),
            refresh_token: Some("1//rt".into()),
            token_uri: token_uri.into(),
            client_id: "cid".into(),
            client_secret: "cs".into(),
            scopes: vec!["https://www.googleapis.com/auth/drive".into()],
            universe_domain: "googleapis.com".into(),
            account: String::new(),
            expiry: Some(Utc::now().naive_utc() + TimeDelta::hours(1)),
        }
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_absent_credential() {
        let (state, _dir) = test_state("http://127.0.0.1:9/token", None).await;
        let router = build_router(state, 16);

        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["credential"], "absent");
    }

    #[tokio::test]
    async fn health_reports_valid_credential() {
        let (state, _dir) = test_state(
            "http://127.0.0.1:9/token",
            Some(valid_record("http://127.0.0.1:9/token")),
        )
        .await;
        let router = build_router(state, 16);

        let (_, body) = get_json(router, "/health").await;
        assert_eq!(body["credential"], "valid");
    }

    #[tokio::test]
    async fn auth_url_returns_url_and_registers_state() {
        let (state, _dir) = test_state("http://127.0.0.1:9/token", None).await;
        let pending = state.pending_states.clone();
        let router = build_router(state, 16);

        let (status, body) = get_json(router, "/auth/url").await;
        assert_eq!(status, StatusCode::OK);

        let csrf = body["state"].as_str().unwrap();
        let url = body["auth_url"].as_str().unwrap();
        assert!(url.contains(&format!("state={csrf}")));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(pending.lock().await.contains_key(csrf));
    }

    #[tokio::test]
    async fn callback_rejects_unknown_state() {
        let (state, _dir) = test_state("http://127.0.0.1:9/token", None).await;
        let router = build_router(state, 16);

        let (status, body) = get_json(router, "/auth/callback?code=4%2Fabc&state=bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("state"));
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_persists() {
        let endpoint = spawn_token_endpoint(json!({
            "access_token": "ya29.first",
            "refresh_token": "1//first",
            "expires_in": 3600,
            "token_type": "Bearer",
        }))
        .await;
        let (state, dir) = test_state(&endpoint.uri, None).await;
        let pending = state.pending_states.clone();
        pending
            .lock()
            .await
            .insert("known-state".into(), Instant::now());
        let router = build_router(state, 16);

        let (status, body) =
            get_json(router, "/auth/callback?code=4%2Fcode&state=known-state").await;
        assert_eq!(status, StatusCode::OK, "got body: {body}");
        assert_eq!(body["access_token"], "ya29.first");
        assert_eq!(endpoint.hits.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("token.json").exists());

        // State is consumed: replaying the same callback is rejected
        assert!(!pending.lock().await.contains_key("known-state"));
    }

    #[tokio::test]
    async fn token_route_requires_consent_when_absent() {
        let (state, _dir) = test_state("http://127.0.0.1:9/token", None).await;
        let router = build_router(state, 16);

        let (status, body) = get_json(router, "/auth/token").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["consent_required"], true);
    }

    #[tokio::test]
    async fn token_route_serves_valid_token_without_network() {
        let (state, _dir) = test_state(
            "http://127.0.0.1:9/token",
            Some(valid_record("http://127.0.0.1:9/token")),
        )
        .await;
        let router = build_router(state, 16);

        // token_uri is unroutable: success proves no network call happened
        let (status, body) = get_json(router, "/auth/token").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["access_token"], "ya29.stored");
        assert!(body["expiry"].is_string());
    }

    #[tokio::test]
    async fn refresh_route_returns_renewed_token() {
        let endpoint = spawn_token_endpoint(json!({
            "access_token": "ya29.renewed",
            "expires_in": 3600,
            "token_type": "Bearer",
        }))
        .await;
        let (state, _dir) = test_state(&endpoint.uri, Some(valid_record(&endpoint.uri))).await;
        let router = build_router(state, 16);

        let (status, body) = get_json(router, "/auth/refresh").await;
        assert_eq!(status, StatusCode::OK, "got body: {body}");
        assert_eq!(body["access_token"], "ya29.renewed");
        assert_eq!(endpoint.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_route_rejects_when_no_record() {
        let (state, _dir) = test_state("http://127.0.0.1:9/token", None).await;
        let router = build_router(state, 16);

        let (status, body) = get_json(router, "/auth/refresh").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["consent_required"], true);
    }

    #[tokio::test]
    async fn metrics_route_renders_exposition_format() {
        let (state, _dir) = test_state("http://127.0.0.1:9/token", None).await;
        let router = build_router(state, 16);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }
}
