//! Test fixtures: an in-process fake authorization server
//!
//! Binds an axum router to an ephemeral localhost port and serves canned
//! token endpoint replies, counting every request so tests can assert on
//! exactly how many grant requests reached the wire.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Form, Json, Router};
use tokio::sync::Mutex;

use crate::config::OAuthConfig;

struct Inner {
    hits: AtomicUsize,
    /// Served front to back; the final entry repeats forever.
    replies: Mutex<Vec<(u16, serde_json::Value)>>,
    last_form: Mutex<Option<HashMap<String, String>>>,
}

pub(crate) struct FakeAuthServer {
    addr: SocketAddr,
    inner: Arc<Inner>,
}

impl FakeAuthServer {
    pub(crate) async fn start(replies: Vec<(u16, serde_json::Value)>) -> Self {
        let inner = Arc::new(Inner {
            hits: AtomicUsize::new(0),
            replies: Mutex::new(replies),
            last_form: Mutex::new(None),
        });
        let app = Router::new()
            .route("/token", post(token_handler))
            .with_state(inner.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, inner }
    }

    pub(crate) fn token_uri(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    /// Number of token endpoint requests received so far.
    pub(crate) fn hits(&self) -> usize {
        self.inner.hits.load(Ordering::SeqCst)
    }

    /// Form parameters of the most recent request.
    pub(crate) async fn last_form(&self) -> Option<HashMap<String, String>> {
        self.inner.last_form.lock().await.clone()
    }
}

async fn token_handler(
    State(inner): State<Arc<Inner>>,
    Form(params): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    inner.hits.fetch_add(1, Ordering::SeqCst);
    *inner.last_form.lock().await = Some(params);

    let mut replies = inner.replies.lock().await;
    let (status, body) = if replies.len() > 1 {
        replies.remove(0)
    } else {
        replies
            .first()
            .cloned()
            .unwrap_or((500, serde_json::json!({"error": "no reply configured"})))
    };
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(body),
    )
}

/// A token endpoint JSON body in Google's response shape.
pub(crate) fn token_json(
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: u64,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access_token,
        "expires_in": expires_in,
        "token_type": "Bearer",
        "scope": "https://www.googleapis.com/auth/drive",
    });
    if let Some(rt) = refresh_token {
        body["refresh_token"] = serde_json::Value::String(rt.into());
    }
    body
}

/// Client configuration pointing at a test token endpoint.
pub(crate) fn test_config(token_uri: &str) -> OAuthConfig {
    OAuthConfig {
        client_id: "client-123.apps.googleusercontent.com".into(),
        client_secret: "GOCSPX-test-secret".into(),
        auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
        token_uri: token_uri.into(),
        redirect_uri: "http://127.0.0.1:8001/auth/callback".into(),
        scopes: vec![
            "https://www.googleapis.com/auth/drive".into(),
            "https://www.googleapis.com/auth/drive.file".into(),
        ],
    }
}
