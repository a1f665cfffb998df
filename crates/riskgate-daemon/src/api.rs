//! The HTTP surface: classification plus the admin operations.
//!
//! Request validation lives here, not in the core: the classifier receives
//! only inputs that already look like an email address or a dotted-quad
//! IPv4. Verdicts serialize as `{"risk_level": ..., "reasons": [...]}`.

use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use riskgate_core::Classifier;
use riskgate_intel::{LoaderHandle, LoaderStatus};

/// Shared state behind every handler.
pub struct AppState {
    pub classifier: Classifier,
    pub loader: LoaderHandle,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/classify", post(classify))
        .route("/v1/status", get(status))
        .route("/v1/update", post(update))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

async fn classify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClassifyRequest>,
) -> Response {
    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    let ip = request.ip.as_deref().map(str::trim).filter(|i| !i.is_empty());

    if email.is_none() && ip.is_none() {
        return bad_request("provide at least one of email, ip");
    }
    if let Some(ip) = ip {
        if ip.parse::<Ipv4Addr>().is_err() {
            return bad_request("ip must be a dotted-quad IPv4 address");
        }
    }
    if let Some(email) = email {
        if !email.contains('@') || email.len() > 320 {
            return bad_request("email is malformed");
        }
    }

    let verdict = state.classifier.classify(email, ip).await;
    debug!(
        email = email.unwrap_or("-"),
        ip = ip.unwrap_or("-"),
        level = %verdict.level,
        "classified signup"
    );
    Json(verdict).into_response()
}

async fn status(State(state): State<Arc<AppState>>) -> Json<LoaderStatus> {
    Json(state.loader.status())
}

/// Kick off a refresh without holding the HTTP connection open for the
/// download; the outcome lands in `/v1/status`.
async fn update(State(state): State<Arc<AppState>>) -> Response {
    let loader = state.loader.clone();
    tokio::spawn(async move {
        let outcome = loader.update_now().await;
        info!(?outcome, "admin-triggered refresh finished");
    });
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "scheduled" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    use riskgate_core::{IndexRegistry, IndexValue};
    use riskgate_intel::{BlocklistLoader, FeedFetcher, SnapshotStore};
    use riskgate_resolver::{default_pool, MxResolver};

    fn app() -> (Router, Arc<IndexRegistry>) {
        let registry = Arc::new(IndexRegistry::new());
        for category in &riskgate_core::CATALOG {
            registry.create(category.name);
        }
        registry.create(riskgate_core::MX_CACHE);

        let tmp = std::env::temp_dir().join("riskgate-api-tests");
        let (_loader, handle) = BlocklistLoader::with_schedule(
            Arc::clone(&registry),
            FeedFetcher::new().unwrap(),
            SnapshotStore::new(tmp),
            Vec::new(),
            Duration::from_secs(86_400),
            Duration::from_secs(3_600),
        );

        // Capacity 0: any live MX lookup degrades to no_mx, so tests stay
        // off the network.
        let resolver = Arc::new(MxResolver::with_pool(default_pool(), 0));
        let classifier = Classifier::new(Arc::clone(&registry), resolver);

        let state = Arc::new(AppState {
            classifier,
            loader: handle,
        });
        (router(state), registry)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn classify_rejects_empty_request() {
        let (app, _) = app();
        let response = app.oneshot(post_json("/v1/classify", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn classify_rejects_malformed_ip() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/v1/classify", r#"{"ip":"999.1.1.1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn classify_rejects_email_without_at_sign() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/v1/classify", r#"{"email":"not-an-address"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn classify_accepts_a_listed_ip() {
        let (app, registry) = app();
        registry
            .insert("tor_network_ip", "185.220.101.1", IndexValue::Present)
            .unwrap();
        let response = app
            .oneshot(post_json("/v1/classify", r#"{"ip":"185.220.101.1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn classify_accepts_a_free_provider_email() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/v1/classify", r#"{"email":"john@gmail.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_is_served() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/v1/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn update_is_accepted() {
        let (app, _) = app();
        let response = app
            .oneshot(post_json("/v1/update", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
