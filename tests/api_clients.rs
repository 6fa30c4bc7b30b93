//! Auth and history clients against an in-process API server.

use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;

use olympus::auth_api::AuthClient;
use olympus::config::ApiConfig;
use olympus::history::HistoryClient;
use olympus::http::ApiError;
use olympus::state::{SessionStore, StaticToken, TokenSource};

async fn serve(app: Router) -> ApiConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ApiConfig {
        base_url: format!("http://{}", addr),
        ..ApiConfig::default()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer good")
}

fn auth_app() -> Router {
    Router::new()
        .route(
            "/api/auth/login",
            post(|Json(body): Json<Value>| async move {
                if body["email"] == "me@example.com" && body["password"] == "hunter2" {
                    Json(json!({
                        "access_token": "good",
                        "refresh_token": "refresh",
                        "token_type": "bearer",
                        "expires_in": 1800
                    }))
                    .into_response()
                } else {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({"detail": "Invalid email or password"})),
                    )
                        .into_response()
                }
            }),
        )
        .route(
            "/api/auth/me",
            get(|headers: HeaderMap| async move {
                if !authorized(&headers) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                Json(json!({
                    "id": "u1",
                    "email": "me@example.com",
                    "full_name": "Me",
                    "role": "admin",
                    "is_active": true,
                    "email_confirmed": true,
                    "created_at": "2024-01-01T00:00:00Z"
                }))
                .into_response()
            }),
        )
        .route(
            "/api/auth/sse-token",
            post(|headers: HeaderMap| async move {
                if !authorized(&headers) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                Json(json!({"sse_token": "short-lived", "expires_in": 300})).into_response()
            }),
        )
        .route(
            "/api/auth/logout",
            post(|headers: HeaderMap| async move {
                if authorized(&headers) {
                    StatusCode::NO_CONTENT
                } else {
                    StatusCode::UNAUTHORIZED
                }
            }),
        )
}

fn record(id: &str, text: &str) -> Value {
    json!({
        "id": id,
        "space_id": "s1",
        "created_by": "u1",
        "query_text": text,
        "result": "An answer.",
        "confidence_score": 0.82,
        "status": "completed",
        "sources": {"citations": [], "count": 0},
        "created_at": "2024-05-01T12:00:00Z"
    })
}

fn history_app() -> Router {
    Router::new()
        .route(
            "/api/queries",
            get(
                |headers: HeaderMap, Query(params): Query<HashMap<String, String>>| async move {
                    if !authorized(&headers) {
                        return StatusCode::UNAUTHORIZED.into_response();
                    }
                    let limit: usize = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(20);
                    let all = vec![record("q1", "first"), record("q2", "second"), record("q3", "third")];
                    let queries: Vec<Value> = all.into_iter().take(limit).collect();
                    Json(json!({"queries": queries, "total": 3})).into_response()
                },
            ),
        )
        .route(
            "/api/queries/{id}",
            get(|headers: HeaderMap, Path(id): Path<String>| async move {
                if !authorized(&headers) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                if id == "q1" {
                    Json(record("q1", "first")).into_response()
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({"detail": "Query not found"})))
                        .into_response()
                }
            })
            .delete(|headers: HeaderMap, Path(id): Path<String>| async move {
                match (authorized(&headers), id.as_str()) {
                    (false, _) => StatusCode::UNAUTHORIZED,
                    (true, "q1") => StatusCode::NO_CONTENT,
                    (true, _) => StatusCode::NOT_FOUND,
                }
            }),
        )
}

#[tokio::test]
async fn test_login_and_profile() {
    let config = serve(auth_app()).await;
    let client = AuthClient::new(&config).unwrap();

    let session = client.login("me@example.com", "hunter2").await.unwrap();
    assert_eq!(session.access_token, "good");
    assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
    assert!(session.expires_at.is_some());

    let profile = client.me(&session.access_token).await.unwrap();
    assert_eq!(profile.email, "me@example.com");
    assert_eq!(profile.role, "admin");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let config = serve(auth_app()).await;
    let err = AuthClient::new(&config)
        .unwrap()
        .login("me@example.com", "wrong")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidCredentials));
}

#[tokio::test]
async fn test_sse_token_exchange() {
    let config = serve(auth_app()).await;
    let client = AuthClient::new(&config).unwrap();

    let token = client.sse_token("good").await.unwrap();
    assert_eq!(token.sse_token, "short-lived");
    assert_eq!(token.expires_in, 300);

    let err = client.sse_token("bad").await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}

#[tokio::test]
async fn test_run_login_persists_session_then_logout_clears_it() {
    let config = serve(auth_app()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let store = SessionStore::hydrate(&path);

    olympus::auth_api::run_login(&config, &store, "me@example.com", Some("hunter2".into()))
        .await
        .unwrap();
    assert_eq!(store.access_token().as_deref(), Some("good"));
    assert_eq!(
        store.session().unwrap().user.unwrap().email,
        "me@example.com"
    );
    assert!(path.exists());

    olympus::auth_api::run_logout(&config, &store).await.unwrap();
    assert!(store.access_token().is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_history_list_get_delete() {
    let config = serve(history_app()).await;
    let client = HistoryClient::new(&config, &StaticToken::new("good")).unwrap();

    let page = client.list(Some("s1"), 2, 0).await.unwrap();
    assert_eq!(page.queries.len(), 2);
    assert_eq!(page.total, Some(3));
    assert_eq!(page.queries[0].query_text, "first");

    let record = client.get("q1").await.unwrap();
    assert_eq!(record.confidence_score, Some(0.82));
    assert_eq!(record.label(40), "first");

    client.delete("q1").await.unwrap();
}

#[tokio::test]
async fn test_history_not_found() {
    let config = serve(history_app()).await;
    let client = HistoryClient::new(&config, &StaticToken::new("good")).unwrap();

    let err = client.get("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let err = client.delete("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_history_rejected_token() {
    let config = serve(history_app()).await;
    let client = HistoryClient::new(&config, &StaticToken::new("expired")).unwrap();
    let err = client.list(None, 10, 0).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
}
