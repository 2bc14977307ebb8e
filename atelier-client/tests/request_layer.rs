//! Request layer: routing, auth retry and response handling.

#![cfg(feature = "testing")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use atelier_client::errors::ApiError;
use atelier_client::infrastructure::{ApiRequest, RawResponse, ResponseBody};
use atelier_client::testing::{ScriptedRefresher, ScriptedTransport};
use atelier_model::SessionTokens;
use reqwest::StatusCode;
use serde_json::{Value, json};

use common::{client, signed_in};

#[tokio::test]
async fn unauthorized_then_refresh_retries_once_with_new_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_status(StatusCode::UNAUTHORIZED)
        .push_json(StatusCode::OK, json!({"available": 1}));
    let refresher = Arc::new(ScriptedRefresher::succeeding(SessionTokens::new(
        "access-2",
        Some("refresh-2".into()),
    )));
    let session = signed_in("access-1", Some("refresh-1"));
    let api = client(transport.clone(), session.clone(), Some(refresher.clone()));

    let value: Value = api.get("/treasury/wallet/balance").await.unwrap();

    assert_eq!(value, json!({"available": 1}));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(refresher.presented(), vec!["refresh-1".to_string()]);
    assert_eq!(
        transport.authorization_headers(),
        vec![
            Some("Bearer access-1".to_string()),
            Some("Bearer access-2".to_string()),
        ]
    );
    assert_eq!(session.access_token().as_deref(), Some("access-2"));
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn failed_refresh_expires_session_without_retry() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_status(StatusCode::UNAUTHORIZED);
    let refresher = Arc::new(ScriptedRefresher::failing());
    let session = signed_in("access-1", Some("refresh-1"));
    let api = client(transport.clone(), session.clone(), Some(refresher.clone()));

    let err = api.get::<Value>("/gallery").await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.request_count(), 1);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn missing_refresh_token_expires_session_without_refresh_call() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_status(StatusCode::UNAUTHORIZED);
    let refresher = Arc::new(ScriptedRefresher::succeeding(SessionTokens::new("x", None)));
    let session = signed_in("access-1", None);
    let api = client(transport.clone(), session.clone(), Some(refresher.clone()));

    let err = api.get::<Value>("/profile/me").await.unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(refresher.calls(), 0);
    assert_eq!(transport.request_count(), 1);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn second_unauthorized_after_refresh_is_not_retried_again() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_status(StatusCode::UNAUTHORIZED)
        .push_status(StatusCode::UNAUTHORIZED)
        .push_json(StatusCode::OK, json!({}));
    let refresher = Arc::new(ScriptedRefresher::succeeding(SessionTokens::new(
        "access-2", None,
    )));
    let session = signed_in("access-1", Some("refresh-1"));
    let api = client(transport.clone(), session.clone(), Some(refresher.clone()));

    let err = api.get::<Value>("/gallery").await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired));
    assert_eq!(transport.request_count(), 2);
    assert_eq!(refresher.calls(), 1);
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn refresh_without_rotation_keeps_previous_refresh_token() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_status(StatusCode::UNAUTHORIZED)
        .push_status(StatusCode::NO_CONTENT);
    let refresher = Arc::new(ScriptedRefresher::succeeding(SessionTokens::new(
        "access-2", None,
    )));
    let session = signed_in("access-1", Some("refresh-1"));
    let api = client(transport, session.clone(), Some(refresher));

    api.execute(ApiRequest::delete("/gallery/1")).await.unwrap();

    assert_eq!(session.refresh_token().as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn no_content_resolves_empty_without_parsing() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push(RawResponse::new(StatusCode::NO_CONTENT, "{ not json"));
    let api = client(transport, signed_in("a", None), None);

    let body = api.execute(ApiRequest::delete("/gallery/1")).await.unwrap();
    assert_eq!(body, ResponseBody::Empty);
}

#[tokio::test]
async fn error_status_surfaces_server_message() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({"message": "Insufficient balance"}),
    );
    let api = client(transport, signed_in("a", None), None);

    let err = api.get::<Value>("/treasury/wallet/balance").await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
    assert_eq!(err.user_message(), "Insufficient balance");
}

#[tokio::test]
async fn network_failure_propagates_without_retry() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_network_error("connection refused");
    let refresher = Arc::new(ScriptedRefresher::succeeding(SessionTokens::new("b", None)));
    let session = signed_in("a", Some("r"));
    let api = client(transport.clone(), session.clone(), Some(refresher.clone()));

    let err = api.get::<Value>("/gallery").await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(transport.request_count(), 1);
    assert_eq!(refresher.calls(), 0);
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn requests_route_by_prefix_and_carry_json_headers() {
    let transport = Arc::new(ScriptedTransport::with_handler(|_| {
        RawResponse::json(StatusCode::OK, &json!(null))
    }));
    let api = client(transport.clone(), signed_in("tok", None), None);

    for path in [
        "/auth/login",
        "/gallery/7",
        "/treasury/wallet/balance",
        "/profile/me",
        "/authors",
    ] {
        let _: Value = api.get(path).await.unwrap();
    }

    let hosts: Vec<String> = transport
        .requests()
        .iter()
        .map(|request| request.url.host_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        hosts,
        vec![
            "auth.atelier.test",
            "gallery.atelier.test",
            "treasury.atelier.test",
            "users.atelier.test",
            "users.atelier.test",
        ]
    );

    let first = &transport.requests()[0];
    assert_eq!(first.url.path(), "/api/auth/login");
    assert_eq!(first.header("content-type"), Some("application/json"));
    assert_eq!(first.header("authorization"), Some("Bearer tok"));
}

#[tokio::test]
async fn signed_out_requests_carry_no_authorization() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push_json(StatusCode::OK, json!([]));
    let api = client(transport.clone(), atelier_client::SessionStore::new(), None);

    let _: Value = api.get("/gallery").await.unwrap();
    assert_eq!(transport.authorization_headers(), vec![None]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let transport = Arc::new(ScriptedTransport::with_handler(|request| {
        match request.header("authorization") {
            Some("Bearer fresh") => RawResponse::json(StatusCode::OK, &json!({"ok": true})),
            _ => RawResponse::empty(StatusCode::UNAUTHORIZED),
        }
    }));
    let refresher = Arc::new(
        ScriptedRefresher::succeeding(SessionTokens::new("fresh", Some("r2".into())))
            .with_delay(Duration::from_millis(50)),
    );
    let session = signed_in("stale", Some("r1"));
    let api = client(transport.clone(), session.clone(), Some(refresher.clone()));

    let calls = (0..4).map(|_| {
        let api = api.clone();
        async move { api.get::<Value>("/gallery").await }
    });
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(session.access_token().as_deref(), Some("fresh"));
    // Four stale attempts, four retries.
    assert_eq!(transport.request_count(), 8);
}
