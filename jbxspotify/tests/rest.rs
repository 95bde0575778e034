#![cfg(feature = "jbxserver")]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use jbxspotify::api_rest::{create_router, SpotifyState};
use jbxspotify::auth::now_millis;
use jbxspotify::{CredentialRecord, MemoryCredentialStore, SpotifyClient};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn router(server: &MockServer) -> Router {
    let store = MemoryCredentialStore::with_record(CredentialRecord {
        access_token: "A1".to_string(),
        refresh_token: None,
        expires_at: now_millis() + 3_600_000,
    });
    let client = SpotifyClient::builder()
        .accounts_url(server.uri())
        .api_url(server.uri())
        .store(Arc::new(store))
        .build()
        .expect("client");
    create_router(SpotifyState {
        client: Arc::new(client),
    })
}

async fn call(router: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn search_returns_tracks_in_provider_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "daft punk"))
        .and(query_param("type", "track"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tracks": { "items": [
                { "name": "One More Time", "uri": "spotify:track:1", "popularity": 80 },
                { "name": "Aerodynamic", "uri": "spotify:track:2" }
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "GET", "/search?q=daft%20punk", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["uri"], "spotify:track:1");
    assert_eq!(body[0]["popularity"], 80);
    assert_eq!(body[1]["name"], "Aerodynamic");
}

#[tokio::test]
async fn search_without_query_is_400() {
    let server = MockServer::start().await;
    let (status, body) = call(router(&server), "GET", "/search", Value::Null).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing query");
}

#[tokio::test]
async fn unknown_song_is_404_without_queue_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tracks": { "items": [] } })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/me/player/queue"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let (status, body) = call(
        router(&server),
        "POST",
        "/queue",
        json!({ "songName": "zzqxnotasong" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Song not found: zzqxnotasong");
}

#[tokio::test]
async fn queue_by_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/me/player/queue"))
        .and(query_param("uri", "spotify:track:X"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = call(
        router(&server),
        "POST",
        "/queue",
        json!({ "uri": "spotify:track:X" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Song added to queue");
}

#[tokio::test]
async fn queue_without_uri_or_name_is_400() {
    let server = MockServer::start().await;
    let (status, body) = call(router(&server), "POST", "/queue", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing track URI or song name");
}

#[tokio::test]
async fn volume_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": { "id": "d1", "name": "Kitchen", "type": "Speaker", "is_active": true, "volume_percent": 95 },
            "is_playing": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/player/volume"))
        .and(query_param("volume_percent", "100"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "POST", "/volume", json!({ "delta": 10 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volume"], 100);
}

#[tokio::test]
async fn volume_without_playback_is_400() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "POST", "/volume", json!({ "delta": -5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No active playback");
}

#[tokio::test]
async fn volume_set_failure_still_returns_computed_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": { "id": "d1", "name": "Kitchen", "type": "Speaker", "is_active": true },
            "is_playing": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/me/player/volume"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "POST", "/volume", json!({ "delta": -60 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["volume"], 0);
}

#[tokio::test]
async fn play_passes_provider_error_through() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/me/player/play"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "status": 403, "message": "Player command failed: Premium required" }
        })))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "POST", "/play", Value::Null).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Player command failed: Premium required");
}

#[tokio::test]
async fn play_without_device_is_404() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/me/player/play"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE" }
        })))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "POST", "/play", Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No active device. Open Spotify on a device first.");
}

#[tokio::test]
async fn devices_prefers_active_device() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                { "id": "d1", "name": "Phone", "type": "Smartphone", "is_active": false },
                { "id": "d2", "name": "Kitchen", "type": "Speaker", "is_active": true, "volume_percent": 30 }
            ]
        })))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "GET", "/devices", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["device"]["name"], "Kitchen");
    assert_eq!(body["device"]["type"], "Speaker");
}

#[tokio::test]
async fn devices_empty_is_null() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": [] })))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "GET", "/devices", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["device"].is_null());
}

#[tokio::test]
async fn get_queue_returns_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/player/queue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "currently_playing": { "name": "A", "uri": "spotify:track:A" },
            "queue": [{ "name": "B", "uri": "spotify:track:B" }]
        })))
        .mount(&server)
        .await;

    let (status, body) = call(router(&server), "GET", "/get-queue", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currently_playing"]["uri"], "spotify:track:A");
    assert_eq!(body["queue"][0]["uri"], "spotify:track:B");
}

#[tokio::test]
async fn store_tokens_then_status() {
    let server = MockServer::start().await;
    let client = SpotifyClient::builder()
        .accounts_url(server.uri())
        .api_url(server.uri())
        .build()
        .expect("client");
    let router = create_router(SpotifyState {
        client: Arc::new(client),
    });

    let (status, _) = call(router.clone(), "GET", "/play", Value::Null).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, body) = call(router.clone(), "POST", "/next", Value::Null).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Host not authenticated");

    let (status, body) = call(router.clone(), "POST", "/store-tokens", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing access token");

    let (status, body) = call(
        router.clone(),
        "POST",
        "/store-tokens",
        json!({ "access_token": "A1", "refresh_token": "R1", "expires_in": 3600 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = call(router, "GET", "/status", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["hasToken"], true);
    assert!(body["expiresAt"].as_i64().unwrap() > now_millis());
}
