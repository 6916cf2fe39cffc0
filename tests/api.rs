//! HTTP API scenarios against the router, without a socket

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use screen_recorder::config::{ServerConfig, StorageConfig};
use screen_recorder::server::{router, AppState};
use screen_recorder::store::{RecordingRecord, RecordingStore};

const BIG_FILE: usize = 10_485_760;
const BOUNDARY: &str = "recorder-test-boundary";

struct Harness {
    app: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

async fn harness_with(config: ServerConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordingStore::open(&StorageConfig::in_dir(dir.path())).await.unwrap();
    let state = Arc::new(AppState::new(store));
    Harness {
        app: router(state.clone(), &config),
        state,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(ServerConfig::default()).await
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn get(app: &Router, uri: &str, range: Option<&str>) -> Response {
    let mut request = Request::get(uri);
    if let Some(range) = range {
        request = request.header(header::RANGE, range);
    }
    send(app, request.body(Body::empty()).unwrap()).await
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn multipart_body(field: &str, file_name: Option<&str>, data: &[u8]) -> Vec<u8> {
    let mut body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"");
    if let Some(name) = file_name {
        body.push_str(&format!("; filename=\"{name}\"\r\nContent-Type: video/webm"));
    }
    body.push_str("\r\n\r\n");

    let mut bytes = body.into_bytes();
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    bytes
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/recordings")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_full_and_partial_reads() {
    let h = harness().await;
    let data = pattern(BIG_FILE);
    let record = h.state.store.save(&data, "big.webm").await.unwrap();
    let uri = format!("/api/recordings/{}", record.id);

    let full = get(&h.app, &uri, None).await;
    assert_eq!(full.status(), StatusCode::OK);
    assert_eq!(full.headers()[header::CONTENT_LENGTH], "10485760");
    assert_eq!(full.headers()[header::CONTENT_TYPE], "video/webm");
    assert_eq!(full.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_bytes(full).await, data);

    let head = get(&h.app, &uri, Some("bytes=0-99")).await;
    assert_eq!(head.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(head.headers()[header::CONTENT_RANGE], "bytes 0-99/10485760");
    assert_eq!(head.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(head.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_bytes(head).await, &data[..100]);

    let tail = get(&h.app, &uri, Some("bytes=500-")).await;
    assert_eq!(tail.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(tail.headers()[header::CONTENT_RANGE], "bytes 500-10485759/10485760");
    let tail_body = body_bytes(tail).await;
    assert_eq!(tail_body.len(), 10_485_260);
    assert_eq!(tail_body, &data[500..]);

    let suffix = get(&h.app, &uri, Some("bytes=-10")).await;
    assert_eq!(suffix.headers()[header::CONTENT_RANGE], "bytes 10485750-10485759/10485760");
    assert_eq!(body_bytes(suffix).await, &data[BIG_FILE - 10..]);
}

#[tokio::test]
async fn test_unknown_recording_is_404() {
    let h = harness().await;

    let response = get(&h.app, "/api/recordings/999999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Recording not found");
}

#[tokio::test]
async fn test_unparseable_id_is_404() {
    let h = harness().await;
    h.state.store.save(b"webm", "clip.webm").await.unwrap();

    for uri in ["/api/recordings/abc", "/api/recordings/-1", "/api/recordings/99999999999999999999999"] {
        let response = get(&h.app, uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(response).await["message"], "Recording not found");
    }
}

#[tokio::test]
async fn test_bad_ranges_are_416() {
    let h = harness().await;
    let record = h.state.store.save(&pattern(1000), "clip.webm").await.unwrap();
    let uri = format!("/api/recordings/{}", record.id);

    for range in ["bytes=0-1000", "bytes=2000-", "bytes=10-5"] {
        let response = get(&h.app, &uri, Some(range)).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{range}");
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */1000");
        assert!(body_json(response).await["error"].is_string());
    }

    for range in ["bytes=abc-def", "pages=1-2", "bytes=0-1,4-5"] {
        let response = get(&h.app, &uri, Some(range)).await;
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{range}");
        assert!(body_json(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_missing_file_on_disk_is_500() {
    let h = harness().await;
    let record = h.state.store.save(b"webm", "gone.webm").await.unwrap();
    std::fs::remove_file(&record.filepath).unwrap();

    let response = get(&h.app, &format!("/api/recordings/{}", record.id), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let h = harness().await;
    for name in ["a.webm", "b.webm", "c.webm"] {
        h.state.store.save(b"data", name).await.unwrap();
    }

    let response = get(&h.app, "/api/recordings", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let records: Vec<RecordingRecord> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 2, 1]);
    assert!(records.windows(2).all(|w| w[0].created_at >= w[1].created_at));
}

#[tokio::test]
async fn test_upload_creates_record() {
    let h = harness().await;
    let data = pattern(4096);

    let response = send(&h.app, upload_request(multipart_body("video", Some("my clip.webm"), &data))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Recording uploaded successfully");
    assert_eq!(json["recording"]["id"], 1);
    assert_eq!(json["recording"]["filesize"], 4096);
    assert!(json["recording"]["filename"].as_str().unwrap().ends_with("_my_clip.webm"));
    assert!(json["recording"]["createdAt"].is_string());

    let stored = get(&h.app, "/api/recordings/1", None).await;
    assert_eq!(body_bytes(stored).await, data);
}

#[tokio::test]
async fn test_upload_without_file_is_400() {
    let h = harness().await;

    let response = send(&h.app, upload_request(multipart_body("note", None, b"hello"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
    assert_eq!(h.state.store.len().await, 0);
}

#[tokio::test]
async fn test_plain_field_named_video_is_400() {
    let h = harness().await;

    let response = send(&h.app, upload_request(multipart_body("video", None, b"not a file"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No file uploaded");
    assert_eq!(h.state.store.len().await, 0);
    assert_eq!(std::fs::read_dir(h.state.store.uploads_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_empty_file_upload_is_400() {
    let h = harness().await;

    let response = send(&h.app, upload_request(multipart_body("video", Some("empty.webm"), b""))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.state.store.len().await, 0);
    assert_eq!(std::fs::read_dir(h.state.store.uploads_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_refused() {
    let h = harness_with(ServerConfig {
        max_upload_bytes: 1024,
        ..ServerConfig::default()
    })
    .await;

    let response = send(&h.app, upload_request(multipart_body("video", Some("big.webm"), &pattern(8192)))).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.state.store.len().await, 0);
    assert_eq!(std::fs::read_dir(h.state.store.uploads_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_health() {
    let h = harness().await;

    let response = get(&h.app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "ok": true }));
}

#[tokio::test]
async fn test_cors_exposes_range_headers() {
    let h = harness().await;

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/recordings/1")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "range")
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, preflight).await;
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    h.state.store.save(b"data", "a.webm").await.unwrap();
    let request = Request::get("/api/recordings/1")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = send(&h.app, request).await;
    let exposed = response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-range"));
    assert!(exposed.contains("accept-ranges"));
}

#[tokio::test]
async fn test_static_ui_fallback() {
    let ui = tempfile::tempdir().unwrap();
    std::fs::write(ui.path().join("index.html"), "<h1>recorder</h1>").unwrap();

    let h = harness_with(ServerConfig {
        static_dir: Some(ui.path().to_path_buf()),
        ..ServerConfig::default()
    })
    .await;

    let response = get(&h.app, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>recorder</h1>");
}
