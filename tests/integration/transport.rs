//! Transport fallbacks and shutdown.

use std::time::Duration;

use crate::helpers::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_unresolved_path_is_json_404() {
    let server = TestServer::start().await;
    let resp = server.get("/nowhere").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert_eq!(body["errors"][0]["message"], "Not Found");
}

#[tokio::test]
async fn test_body_limit() {
    let server = TestServer::start_with(|c| c.with_max_body_size(16)).await;
    let resp = server.post("/echo", vec![b'x'; 64]).await;

    assert_status(&resp, StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(resp).await;
    assert_eq!(body["code"], 413);
}

#[tokio::test]
async fn test_panic_recovered_as_json_500() {
    let server = TestServer::start().await;
    let resp = server.get("/panic").await;

    assert_status(&resp, StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["errors"][0]["message"], "panic: handler exploded");

    // The server keeps serving after a recovered panic
    let resp = server.get("/json").await;
    assert_status(&resp, StatusCode::OK);
}

#[tokio::test]
async fn test_panic_without_recovery_drops_connection() {
    let server = TestServer::start_with(|c| c.with_panic_recovery(false)).await;
    let result = server.client.get(server.url("/panic")).send().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_write_timeout() {
    let server =
        TestServer::start_with(|c| c.with_write_timeout(Some(Duration::from_millis(50)))).await;
    let resp = server.get("/slow").await;

    assert_status(&resp, StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(resp).await;
    assert_eq!(body["code"], 504);
}

#[tokio::test]
async fn test_write_timeout_stops_at_first_byte() {
    let server =
        TestServer::start_with(|c| c.with_write_timeout(Some(Duration::from_millis(50)))).await;
    let resp = server.get("/trickle").await;

    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "first second");
}

#[tokio::test]
async fn test_reader_body_is_streamed() {
    let server = TestServer::start().await;
    let resp = server.get("/stream").await;

    assert_status(&resp, StatusCode::OK);
    assert!(resp.headers().get("content-length").is_none());
    assert_header(&resp, "transfer-encoding", "chunked");

    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len() as u64, STREAM_BYTES);
    assert!(body.iter().all(|b| *b == b'z'));
}

#[tokio::test]
async fn test_panic_without_recovery_keeps_server_up() {
    let server = TestServer::start_with(|c| c.with_panic_recovery(false)).await;
    assert!(server.client.get(server.url("/panic")).send().await.is_err());

    let resp = server.get("/json").await;
    assert_status(&resp, StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;
    server.server().trigger_shutdown();
    assert!(server.server().wait_for_drain(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_shutdown_drains_connections() {
    let server = TestServer::start().await;
    let resp = server.get("/json").await;
    assert_status(&resp, StatusCode::OK);

    server.server().trigger_shutdown();
    assert!(server.server().wait_for_drain(Duration::from_secs(5)).await);
}
