//! Response variants written through the transport.

use crate::helpers::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_json_envelope() {
    let server = TestServer::start().await;
    let resp = server.get("/json?who=chain").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json; charset=utf-8");
    assert_header(&resp, "x-content-type-options", "nosniff");

    let body = json_body(resp).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["hello"], "chain");
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_jsonp_error_uses_transport_200() {
    let server = TestServer::start().await;
    let resp = server.get("/jsonp?callback=handle").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/javascript; charset=utf-8");

    let body = resp.text().await.unwrap();
    assert!(body.starts_with("handle({"), "unexpected body: {}", body);
    assert!(body.ends_with(");\n"));
    assert!(body.contains("\"code\":400"));
    assert!(body.contains("\"success\":false"));
    assert!(body.contains("\"message\":\"bad input\""));
}

#[tokio::test]
async fn test_jsonp_default_callback() {
    let server = TestServer::start().await;
    let resp = server.get("/jsonp").await;

    let body = resp.text().await.unwrap();
    assert!(body.starts_with("console.error("), "unexpected body: {}", body);
}

#[tokio::test]
async fn test_permanent_redirect() {
    let server = TestServer::start().await;
    let resp = server.get("/redirect").await;

    assert_status(&resp, StatusCode::MOVED_PERMANENTLY);
    assert_header(&resp, "location", "/json");
    assert_header(&resp, "content-type", "text/html; charset=utf-8");
    let body = resp.text().await.unwrap();
    assert!(body.contains("<a href=\"/json\">"));
}

#[tokio::test]
async fn test_break_keeps_handler_output() {
    let server = TestServer::start().await;
    let resp = server.get("/break").await;

    assert_status(&resp, StatusCode::ACCEPTED);
    assert_header(&resp, "content-type", "text/plain; charset=utf-8");
    assert_eq!(resp.text().await.unwrap(), "written by handler");
}

#[tokio::test]
async fn test_bind_json_echo() {
    let server = TestServer::start().await;
    let resp = server.post("/echo", r#"{"name":"ada","tags":[1,2]}"#).await;

    assert_status(&resp, StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["name"], "ada");
    assert_eq!(body["data"]["tags"][1], 2);
}

#[tokio::test]
async fn test_bind_json_malformed() {
    let server = TestServer::start().await;
    let resp = server.post("/echo", "{not json").await;

    assert_status(&resp, StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
}
