//! File serving: ranges, conditional requests, and error rewriting.

use crate::helpers::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_full_file() {
    let server = TestServer::start().await;
    let resp = server.get("/files/hello.txt").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "text/plain; charset=utf-8");
    assert_header(&resp, "accept-ranges", "bytes");
    assert_header(&resp, "content-length", "10");
    assert!(resp.headers().contains_key("last-modified"));
    assert_eq!(resp.text().await.unwrap(), "0123456789");
}

#[tokio::test]
async fn test_single_range() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/files/hello.txt", &[("range", "bytes=2-4")])
        .await;

    assert_status(&resp, StatusCode::PARTIAL_CONTENT);
    assert_header(&resp, "content-range", "bytes 2-4/10");
    assert_eq!(resp.text().await.unwrap(), "234");
}

#[tokio::test]
async fn test_suffix_range() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/files/hello.txt", &[("range", "bytes=-3")])
        .await;

    assert_status(&resp, StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.text().await.unwrap(), "789");
}

#[tokio::test]
async fn test_unsatisfiable_range_is_json() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/files/hello.txt", &[("range", "bytes=20-30")])
        .await;

    assert_status(&resp, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_header(&resp, "content-type", "application/json; charset=utf-8");
    assert_header(&resp, "content-range", "bytes */10");

    let body = json_body(resp).await;
    assert_eq!(body["code"], 416);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["message"], "invalid range: failed to overlap");
}

#[tokio::test]
async fn test_malformed_range_is_json() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/files/hello.txt", &[("range", "bytes=5-2")])
        .await;

    assert_status(&resp, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_header(&resp, "content-type", "application/json; charset=utf-8");
    assert!(resp.headers().get("content-range").is_none());

    let body = json_body(resp).await;
    assert_eq!(body["code"], 416);
    assert_eq!(body["errors"][0]["message"], "invalid range");
}

#[tokio::test]
async fn test_multiple_ranges() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/files/hello.txt", &[("range", "bytes=0-1,8-")])
        .await;

    assert_status(&resp, StatusCode::PARTIAL_CONTENT);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    let boundary = content_type
        .strip_prefix("multipart/byteranges; boundary=")
        .expect("multipart content type");

    let body = resp.text().await.unwrap();
    assert!(body.starts_with(&format!("--{}\r\n", boundary)));
    assert!(body.contains("Content-Range: bytes 0-1/10\r\n"));
    assert!(body.contains("\r\n\r\n01\r\n"));
    assert!(body.contains("Content-Range: bytes 8-9/10\r\n"));
    assert!(body.ends_with(&format!("\r\n89\r\n--{}--\r\n", boundary)));
}

#[tokio::test]
async fn test_not_modified() {
    let server = TestServer::start().await;
    let first = server.get("/files/hello.txt").await;
    let last_modified = first
        .headers()
        .get("last-modified")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let resp = server
        .get_with_headers("/files/hello.txt", &[("if-modified-since", &last_modified)])
        .await;

    assert_status(&resp, StatusCode::NOT_MODIFIED);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_file_is_json_404() {
    let server = TestServer::start().await;
    let resp = server.get("/files/absent.txt").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    let body = json_body(resp).await;
    assert_eq!(body["code"], 404);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_directory_is_forbidden() {
    let server = TestServer::start().await;
    std::fs::create_dir(server.root.path().join("sub")).unwrap();
    let resp = server.get("/files/sub").await;

    assert_status(&resp, StatusCode::FORBIDDEN);
    let body = json_body(resp).await;
    assert_eq!(body["code"], 403);
}
