//! Test helpers and utilities

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chainserve::response::{file, plain, redirect, simple, JsonpResponse, Payload};
use chainserve::{HandlerChain, JsonResponse, Params, Server, ServerConfig, BREAK};
use http::Method;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

/// Body size served by `/stream`, well past the transport's channel capacity.
pub const STREAM_BYTES: u64 = 4 * 1024 * 1024;

/// In-process server bound to an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub root: tempfile::TempDir,
    server: Arc<Server>,
}

#[allow(dead_code)]
impl TestServer {
    /// Start the fixture routes with default settings.
    pub async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    /// Start the fixture routes with an adjusted configuration.
    pub async fn start_with(adjust: impl FnOnce(ServerConfig) -> ServerConfig) -> Self {
        let root = tempfile::tempdir().expect("Failed to create document root");
        std::fs::write(root.path().join("hello.txt"), b"0123456789")
            .expect("Failed to write fixture file");

        let config = adjust(
            ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
                .with_read_timeout(Some(Duration::from_secs(5))),
        );

        let routes = Routes::new(root.path());
        let server = Arc::new(Server::new(config, move |method: &Method, path: &str| {
            routes.resolve(method, path)
        }));

        let listener = server.bind().expect("Failed to bind listener");
        let addr = listener.local_addr().expect("Failed to read local address");
        {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = server.serve(listener).await;
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            root,
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(self.url(path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Make a POST request with a raw body
    pub async fn post(&self, path: &str, body: impl Into<reqwest::Body>) -> Response {
        self.client
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("POST request failed")
    }

    pub fn server(&self) -> &Server {
        &self.server
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.trigger_shutdown();
    }
}

/// Fixture routes covering each response kind.
struct Routes {
    chains: Vec<(&'static str, Arc<HandlerChain>)>,
    files: Arc<HandlerChain>,
}

impl Routes {
    fn new(root: &Path) -> Self {
        let root: PathBuf = root.to_path_buf();

        let chains = vec![
            (
                "/json",
                HandlerChain::new().add_fn(|ctx| {
                    let who = ctx.query("who").unwrap_or_else(|| "world".to_string());
                    Some(JsonResponse::new(serde_json::json!({ "hello": who })).into())
                }),
            ),
            (
                "/jsonp",
                HandlerChain::new().add_fn(|ctx| {
                    let callback = ctx.query("callback").unwrap_or_default();
                    Some(JsonpResponse::error(callback, 0, ["bad input"]).into())
                }),
            ),
            ("/redirect", HandlerChain::new().add_fn(|_| Some(redirect("/json", true)))),
            (
                "/break",
                HandlerChain::new()
                    .add_fn(|ctx| {
                        ctx.text(202, "", format_args!("written by handler")).ok()?;
                        Some(BREAK)
                    })
                    .add_fn(|_| Some(plain("", "unreachable"))),
            ),
            (
                "/echo",
                HandlerChain::new().add_fn(|ctx| match ctx.bind_json::<Value>() {
                    Ok(v) => Some(JsonResponse::new(v).into()),
                    Err(e) => Some(JsonResponse::error(400, [e]).into()),
                }),
            ),
            (
                "/panic",
                HandlerChain::new().add_fn(|_| -> Option<chainserve::Response> {
                    panic!("handler exploded")
                }),
            ),
            (
                "/slow",
                HandlerChain::new().add_fn(|_| {
                    std::thread::sleep(Duration::from_millis(500));
                    Some(plain("", "late"))
                }),
            ),
            (
                "/stream",
                HandlerChain::new().add_fn(|_| {
                    let reader = std::io::repeat(b'z').take(STREAM_BYTES);
                    Some(simple(200, "application/octet-stream", Payload::reader(reader)))
                }),
            ),
            (
                "/trickle",
                HandlerChain::new().add_fn(|ctx| {
                    ctx.text(200, "", format_args!("first ")).ok()?;
                    std::thread::sleep(Duration::from_millis(200));
                    ctx.write_all(b"second").ok()?;
                    Some(BREAK)
                }),
            ),
        ];

        let files = HandlerChain::new().add_fn(move |ctx| {
            let fp = ctx.param("fp").unwrap_or_default();
            Some(file("", root.join(fp)))
        });

        Self {
            chains: chains
                .into_iter()
                .map(|(path, chain)| (path, Arc::new(chain)))
                .collect(),
            files: Arc::new(files),
        }
    }

    fn resolve(&self, _method: &Method, path: &str) -> Option<(Arc<HandlerChain>, Params)> {
        if let Some(fp) = path.strip_prefix("/files/") {
            return Some((Arc::clone(&self.files), Params::new().with("fp", fp)));
        }
        self.chains
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, chain)| (Arc::clone(chain), Params::new()))
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Read a JSON envelope body.
pub async fn json_body(response: Response) -> Value {
    response.json().await.expect("Failed to parse JSON body")
}
