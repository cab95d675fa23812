use std::path::{Component, Path};
use std::sync::Arc;

use http::Method;
use serde::Deserialize;
use tracing::{error, info, warn};

use chainserve::errors::ApiError;
use chainserve::response::{common, file, JsonpResponse};
use chainserve::{logging, Config, HandlerChain, JsonResponse, MultiError, Params, Server};

#[derive(Deserialize)]
struct Greeting {
    #[serde(default)]
    name: String,
}

/// Routes served by the binary.
struct Routes {
    ping: Arc<HandlerChain>,
    echo: Arc<HandlerChain>,
    jsonp: Arc<HandlerChain>,
    files: Arc<HandlerChain>,
}

impl Routes {
    fn new(document_root: &Path) -> Self {
        let root = document_root.to_path_buf();

        let ping = HandlerChain::new().add_fn(|_| Some(common::ok()));

        let echo = HandlerChain::new()
            .add_fn(|ctx| (ctx.req.method() != Method::POST).then(common::method_not_allowed))
            .add_fn(|ctx| match ctx.bind_json::<Greeting>() {
                Ok(g) if g.name.is_empty() => {
                    let mut errs = MultiError::new();
                    errs.push(ApiError::missing("name"));
                    Some(JsonResponse::error(422, [errs]).into())
                }
                Ok(g) => Some(JsonResponse::new(format!("hello {}", g.name)).into()),
                Err(e) => Some(JsonResponse::error(400, [e]).into()),
            });

        let jsonp = HandlerChain::new().add_fn(|ctx| {
            let callback = ctx.query("callback").unwrap_or_default();
            Some(JsonpResponse::new(callback, ctx.path()).into())
        });

        let files = HandlerChain::new()
            .add_fn(|ctx| {
                let fp = ctx.param("fp").unwrap_or_default();
                let safe = Path::new(fp)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
                (!safe).then(common::forbidden)
            })
            .add_fn(move |ctx| {
                let fp = ctx.param("fp").unwrap_or_default();
                Some(file("", root.join(fp)))
            });

        Self {
            ping: Arc::new(ping),
            echo: Arc::new(echo),
            jsonp: Arc::new(jsonp),
            files: Arc::new(files),
        }
    }

    fn resolve(&self, method: &Method, path: &str) -> Option<(Arc<HandlerChain>, Params)> {
        let read = method == Method::GET || method == Method::HEAD;
        match path {
            "/ping" if read => Some((Arc::clone(&self.ping), Params::new())),
            "/echo" => Some((Arc::clone(&self.echo), Params::new())),
            "/jsonp" if read => Some((Arc::clone(&self.jsonp), Params::new())),
            _ if read => {
                let fp = path.strip_prefix("/files/")?;
                let fp = percent_encoding::percent_decode_str(fp)
                    .decode_utf8()
                    .ok()?
                    .into_owned();
                Some((Arc::clone(&self.files), Params::new().with("fp", fp)))
            }
            _ => None,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;
    logging::init(&config.logging);

    info!("Starting chainserve {}", chainserve::VERSION);
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(config.server.worker_count())
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let routes = Routes::new(&config.server.document_root);
    let server = Server::new(config.server, move |method: &Method, path: &str| {
        routes.resolve(method, path)
    });

    // Handle shutdown gracefully
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
        }
    }

    server.trigger_shutdown();
    if !server.wait_for_drain(server.drain_timeout()).await {
        warn!("Exiting with {} open connections", server.active_connections());
    }

    Ok(())
}
