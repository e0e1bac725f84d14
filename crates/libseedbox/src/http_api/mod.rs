use std::path::PathBuf;

use anyhow::Context;
use axum::{Router, extract::Request};
use futures::{FutureExt, future::BoxFuture};
use tokio::net::TcpListener;
use tower_http::trace::DefaultOnResponse;
use tracing::{debug_span, info};

use crate::{
    config::{Config, route_prefix},
    file_locator,
    library::{Library, is_plain_name},
    links::LinkBuilder,
};

mod handlers;
mod range;
mod static_assets;

pub use range::RangeRequest;

/// Route prefixes, each without a leading slash and with one trailing slash.
#[derive(Debug, Clone)]
struct Routes {
    archive: String,
    download: String,
    stream: String,
    browser: String,
}

/// The media server: full downloads, range streams, a player page and
/// archives.
pub struct HttpApi {
    library: Library,
    links: LinkBuilder,
    routes: Routes,
}

impl HttpApi {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let r = &config.http.routes;
        let routes = Routes {
            archive: route_prefix(&r.archive),
            download: route_prefix(&r.download),
            stream: route_prefix(&r.stream),
            browser: route_prefix(&r.browser),
        };
        let all = [
            &routes.archive,
            &routes.download,
            &routes.stream,
            &routes.browser,
        ];
        for (idx, route) in all.iter().enumerate() {
            if route.is_empty() {
                anyhow::bail!("HTTP routes must not be empty");
            }
            if all[..idx].contains(route) {
                anyhow::bail!("HTTP route {route:?} is configured more than once");
            }
        }
        Ok(Self {
            library: Library::new(
                config.storage.download_dir.clone(),
                config.storage.archive_dir.clone(),
            ),
            links: LinkBuilder::new(config),
            routes,
        })
    }

    /// Finds a downloaded file by its base name. The extension of `file_name`
    /// decides which files are searched.
    async fn resolve_video(&self, file_name: &str) -> Option<PathBuf> {
        if !is_plain_name(file_name) {
            return None;
        }
        let extension = std::path::Path::new(file_name)
            .extension()?
            .to_str()?
            .to_owned();
        let name = file_name.to_owned();
        let root = self.library.download_dir().to_owned();
        tokio::task::spawn_blocking(move || file_locator::find_by_name(&extension, &name, &[root]))
            .await
            .ok()
            .flatten()
    }

    pub fn make_router(self) -> Router {
        handlers::make_router(std::sync::Arc::new(self)).layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    let method = req.method();
                    let uri = req.uri();
                    debug_span!("request", %method, %uri)
                })
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
    }

    /// Run the HTTP server forever on the given listener.
    #[inline(never)]
    pub fn make_http_api_and_run(
        self,
        listener: TcpListener,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "media server listening");
        }
        let app = self.make_router();
        async move {
            axum::serve(listener, app)
                .await
                .context("error running HTTP API")
        }
        .boxed()
    }
}
