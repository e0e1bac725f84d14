mod archive;
mod player;
mod streaming;

use std::{path::Path, sync::Arc};

use axum::{Router, routing::get};
use http::{HeaderMap, HeaderValue};

use super::{HttpApi, static_assets::make_static_router};
use crate::api_error::ApiError;

const READ_BUFFER_SIZE: usize = 65536;

type ApiState = Arc<HttpApi>;
type Result<T> = std::result::Result<T, ApiError>;

pub fn make_router(state: ApiState) -> Router {
    let route = |prefix: &str| format!("/{prefix}{{file_name}}");
    let routes = &state.routes;
    Router::new()
        .route(&route(&routes.archive), get(archive::h_archive))
        .route(&route(&routes.download), get(streaming::h_download))
        .route(&route(&routes.stream), get(streaming::h_stream))
        .route(&route(&routes.browser), get(player::h_player))
        .with_state(state.clone())
        .merge(make_static_router())
}

/// Content type for a media file: the registered MIME type of its extension,
/// or `video/<ext>` when there is none.
fn media_content_type(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.essence_str().to_owned();
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("video/{ext}")
}

fn insert_header(headers: &mut HeaderMap, name: http::HeaderName, value: impl std::fmt::Display) {
    match HeaderValue::from_str(&value.to_string()) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => tracing::debug!(%name, "skipping invalid header value: {e:#}"),
    }
}
