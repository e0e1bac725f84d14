use axum::{Router, routing::get};

pub fn make_static_router() -> Router {
    Router::new().route(
        "/favicon.ico",
        get(|| async {
            (
                [("Content-Type", "image/x-icon")],
                include_bytes!("../../assets/favicon.ico").as_slice(),
            )
        }),
    )
}
