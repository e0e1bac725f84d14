//!
//! Download media over BitTorrent one transfer at a time, pack it into zip
//! archives and serve it over HTTP with range support.
//!
//! # Quick usage example
//!
//! ```no_run
//! use libseedbox::{config::Config, http_api::HttpApi};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::default();
//! let listener = tokio::net::TcpListener::bind(config.http.listen_addr()).await?;
//! HttpApi::new(&config)?.make_http_api_and_run(listener).await
//! # }
//! ```
//!
//! # Overview
//! - [`transfer::TransferController`] drives the single active download and
//!   reports progress through a [`transfer::TransferObserver`]. The engine
//!   doing the actual peer-to-peer work sits behind
//!   [`transfer::TransferEngine`]; with the `rqbit` feature,
//!   `transfer::rqbit::RqbitEngine` provides one.
//! - [`library::Library`] lists, archives and deletes downloaded items.
//! - [`http_api::HttpApi`] serves videos, player pages and archives.

pub mod api_error;
pub mod archive;
pub mod chunker;
pub mod config;
mod error;
pub mod file_locator;
pub mod http_api;
pub mod library;
pub mod links;
mod spawn_utils;
#[cfg(feature = "tracing-subscriber-utils")]
pub mod tracing_subscriber_config_utils;
pub mod transfer;

pub use api_error::ApiError;
pub use error::{Error, Result};
pub use spawn_utils::spawn as seedbox_spawn;

/// The cargo version of libseedbox.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
