use std::{
    fs::File,
    io::BufReader,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigRoutes {
    pub archive: String,
    pub download: String,
    pub stream: String,
    pub browser: String,
}

impl Default for ConfigRoutes {
    fn default() -> Self {
        Self {
            archive: "zip".to_owned(),
            download: "download".to_owned(),
            stream: "stream".to_owned(),
            browser: "video".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigHttp {
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL used when emitting links, e.g. "https://media.example.com".
    pub domain: String,
    pub routes: ConfigRoutes,
}

impl Default for ConfigHttp {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            domain: "http://localhost:3000".to_owned(),
            routes: Default::default(),
        }
    }
}

impl ConfigHttp {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigStorage {
    pub download_dir: PathBuf,
    pub archive_dir: PathBuf,
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            archive_dir: PathBuf::from("archives"),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConfigTransfer {
    pub poll_interval_ms: u64,
}

impl Default for ConfigTransfer {
    fn default() -> Self {
        Self {
            poll_interval_ms: crate::transfer::DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ConfigTransfer {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub http: ConfigHttp,
    pub storage: ConfigStorage,
    pub video_extensions: Vec<String>,
    pub transfer: ConfigTransfer,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: Default::default(),
            storage: Default::default(),
            video_extensions: ["mp4", "mkv", "webm", "avi", "mov"]
                .into_iter()
                .map(|s| s.to_owned())
                .collect(),
            transfer: Default::default(),
        }
    }
}

impl Config {
    /// Reads a JSON config. Relative storage paths are resolved against the
    /// directory the file lives in.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let rdr = BufReader::new(
            File::open(path).with_context(|| format!("error opening config {path:?}"))?,
        );
        let mut config: Config = serde_json::from_reader(rdr)
            .with_context(|| format!("error parsing config {path:?}"))?;
        if let Some(base) = path.parent() {
            config.storage.download_dir = base.join(&config.storage.download_dir);
            config.storage.archive_dir = base.join(&config.storage.archive_dir);
        }
        Ok(config)
    }
}

/// Turns a configured route ("stream", "/stream/", "/stream/:fileName") into a
/// bare prefix with a single trailing slash and no leading one: "stream/".
pub fn route_prefix(route: &str) -> String {
    let route = route.split(':').next().unwrap_or_default();
    let route = route.trim_matches('/');
    if route.is_empty() {
        return String::new();
    }
    format!("{route}/")
}
