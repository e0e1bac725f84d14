//! Public URLs for downloaded videos and archives.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    Result,
    chunker::Chunks,
    config::{Config, route_prefix},
    file_locator,
};

pub const NO_VIDEOS_MESSAGE: &str = "No video files were found in the download folder.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoLinks {
    pub name: String,
    pub path: PathBuf,
    pub browser: String,
    pub download: String,
    pub stream: String,
}

#[derive(Debug, Clone)]
pub struct LinkBuilder {
    // Always ends with '/'.
    domain: String,
    archive: String,
    download: String,
    stream: String,
    browser: String,
    video_extensions: Vec<String>,
    download_dir: PathBuf,
}

impl LinkBuilder {
    pub fn new(config: &Config) -> Self {
        let domain = config.http.domain.trim_end_matches('/');
        let routes = &config.http.routes;
        Self {
            domain: format!("{domain}/"),
            archive: route_prefix(&routes.archive),
            download: route_prefix(&routes.download),
            stream: route_prefix(&routes.stream),
            browser: route_prefix(&routes.browser),
            video_extensions: config.video_extensions.clone(),
            download_dir: config.storage.download_dir.clone(),
        }
    }

    fn url(&self, prefix: &str, file_name: &str) -> String {
        format!(
            "{}{}{}",
            self.domain,
            prefix,
            urlencoding::encode(file_name)
        )
    }

    pub fn archive_link(&self, archive_file_name: &str) -> String {
        self.url(&self.archive, archive_file_name)
    }

    /// Server-relative path of the range stream for `file_name`.
    pub fn stream_path(&self, file_name: &str) -> String {
        format!("/{}{}", self.stream, urlencoding::encode(file_name))
    }

    pub fn links_for(&self, path: &Path) -> Option<VideoLinks> {
        let name = path.file_name()?.to_str()?.to_owned();
        Some(VideoLinks {
            browser: self.url(&self.browser, &name),
            download: self.url(&self.download, &name),
            stream: self.url(&self.stream, &name),
            path: path.to_owned(),
            name,
        })
    }

    /// Links for every video under the download root, grouped by extension in
    /// configuration order.
    pub fn video_links(&self) -> Vec<VideoLinks> {
        let roots = [&self.download_dir];
        self.video_extensions
            .iter()
            .flat_map(|ext| file_locator::search(ext, &roots))
            .filter_map(|path| self.links_for(&path))
            .collect()
    }

    /// Renders [`Self::video_links`] into messages of at most `max_length`
    /// characters each.
    pub fn render_video_links(&self, max_length: usize) -> Result<Vec<String>> {
        let links = self.video_links();
        if links.is_empty() {
            return Ok(vec![NO_VIDEOS_MESSAGE.to_owned()]);
        }
        let text = render(&links);
        Chunks::new(&text, max_length, "")
            .map(|piece| piece.map(|p| p.to_owned()))
            .collect()
    }
}

fn render(links: &[VideoLinks]) -> String {
    let mut text = String::new();
    for link in links {
        text.push_str(&format!(
            "**{}**\nBrowser: {}\nDownload: {}\nStream: {}\n\n",
            link.name, link.browser, link.download, link.stream
        ));
    }
    text
}
