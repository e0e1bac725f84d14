use std::borrow::Cow;

use url::Url;

const YTS_TRACKERS: &[&str] = &[
    "udp://open.demonii.com:1337/announce",
    "http://tracker.openbittorrent.com:80/announce",
    "http://tracker.opentrackr.org:1337/announce",
    "udp://p4p.arenabg.com:1337/announce",
];

fn is_yts_download_page(url: &Url) -> bool {
    url.scheme() == "https"
        && url.host_str().is_some_and(|h| h.starts_with("yts"))
        && url.path().contains("/download/")
}

fn yts_to_magnet(url: &Url) -> Option<String> {
    let hash = url
        .path()
        .rsplit_once("/download/")
        .map(|(_, hash)| hash.trim_end_matches('/'))
        .filter(|hash| !hash.is_empty() && !hash.contains('/'))?;
    let mut magnet = format!("magnet:?xt=urn:btih:{hash}&dn={hash}");
    for tracker in YTS_TRACKERS {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    Some(magnet)
}

/// Rewrites links the engine can't use directly into equivalent magnet links.
///
/// Currently handles YTS download pages (`https://yts.../torrent/download/<infohash>`).
/// Anything else is returned unchanged.
pub fn normalize_link(link: &str) -> Cow<'_, str> {
    let link = link.trim();
    match Url::parse(link) {
        Ok(url) if is_yts_download_page(&url) => match yts_to_magnet(&url) {
            Some(magnet) => Cow::Owned(magnet),
            None => Cow::Borrowed(link),
        },
        _ => Cow::Borrowed(link),
    }
}
