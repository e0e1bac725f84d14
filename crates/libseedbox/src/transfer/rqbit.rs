//! [`TransferEngine`] backed by a librqbit [`Session`].

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Context;
use async_trait::async_trait;
use librqbit::{
    AddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrentHandle, Session,
    SessionOptions, TorrentStatsState, api::TorrentIdOrHash,
};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, debug_span, trace};

use super::engine::{AddedTransfer, EngineEvent, EngineHandle, EngineStats, TransferEngine};
use crate::spawn_utils::spawn;

const MIB: f64 = 1024f64 * 1024f64;

pub struct RqbitEngine {
    session: Arc<Session>,
}

impl RqbitEngine {
    /// Creates a session that keeps no state between runs.
    pub async fn new(default_output_folder: PathBuf) -> anyhow::Result<Self> {
        let session = Session::new_with_opts(
            default_output_folder,
            SessionOptions {
                disable_dht_persistence: true,
                ..Default::default()
            },
        )
        .await
        .context("error initializing rqbit session")?;
        Ok(Self { session })
    }

    pub fn from_session(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TransferEngine for RqbitEngine {
    async fn add(&self, link: &str, output_folder: &Path) -> anyhow::Result<AddedTransfer> {
        let response = self
            .session
            .add_torrent(
                AddTorrent::from_url(link.to_owned()),
                Some(AddTorrentOptions {
                    output_folder: Some(output_folder.to_string_lossy().into_owned()),
                    overwrite: true,
                    ..Default::default()
                }),
            )
            .await
            .context("error adding torrent")?;

        let handle = match response {
            AddTorrentResponse::Added(_, handle) => handle,
            AddTorrentResponse::AlreadyManaged(id, handle) => {
                debug!(id, "torrent was already managed, reusing it");
                handle
            }
            AddTorrentResponse::ListOnly(_) => anyhow::bail!("torrent was added in list-only mode"),
        };

        let (tx, events) = unbounded_channel();
        let waiter = handle.clone();
        spawn(debug_span!("wait_until_completed", id = handle.id()), async move {
            let event = match waiter.wait_until_completed().await {
                Ok(()) => EngineEvent::Done,
                Err(e) => EngineEvent::Error(Some(format!("{e:#}"))),
            };
            // The receiver is gone once the transfer ended some other way.
            let _ = tx.send(event);
            Ok(())
        });

        Ok(AddedTransfer {
            handle: Arc::new(RqbitHandle {
                session: self.session.clone(),
                handle,
                destroyed: AtomicBool::new(false),
            }),
            events,
        })
    }
}

struct RqbitHandle {
    session: Arc<Session>,
    handle: ManagedTorrentHandle,
    destroyed: AtomicBool,
}

impl RqbitHandle {
    fn id(&self) -> TorrentIdOrHash {
        TorrentIdOrHash::Id(self.handle.id())
    }
}

impl EngineHandle for RqbitHandle {
    fn name(&self) -> Option<String> {
        self.handle.name()
    }

    fn stats(&self) -> EngineStats {
        let stats = self.handle.stats();
        let live = stats.live.as_ref();
        let speed = |mbps: f64| (mbps * MIB) as u64;
        EngineStats {
            progress: if stats.total_bytes == 0 {
                None
            } else {
                Some(stats.progress_bytes as f64 / stats.total_bytes as f64)
            },
            download_speed: live.map(|l| speed(l.download_speed.mbps)).unwrap_or(0),
            upload_speed: live.map(|l| speed(l.upload_speed.mbps)).unwrap_or(0),
            downloaded_bytes: stats.progress_bytes,
            total_bytes: stats.total_bytes,
            time_remaining: None,
            peers: live
                .map(|l| l.snapshot.peer_stats.live as usize)
                .unwrap_or(0),
        }
    }

    fn pause(&self) {
        if matches!(self.handle.stats().state, TorrentStatsState::Paused) {
            return;
        }
        let session = self.session.clone();
        let handle = self.handle.clone();
        spawn(debug_span!("pause", id = handle.id()), async move {
            if let Err(e) = session.pause(&handle).await {
                trace!("error pausing torrent: {e:#}");
            }
            Ok(())
        });
    }

    fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = self.session.clone();
        let id = self.id();
        spawn(debug_span!("destroy", id = self.handle.id()), async move {
            // Downloaded files stay on disk.
            session
                .delete(id, false)
                .await
                .context("error removing torrent from session")
        });
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst) || self.session.get(self.id()).is_none()
    }
}
