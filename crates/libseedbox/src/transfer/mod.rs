//! The single-slot transfer controller.
//!
//! At most one transfer is active at a time. [`TransferController::start`]
//! fails fast with [`Error::Busy`] instead of queueing. Each transfer is driven
//! by one task: it waits for the engine to register the link, announces
//! readiness, then polls progress until the engine reports completion or
//! failure, or the transfer is cancelled.

mod engine;
mod link;
mod progress;
#[cfg(feature = "rqbit")]
pub mod rqbit;
#[cfg(test)]
mod tests;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, trace, warn};

use crate::{Error, Result, spawn_utils::spawn};

pub use engine::{AddedTransfer, EngineEvent, EngineHandle, EngineStats, TransferEngine};
pub use link::normalize_link;
pub use progress::{DurationWithHumanReadable, ProgressSnapshot, Speed};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Reported when the engine fails without saying why.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to download torrent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Pending,
    Downloading,
    Completed,
    Errored,
    Cancelled,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Errored | TransferState::Cancelled
        )
    }
}

impl std::fmt::Display for TransferState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TransferState::Pending => "pending",
            TransferState::Downloading => "downloading",
            TransferState::Completed => "completed",
            TransferState::Errored => "errored",
            TransferState::Cancelled => "cancelled",
        })
    }
}

/// A point-in-time view of a transfer, handed to observers and to callers of
/// [`TransferController::current`].
#[derive(Debug, Clone, Serialize)]
pub struct TransferStatus {
    pub link: String,
    pub name: Option<String>,
    pub output_folder: PathBuf,
    pub state: TransferState,
    pub progress: Option<ProgressSnapshot>,
}

/// Receives the lifecycle notifications of one transfer.
///
/// `on_ready` comes before any `on_update`; then exactly one of `on_complete`
/// and `on_error`, or nothing at all if the transfer was cancelled. Every call
/// is awaited before the transfer task moves on.
#[async_trait]
pub trait TransferObserver: Send + Sync + 'static {
    async fn on_ready(&self, _status: &TransferStatus) {}
    async fn on_update(&self, _progress: &ProgressSnapshot) {}
    async fn on_complete(&self, _status: &TransferStatus) {}
    async fn on_error(&self, _error: &Error) {}
}

struct TransferLocked {
    state: TransferState,
    // Taken exactly once, by whoever releases the transfer first.
    handle: Option<Arc<dyn EngineHandle>>,
    name: Option<String>,
    progress: Option<ProgressSnapshot>,
}

struct Transfer {
    link: String,
    output_folder: PathBuf,
    locked: RwLock<TransferLocked>,
    cancellation_token: CancellationToken,
}

impl Transfer {
    fn new(link: String, output_folder: PathBuf) -> Self {
        Self {
            link,
            output_folder,
            locked: RwLock::new(TransferLocked {
                state: TransferState::Pending,
                handle: None,
                name: None,
                progress: None,
            }),
            cancellation_token: CancellationToken::new(),
        }
    }

    fn state(&self) -> TransferState {
        self.locked.read().state
    }

    fn status(&self) -> TransferStatus {
        let g = self.locked.read();
        TransferStatus {
            link: self.link.clone(),
            name: g.name.clone(),
            output_folder: self.output_folder.clone(),
            state: g.state,
            progress: g.progress,
        }
    }

    /// Stores the engine handle and moves to `Downloading`. Returns false if
    /// the transfer already ended, in which case the caller owns the handle.
    fn attach(&self, handle: Arc<dyn EngineHandle>) -> bool {
        let mut g = self.locked.write();
        if g.state.is_terminal() {
            return false;
        }
        g.name = handle.name();
        g.handle = Some(handle);
        g.state = TransferState::Downloading;
        true
    }

    fn update_progress(&self, stats: EngineStats) -> ProgressSnapshot {
        let mut g = self.locked.write();
        let snapshot = ProgressSnapshot::from_engine(stats, g.progress.as_ref());
        g.progress = Some(snapshot);
        snapshot
    }

    /// Moves to a terminal state and releases the engine resources. Only the
    /// first terminal transition wins; later ones return false and do nothing.
    fn finish(&self, to: TransferState) -> bool {
        debug_assert!(to.is_terminal());
        let handle = {
            let mut g = self.locked.write();
            if g.state.is_terminal() {
                return false;
            }
            g.state = to;
            g.handle.take()
        };
        self.cancellation_token.cancel();
        if let Some(handle) = handle {
            release(&*handle);
        }
        true
    }
}

fn release(handle: &dyn EngineHandle) {
    handle.pause();
    handle.destroy();
}

/// Cancels the transfer it was returned for. Fire-and-forget: no observer
/// method is called as a result.
#[derive(Clone)]
pub struct CancelHandle {
    transfer: Arc<Transfer>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.transfer.finish(TransferState::Cancelled) {
            info!(link = %self.transfer.link, "transfer cancelled");
        }
    }

    pub fn state(&self) -> TransferState {
        self.transfer.state()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("link", &self.transfer.link)
            .field("state", &self.transfer.state())
            .finish()
    }
}

pub struct TransferController {
    engine: Arc<dyn TransferEngine>,
    output_folder: PathBuf,
    poll_interval: Duration,
    current: Mutex<Option<Arc<Transfer>>>,
}

impl TransferController {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        output_folder: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            output_folder: output_folder.into(),
            poll_interval,
            current: Mutex::new(None),
        })
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// True while a transfer is pending or downloading.
    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|t| !t.state().is_terminal())
    }

    /// Status of the active transfer, if any.
    pub fn current(&self) -> Option<TransferStatus> {
        self.current
            .lock()
            .as_ref()
            .filter(|t| !t.state().is_terminal())
            .map(|t| t.status())
    }

    /// Cancels the active transfer. Returns false if there was none.
    pub fn stop_current(&self) -> bool {
        let transfer = self.current.lock().take();
        match transfer {
            Some(transfer) if !transfer.state().is_terminal() => {
                CancelHandle { transfer }.cancel();
                true
            }
            _ => false,
        }
    }

    /// Starts downloading `link` into the output folder.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        self: &Arc<Self>,
        link: &str,
        observer: Arc<dyn TransferObserver>,
    ) -> Result<CancelHandle> {
        let link = normalize_link(link).into_owned();
        let transfer = {
            let mut g = self.current.lock();
            if g.as_ref().is_some_and(|t| !t.state().is_terminal()) {
                debug!(%link, "rejecting transfer, another one is active");
                return Err(Error::Busy);
            }
            let transfer = Arc::new(Transfer::new(link, self.output_folder.clone()));
            *g = Some(transfer.clone());
            transfer
        };

        info!(link = %transfer.link, output_folder = ?self.output_folder, "starting transfer");

        let this = self.clone();
        let t = transfer.clone();
        spawn(
            debug_span!("transfer", link = %transfer.link),
            async move {
                this.drive(&t, &*observer).await;
                this.clear_slot(&t);
                Ok(())
            },
        );

        Ok(CancelHandle { transfer })
    }

    fn clear_slot(&self, transfer: &Arc<Transfer>) {
        let mut g = self.current.lock();
        if g.as_ref().is_some_and(|t| Arc::ptr_eq(t, transfer)) {
            *g = None;
        }
    }

    async fn fail(&self, transfer: &Transfer, observer: &dyn TransferObserver, message: String) {
        if transfer.finish(TransferState::Errored) {
            warn!(link = %transfer.link, "transfer failed: {message}");
            observer.on_error(&Error::Engine(message)).await;
        }
    }

    async fn drive(&self, transfer: &Transfer, observer: &dyn TransferObserver) {
        let added = self.engine.add(&transfer.link, &self.output_folder).await;
        let AddedTransfer { handle, mut events } = match added {
            Ok(added) => added,
            Err(e) => {
                self.fail(transfer, observer, format!("{e:#}")).await;
                return;
            }
        };

        if !transfer.attach(handle.clone()) {
            debug!("transfer ended before the engine added it, releasing");
            release(&*handle);
            return;
        }
        info!(name = ?handle.name(), "transfer ready");
        observer.on_ready(&transfer.status()).await;

        loop {
            if transfer.state().is_terminal() {
                trace!("transfer ended, stopping progress loop");
                return;
            }
            if handle.is_destroyed() {
                self.fail(transfer, observer, GENERIC_FAILURE_MESSAGE.to_owned())
                    .await;
                return;
            }

            let progress = transfer.update_progress(handle.stats());
            trace!(%progress, "progress");
            observer.on_update(&progress).await;

            tokio::select! {
                biased;
                _ = transfer.cancellation_token.cancelled() => {
                    trace!("transfer ended, stopping progress loop");
                    return;
                }
                event = events.recv() => {
                    match event {
                        Some(EngineEvent::Done) => {
                            if transfer.finish(TransferState::Completed) {
                                info!("transfer completed");
                                observer.on_complete(&transfer.status()).await;
                            }
                        }
                        Some(EngineEvent::Error(message)) => {
                            let message = message
                                .filter(|m| !m.trim().is_empty())
                                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_owned());
                            self.fail(transfer, observer, message).await;
                        }
                        None => {
                            self.fail(transfer, observer, GENERIC_FAILURE_MESSAGE.to_owned())
                                .await;
                        }
                    }
                    return;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
