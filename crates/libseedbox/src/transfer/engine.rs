//! The seam between the transfer controller and the peer-to-peer engine.
//!
//! The controller never speaks the wire protocol itself. An engine registers a
//! link, hands back a handle that can be polled for stats, paused and
//! destroyed, and reports the terminal outcome on an event channel.

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;

/// Raw numbers as reported by the engine at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    /// Fraction complete in 0..=1, if the engine computes one.
    pub progress: Option<f64>,
    /// Bytes per second.
    pub download_speed: u64,
    /// Bytes per second.
    pub upload_speed: u64,
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub time_remaining: Option<Duration>,
    pub peers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Done,
    /// The engine failed. The message may be missing or empty.
    Error(Option<String>),
}

pub struct AddedTransfer {
    pub handle: Arc<dyn EngineHandle>,
    /// Terminal events for this transfer. Closing the channel without sending
    /// anything is treated as a failure.
    pub events: UnboundedReceiver<EngineEvent>,
}

#[async_trait]
pub trait TransferEngine: Send + Sync + 'static {
    /// Registers `link` for download into `output_folder`. Resolves once the
    /// engine knows about the transfer (for magnet links, after metadata was
    /// resolved).
    async fn add(&self, link: &str, output_folder: &Path) -> anyhow::Result<AddedTransfer>;
}

pub trait EngineHandle: Send + Sync + 'static {
    /// Resolved content name, i.e. the name of the item in the download root.
    fn name(&self) -> Option<String>;
    fn stats(&self) -> EngineStats;
    fn pause(&self);
    /// Releases every engine resource held for this transfer. Downloaded
    /// files are kept.
    fn destroy(&self);
    fn is_destroyed(&self) -> bool;
}
