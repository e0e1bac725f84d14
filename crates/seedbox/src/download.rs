use std::sync::Arc;

use async_trait::async_trait;
use libseedbox::{
    Error,
    config::Config,
    links::LinkBuilder,
    transfer::{
        CancelHandle, ProgressSnapshot, TransferController, TransferObserver, TransferStatus,
        rqbit::RqbitEngine,
    },
};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing::{error, info, warn};

enum Outcome {
    Completed,
    Failed(String),
}

/// Logs the lifecycle of a transfer and reports how it ended.
struct LoggingObserver {
    links: Option<LinkBuilder>,
    done: UnboundedSender<Outcome>,
}

#[async_trait]
impl TransferObserver for LoggingObserver {
    async fn on_ready(&self, status: &TransferStatus) {
        info!(name = ?status.name, folder = ?status.output_folder, "downloading");
    }

    async fn on_update(&self, progress: &ProgressSnapshot) {
        info!("{progress}");
    }

    async fn on_complete(&self, status: &TransferStatus) {
        info!(name = ?status.name, "download complete");
        if let Some(links) = &self.links {
            for v in links.video_links() {
                info!(name = %v.name, browser = %v.browser, stream = %v.stream, download = %v.download);
            }
        }
        let _ = self.done.send(Outcome::Completed);
    }

    async fn on_error(&self, error: &Error) {
        error!("{error:#}");
        let _ = self.done.send(Outcome::Failed(error.to_string()));
    }
}

async fn make_controller(config: &Config) -> anyhow::Result<Arc<TransferController>> {
    let engine = RqbitEngine::new(config.storage.download_dir.clone()).await?;
    Ok(TransferController::new(
        Arc::new(engine),
        config.storage.download_dir.clone(),
        config.transfer.poll_interval(),
    ))
}

/// Starts a transfer and returns without waiting for it. Completion is only
/// logged.
pub async fn start_in_background(config: &Config, link: &str) -> anyhow::Result<CancelHandle> {
    let controller = make_controller(config).await?;
    let (tx, _rx) = unbounded_channel();
    let observer = LoggingObserver {
        links: Some(LinkBuilder::new(config)),
        done: tx,
    };
    Ok(controller.start(link, Arc::new(observer))?)
}

/// Downloads `link`, printing the video links once done. Ctrl-C cancels.
pub async fn run(config: &Config, links: &LinkBuilder, link: &str) -> anyhow::Result<()> {
    let controller = make_controller(config).await?;
    let (tx, mut rx) = unbounded_channel();
    let cancel = controller.start(
        link,
        Arc::new(LoggingObserver {
            links: None,
            done: tx,
        }),
    )?;

    tokio::select! {
        outcome = rx.recv() => match outcome {
            Some(Outcome::Completed) => {
                for message in links.render_video_links(libseedbox::chunker::DEFAULT_MAX_LENGTH)? {
                    println!("{message}");
                }
                Ok(())
            }
            Some(Outcome::Failed(message)) => anyhow::bail!(message),
            None => anyhow::bail!("transfer ended without a result"),
        },
        r = tokio::signal::ctrl_c() => {
            r?;
            warn!("interrupted, cancelling download");
            cancel.cancel();
            Ok(())
        }
    }
}
