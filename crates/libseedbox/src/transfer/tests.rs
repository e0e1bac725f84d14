use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{
    Notify,
    mpsc::{UnboundedReceiver, UnboundedSender, error::TryRecvError, unbounded_channel},
};

use super::*;

#[derive(Default)]
struct MockHandle {
    name: String,
    stats: Mutex<EngineStats>,
    destroyed: AtomicBool,
    pause_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
}

impl EngineHandle for MockHandle {
    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn stats(&self) -> EngineStats {
        *self.stats.lock()
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

struct Added {
    link: String,
    output_folder: PathBuf,
    handle: Arc<MockHandle>,
    events: UnboundedSender<EngineEvent>,
}

#[derive(Default)]
struct MockEngine {
    added: Mutex<Vec<Added>>,
    fail_with: Option<String>,
    // If set, add() waits for a notification before returning.
    gate: Option<Arc<Notify>>,
}

impl MockEngine {
    fn last(&self) -> (Arc<MockHandle>, UnboundedSender<EngineEvent>) {
        let g = self.added.lock();
        let last = g.last().expect("nothing was added");
        (last.handle.clone(), last.events.clone())
    }
}

#[async_trait]
impl TransferEngine for MockEngine {
    async fn add(&self, link: &str, output_folder: &Path) -> anyhow::Result<AddedTransfer> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(msg) = &self.fail_with {
            anyhow::bail!("{msg}");
        }
        let handle = Arc::new(MockHandle {
            name: "Some.Movie.2020".to_owned(),
            ..Default::default()
        });
        *handle.stats.lock() = EngineStats {
            downloaded_bytes: 10,
            total_bytes: 100,
            peers: 2,
            ..Default::default()
        };
        let (tx, rx) = unbounded_channel();
        self.added.lock().push(Added {
            link: link.to_owned(),
            output_folder: output_folder.to_owned(),
            handle: handle.clone(),
            events: tx,
        });
        Ok(AddedTransfer { handle, events: rx })
    }
}

#[derive(Debug, PartialEq)]
enum Event {
    Ready(Option<String>),
    Update(u64),
    Complete(TransferState),
    Error(String),
}

struct RecordingObserver {
    tx: UnboundedSender<Event>,
}

impl RecordingObserver {
    fn new() -> (Arc<Self>, UnboundedReceiver<Event>) {
        let (tx, rx) = unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl TransferObserver for RecordingObserver {
    async fn on_ready(&self, status: &TransferStatus) {
        let _ = self.tx.send(Event::Ready(status.name.clone()));
    }
    async fn on_update(&self, progress: &ProgressSnapshot) {
        let _ = self.tx.send(Event::Update(progress.downloaded_bytes));
    }
    async fn on_complete(&self, status: &TransferStatus) {
        let _ = self.tx.send(Event::Complete(status.state));
    }
    async fn on_error(&self, error: &Error) {
        let msg = match error {
            Error::Engine(msg) => msg.clone(),
            other => format!("unexpected error kind: {other}"),
        };
        let _ = self.tx.send(Event::Error(msg));
    }
}

const LINK: &str = "magnet:?xt=urn:btih:cab507494d02ebb1178b38f2e9d7be299c86b862";

fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn controller(engine: Arc<MockEngine>) -> Arc<TransferController> {
    setup_test_logging();
    TransferController::new(engine, "/downloads", DEFAULT_POLL_INTERVAL)
}

async fn next(rx: &mut UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(Duration::from_secs(60), rx.recv())
        .await
        .expect("timed out waiting for an observer event")
        .expect("observer channel closed")
}

// Lets the transfer task run for a while (time is paused, so this is instant).
async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

fn drain_non_updates(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(Event::Update(_)) => continue,
            Ok(e) => events.push(e),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return events,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_ready_then_updates_then_complete_once() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();

    let cancel = controller.start(LINK, observer).unwrap();
    assert!(controller.is_busy());

    assert_eq!(next(&mut rx).await, Event::Ready(Some("Some.Movie.2020".into())));
    assert_eq!(next(&mut rx).await, Event::Update(10));
    assert_eq!(cancel.state(), TransferState::Downloading);

    let (handle, events) = engine.last();
    handle.stats.lock().downloaded_bytes = 60;
    assert_eq!(next(&mut rx).await, Event::Update(60));

    events.send(EngineEvent::Done).unwrap();
    loop {
        match next(&mut rx).await {
            Event::Update(_) => continue,
            other => {
                assert_eq!(other, Event::Complete(TransferState::Completed));
                break;
            }
        }
    }

    settle().await;
    assert!(drain_non_updates(&mut rx).is_empty());
    assert_eq!(handle.destroy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.pause_calls.load(Ordering::SeqCst), 1);
    assert!(!controller.is_busy());
    assert!(controller.current().is_none());

    // Cancelling after completion is a no-op.
    cancel.cancel();
    assert_eq!(cancel.state(), TransferState::Completed);
    assert_eq!(handle.destroy_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_busy() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    let first = controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    let (other_observer, mut other_rx) = RecordingObserver::new();
    let err = controller
        .start("magnet:?xt=urn:btih:other", other_observer)
        .unwrap_err();
    assert!(matches!(err, Error::Busy));

    let current = controller.current().unwrap();
    assert_eq!(current.link, LINK);
    assert_eq!(current.state, TransferState::Downloading);
    assert_eq!(first.state(), TransferState::Downloading);
    assert_eq!(engine.added.lock().len(), 1);

    settle().await;
    assert_eq!(other_rx.try_recv(), Err(TryRecvError::Disconnected));
    first.cancel();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_releases_once_and_frees_slot() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    let cancel = controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));
    assert!(matches!(next(&mut rx).await, Event::Update(_)));

    let (handle, events) = engine.last();
    cancel.cancel();
    cancel.cancel();
    assert_eq!(cancel.state(), TransferState::Cancelled);
    assert_eq!(handle.destroy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(handle.pause_calls.load(Ordering::SeqCst), 1);
    assert!(!controller.is_busy());

    // A late engine event must not produce callbacks.
    let _ = events.send(EngineEvent::Done);
    settle().await;
    assert!(drain_non_updates(&mut rx).is_empty());
    assert_eq!(handle.destroy_calls.load(Ordering::SeqCst), 1);

    let (observer, mut rx) = RecordingObserver::new();
    controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));
    assert_eq!(engine.added.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_reported_once() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    let cancel = controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    let (handle, events) = engine.last();
    events
        .send(EngineEvent::Error(Some("tracker exploded".into())))
        .unwrap();
    events.send(EngineEvent::Done).unwrap();

    settle().await;
    assert_eq!(
        drain_non_updates(&mut rx),
        vec![Event::Error("tracker exploded".into())]
    );
    assert_eq!(cancel.state(), TransferState::Errored);
    assert_eq!(handle.destroy_calls.load(Ordering::SeqCst), 1);
    assert!(!controller.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_engine_error_without_message_uses_generic_text() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    let (_, events) = engine.last();
    events.send(EngineEvent::Error(Some("  ".into()))).unwrap();
    settle().await;
    assert_eq!(
        drain_non_updates(&mut rx),
        vec![Event::Error(GENERIC_FAILURE_MESSAGE.into())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_closed_event_channel_is_a_failure() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    engine.added.lock().clear();
    settle().await;
    assert_eq!(
        drain_non_updates(&mut rx),
        vec![Event::Error(GENERIC_FAILURE_MESSAGE.into())]
    );
    assert!(!controller.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_handle_destroyed_behind_our_back() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    let (handle, _events) = engine.last();
    handle.destroyed.store(true, Ordering::SeqCst);
    settle().await;
    assert_eq!(
        drain_non_updates(&mut rx),
        vec![Event::Error(GENERIC_FAILURE_MESSAGE.into())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_add_failure_reports_error_without_ready() {
    let engine = Arc::new(MockEngine {
        fail_with: Some("invalid magnet".into()),
        ..Default::default()
    });
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    controller.start(LINK, observer).unwrap();

    assert_eq!(next(&mut rx).await, Event::Error("invalid magnet".into()));
    settle().await;
    assert!(drain_non_updates(&mut rx).is_empty());
    assert!(!controller.is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_engine_added() {
    let gate = Arc::new(Notify::new());
    let engine = Arc::new(MockEngine {
        gate: Some(gate.clone()),
        ..Default::default()
    });
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    let cancel = controller.start(LINK, observer).unwrap();
    assert_eq!(cancel.state(), TransferState::Pending);
    assert!(controller.is_busy());

    cancel.cancel();
    assert!(!controller.is_busy());

    gate.notify_one();
    settle().await;

    let (handle, _) = engine.last();
    assert_eq!(handle.destroy_calls.load(Ordering::SeqCst), 1);
    assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn test_stop_current() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    assert!(!controller.stop_current());

    let (observer, mut rx) = RecordingObserver::new();
    let cancel = controller.start(LINK, observer).unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    assert!(controller.stop_current());
    assert_eq!(cancel.state(), TransferState::Cancelled);
    assert!(!controller.stop_current());
}

#[tokio::test(start_paused = true)]
async fn test_link_is_normalized_before_reaching_engine() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (observer, mut rx) = RecordingObserver::new();
    controller
        .start(
            "https://yts.mx/torrent/download/CAB507494D02EBB1178B38F2E9D7BE299C86B862",
            observer,
        )
        .unwrap();
    assert!(matches!(next(&mut rx).await, Event::Ready(_)));

    let g = engine.added.lock();
    assert!(g[0].link.starts_with("magnet:?xt=urn:btih:CAB507494D02EBB1178B38F2E9D7BE299C86B862"));
    assert_eq!(g[0].output_folder, Path::new("/downloads"));
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Call {
    Enter(tokio::time::Instant),
    Exit(tokio::time::Instant),
}

// Takes longer than the poll interval to handle each update.
struct SlowObserver {
    calls: Mutex<Vec<Call>>,
    exits: UnboundedSender<()>,
}

#[async_trait]
impl TransferObserver for SlowObserver {
    async fn on_update(&self, _progress: &ProgressSnapshot) {
        self.calls
            .lock()
            .push(Call::Enter(tokio::time::Instant::now()));
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 3).await;
        self.calls.lock().push(Call::Exit(tokio::time::Instant::now()));
        let _ = self.exits.send(());
    }
}

// The timer wheel has millisecond ticks.
fn assert_about(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(2),
        "expected ~{expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_updates_never_overlap() {
    let engine = Arc::new(MockEngine::default());
    let controller = controller(engine.clone());
    let (exits, mut exits_rx) = unbounded_channel();
    let observer = Arc::new(SlowObserver {
        calls: Mutex::new(Vec::new()),
        exits,
    });
    let cancel = controller.start(LINK, observer.clone()).unwrap();

    for _ in 0..4 {
        tokio::time::timeout(Duration::from_secs(60), exits_rx.recv())
            .await
            .unwrap()
            .unwrap();
    }
    cancel.cancel();
    settle().await;

    let calls = observer.calls.lock().clone();
    assert!(calls.len() >= 8, "{calls:?}");
    let mut last_exit = None;
    for pair in calls.chunks(2) {
        let (Call::Enter(enter), Some(Call::Exit(exit))) = (pair[0], pair.get(1).copied()) else {
            panic!("update callbacks overlapped: {calls:?}");
        };
        assert_about(exit - enter, DEFAULT_POLL_INTERVAL * 3);
        if let Some(last_exit) = last_exit {
            assert_about(enter - last_exit, DEFAULT_POLL_INTERVAL);
        }
        last_exit = Some(exit);
    }
}
