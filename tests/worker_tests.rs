// Worker integration test: spawn scheduler, tick, apply commands, shutdown

mod common;

use common::*;
use portwatch::coordinator::{CoordinatorState, Published};
use portwatch::models::{RepairEvent, ResourceKey};
use portwatch::selection::Selection;
use portwatch::worker::{Command, WorkerConfig, WorkerDeps, spawn};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

struct Harness {
    fetcher: Arc<MockFetcher>,
    published_rx: watch::Receiver<Published>,
    events_rx: broadcast::Receiver<RepairEvent>,
    commands_tx: mpsc::Sender<Command>,
    shutdown_tx: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

fn start(selection: Selection, scan_interval: Duration) -> Harness {
    let fetcher = Arc::new(MockFetcher::new());
    fetcher.set_endpoints(Ok(vec![raw_endpoint(1, "local", true)]));
    fetcher.serve_containers(1, vec![raw_container("c-web", "web", "running")]);

    let state = CoordinatorState::new(selection);
    let (published_tx, published_rx) = watch::channel(state.published());
    let (events_tx, events_rx) = broadcast::channel(16);
    let (commands_tx, commands_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = spawn(
        WorkerDeps {
            coordinator: coordinator(fetcher.clone()),
            state,
            published_tx,
            events_tx,
            commands_rx,
            shutdown_rx,
        },
        WorkerConfig { scan_interval },
    );
    Harness {
        fetcher,
        published_rx,
        events_rx,
        commands_tx,
        shutdown_tx,
        handle,
    }
}

fn web_selection() -> Selection {
    Selection {
        endpoints: BTreeSet::from(["1".to_string()]),
        containers: BTreeSet::from(["A_1_web".to_string()]),
        stacks: BTreeSet::new(),
    }
}

async fn wait_for_cycle(rx: &mut watch::Receiver<Published>, cycle: u64) -> Published {
    let published = tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|p| p.cycle >= cycle),
    )
    .await
    .expect("timed out waiting for cycle")
    .expect("worker dropped the publisher");
    published.clone()
}

#[tokio::test]
async fn worker_publishes_and_shuts_down() {
    let mut h = start(web_selection(), Duration::from_millis(20));

    let published = wait_for_cycle(&mut h.published_rx, 1).await;
    assert!(published.updated_at.is_some());
    assert!(
        published
            .snapshot
            .containers
            .contains_key(&ResourceKey::container(CONFIG_ID, 1, "web"))
    );
    assert!(published.last_error.is_none());

    h.shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), h.handle)
        .await
        .expect("worker did not stop")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn worker_broadcasts_repair_events() {
    let mut h = start(web_selection(), Duration::from_secs(1));
    wait_for_cycle(&mut h.published_rx, 1).await;

    h.fetcher.set_containers(1, Ok(Vec::new()));
    let published = wait_for_cycle(&mut h.published_rx, 4).await;
    assert_eq!(published.issues.len(), 1);

    let event = h.events_rx.recv().await.unwrap();
    assert!(matches!(event, RepairEvent::Opened(ref i) if i.id == "missing_container_A_1_web"));

    h.shutdown_tx.send(()).unwrap();
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn worker_applies_fix_and_selection_commands() {
    let mut h = start(web_selection(), Duration::from_secs(1));
    wait_for_cycle(&mut h.published_rx, 1).await;
    h.fetcher.set_containers(1, Ok(Vec::new()));
    wait_for_cycle(&mut h.published_rx, 4).await;

    let (reply, rx) = oneshot::channel();
    h.commands_tx
        .send(Command::FixIssue {
            id_or_key: "A_1_web".into(),
            reply,
        })
        .await
        .unwrap();
    let fixed = rx.await.unwrap().expect("issue fixed");
    assert_eq!(fixed.id, "missing_container_A_1_web");
    h.published_rx
        .wait_for(|p| p.issues.is_empty())
        .await
        .unwrap();

    h.commands_tx
        .send(Command::UpdateSelection(Selection::default()))
        .await
        .unwrap();
    let (reply, rx) = oneshot::channel();
    h.commands_tx
        .send(Command::FixIssue {
            id_or_key: "A_1_web".into(),
            reply,
        })
        .await
        .unwrap();
    assert!(rx.await.unwrap().is_none());

    let after = h.published_rx.borrow().cycle;
    let published = wait_for_cycle(&mut h.published_rx, after + 1).await;
    assert!(published.snapshot.is_empty());
    assert!(published.issues.is_empty());

    h.shutdown_tx.send(()).unwrap();
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn slow_cycles_never_overlap() {
    let mut h = start(web_selection(), Duration::from_secs(1));
    // Longer than the interval, shorter than the fetch timeout.
    h.fetcher.set_endpoints_delay(Duration::from_millis(1500));
    let started = tokio::time::Instant::now();

    tokio::time::timeout(
        Duration::from_secs(30),
        h.published_rx.wait_for(|p| p.cycle >= 3),
    )
    .await
    .expect("timed out waiting for cycle 3")
    .unwrap();

    // Each cycle starts only after the previous one finished.
    assert!(started.elapsed() >= Duration::from_millis(4500));
    assert_eq!(h.fetcher.max_endpoints_in_flight.load(Ordering::SeqCst), 1);
    assert!(h.fetcher.endpoints_calls.load(Ordering::SeqCst) <= 4);
    assert!(h.published_rx.borrow().last_error.is_none());

    h.shutdown_tx.send(()).unwrap();
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_mid_cycle_discards_the_partial_cycle() {
    let mut h = start(web_selection(), Duration::from_secs(1));
    let first = wait_for_cycle(&mut h.published_rx, 1).await;

    h.fetcher.set_endpoints(Ok(Vec::new()));
    h.fetcher.set_endpoints_delay(Duration::from_millis(1500));
    while h.fetcher.endpoints_calls.load(Ordering::SeqCst) < 2 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    h.shutdown_tx.send(()).unwrap();
    h.handle.await.unwrap();

    let last = h.published_rx.borrow().clone();
    assert_eq!(last.cycle, 1);
    assert_eq!(last.updated_at, first.updated_at);
    assert_eq!(*last.snapshot, *first.snapshot);
    assert!(!last.snapshot.is_empty());
}

#[tokio::test(start_paused = true)]
async fn refresh_runs_a_cycle_before_the_next_interval() {
    let mut h = start(web_selection(), Duration::from_secs(60));
    wait_for_cycle(&mut h.published_rx, 1).await;
    let started = tokio::time::Instant::now();

    h.commands_tx.send(Command::Refresh).await.unwrap();
    wait_for_cycle(&mut h.published_rx, 2).await;
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(h.fetcher.endpoints_calls.load(Ordering::SeqCst), 2);

    h.shutdown_tx.send(()).unwrap();
    h.handle.await.unwrap();
}
