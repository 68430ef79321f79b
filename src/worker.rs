// Background scheduler: runs one reconciliation cycle per interval and publishes the result.
// Cycles never overlap; ticks that come due while a cycle runs are skipped.
// Commands (selection updates, issue fixes, refreshes) are applied between cycles.

use crate::coordinator::{Coordinator, CoordinatorState, Published};
use crate::models::{RepairEvent, RepairIssue};
use crate::selection::Selection;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::Instrument;

/// Capacity of the command channel into the scheduler.
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Requests from consumers, applied by the scheduler between cycles.
#[derive(Debug)]
pub enum Command {
    UpdateSelection(Selection),
    FixIssue {
        id_or_key: String,
        reply: oneshot::Sender<Option<RepairIssue>>,
    },
    /// Run the next cycle now instead of at the next interval.
    Refresh,
}

/// Coordinator, its state, channels, and shutdown for the worker.
pub struct WorkerDeps {
    pub coordinator: Coordinator,
    pub state: CoordinatorState,
    pub published_tx: watch::Sender<Published>,
    pub events_tx: broadcast::Sender<RepairEvent>,
    pub commands_rx: mpsc::Receiver<Command>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

/// Worker timing config.
pub struct WorkerConfig {
    pub scan_interval: Duration,
}

pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<()> {
    let WorkerDeps {
        coordinator,
        mut state,
        published_tx,
        events_tx,
        mut commands_rx,
        mut shutdown_rx,
    } = deps;

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        scan_interval_ms = config.scan_interval.as_millis() as u64
    );

    tokio::spawn(
        async move {
            let mut tick = interval(config.scan_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let outcome = tokio::select! {
                            outcome = coordinator.tick(&mut state) => outcome,
                            _ = &mut shutdown_rx => {
                                tracing::debug!("Worker shutting down, in-flight cycle discarded");
                                break;
                            }
                        };
                        publish_events(&events_tx, outcome.events);
                        published_tx.send_replace(state.published());
                    }
                    Some(command) = commands_rx.recv() => {
                        match command {
                            Command::UpdateSelection(selection) => {
                                let events = state.set_selection(coordinator.context(), selection);
                                tracing::info!(resolved = events.len(), "selection updated");
                                publish_events(&events_tx, events);
                            }
                            Command::FixIssue { id_or_key, reply } => {
                                let fixed = state.fix_issue(&id_or_key);
                                if let Some(issue) = &fixed {
                                    tracing::info!(issue = %issue.id, "repair issue fixed");
                                }
                                let _ = reply.send(fixed);
                            }
                            Command::Refresh => {
                                tracing::debug!("refresh requested");
                                tick.reset_immediately();
                                continue;
                            }
                        }
                        published_tx.send_replace(state.published());
                    }
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Worker shutting down");
                        break;
                    }
                }
            }
        }
        .instrument(worker_span),
    )
}

fn publish_events(events_tx: &broadcast::Sender<RepairEvent>, events: Vec<RepairEvent>) {
    for event in events {
        if events_tx.send(event).is_err() {
            tracing::debug!(
                operation = "broadcast_repair_event",
                "No subscribers for repair events"
            );
        }
    }
}
