// One reconciliation cycle: fetch -> filter -> enrich -> flatten -> track.
// Polling state lives in an explicitly owned CoordinatorState handed to each cycle.

use crate::config::Features;
use crate::enricher::DetailEnricher;
use crate::fetcher::{FetchError, InventoryFetcher, RawEndpoint, with_timeout};
use crate::models::{Container, Endpoint, RepairEvent, RepairIssue, Snapshot, Stack};
use crate::selection::{Selection, SelectionFilter};
use crate::snapshot;
use crate::tracker::{FailureTracker, Observation};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// A failure that prevents the whole cycle from producing a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    #[error("listing endpoints failed: {0}")]
    Endpoints(FetchError),
    #[error("endpoint {endpoint_id} rejected credentials")]
    Unauthorized { endpoint_id: u64 },
}

impl CycleError {
    /// The fetch error behind this cycle failure.
    pub fn fetch_error(&self) -> FetchError {
        match self {
            CycleError::Endpoints(e) => e.clone(),
            CycleError::Unauthorized { .. } => FetchError::Unauthorized,
        }
    }
}

impl Serialize for CycleError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Identity and tuning of the instance being reconciled.
#[derive(Debug, Clone)]
pub struct CoordinatorContext {
    pub config_id: String,
    pub config_name: String,
    pub features: Features,
    pub fetch_timeout: Duration,
    pub max_concurrent_inspections: usize,
}

/// What consumers see: the latest snapshot, open issues and the last cycle error.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Published {
    pub cycle: u64,
    pub updated_at: Option<DateTime<Utc>>,
    pub snapshot: Arc<Snapshot>,
    pub issues: Vec<RepairIssue>,
    pub last_error: Option<CycleError>,
}

/// Result of one tick.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub snapshot: Arc<Snapshot>,
    pub error: Option<CycleError>,
    pub events: Vec<RepairEvent>,
}

/// Single-writer polling state: previous snapshot, failure counters, selection.
#[derive(Debug, Default)]
pub struct CoordinatorState {
    selection: Selection,
    snapshot: Arc<Snapshot>,
    tracker: FailureTracker,
    last_error: Option<CycleError>,
    cycle: u64,
    updated_at: Option<DateTime<Utc>>,
}

impl CoordinatorState {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            ..Default::default()
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> {
        &self.snapshot
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    pub fn last_error(&self) -> Option<&CycleError> {
        self.last_error.as_ref()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Replaces the selection. Tracked keys that are no longer selected are dropped
    /// right away; issues open for them are resolved.
    pub fn set_selection(&mut self, ctx: &CoordinatorContext, selection: Selection) -> Vec<RepairEvent> {
        self.selection = selection;
        let filter = SelectionFilter::new(&ctx.config_id, &ctx.config_name, &self.selection);
        self.tracker.retain_selected(|k| filter.accepts_key(k))
    }

    /// Closes an open issue (by issue id or rendered key) and forgets the resource.
    pub fn fix_issue(&mut self, id_or_key: &str) -> Option<RepairIssue> {
        self.tracker.fix(id_or_key)
    }

    pub fn published(&self) -> Published {
        Published {
            cycle: self.cycle,
            updated_at: self.updated_at,
            snapshot: self.snapshot.clone(),
            issues: self.tracker.open_issues(),
            last_error: self.last_error.clone(),
        }
    }
}

/// A cycle's inventory before it is handed to the tracker.
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub snapshot: Snapshot,
    /// Endpoints whose container or stack listing failed transiently. Their
    /// containers and stacks are carried over from the previous snapshot.
    pub unobserved: BTreeSet<u64>,
}

/// Everything one endpoint contributed to a cycle.
enum EndpointInventory {
    Listed {
        endpoint: Endpoint,
        containers: Vec<Container>,
        stacks: Vec<Stack>,
    },
    /// Up, but its listings could not be read this cycle.
    Unlisted(Endpoint),
}

pub struct Coordinator {
    fetcher: Arc<dyn InventoryFetcher>,
    ctx: CoordinatorContext,
}

impl Coordinator {
    pub fn new(fetcher: Arc<dyn InventoryFetcher>, ctx: CoordinatorContext) -> Self {
        Self { fetcher, ctx }
    }

    pub fn context(&self) -> &CoordinatorContext {
        &self.ctx
    }

    /// Runs one cycle against `state`. On success the new snapshot replaces the
    /// previous one and the tracker advances; on failure the previous snapshot is
    /// kept, the error is recorded and the counters are left alone.
    ///
    /// State is only touched after every fetch has finished, so dropping this
    /// future mid-cycle leaves `state` as it was.
    #[instrument(skip_all, fields(cycle = state.cycle + 1))]
    pub async fn tick(&self, state: &mut CoordinatorState) -> CycleOutcome {
        let result = self.collect(&state.selection, &state.snapshot).await;
        state.cycle += 1;
        state.updated_at = Some(Utc::now());

        match result {
            Ok(Collected {
                snapshot: next,
                unobserved,
            }) => {
                let filter =
                    SelectionFilter::new(&self.ctx.config_id, &self.ctx.config_name, &state.selection);
                let expected = filter.selected_keys();
                let cycle = Observation {
                    previous: &state.snapshot,
                    current: &next,
                    expected: &expected,
                    unobserved: &unobserved,
                };
                let events = state.tracker.observe(cycle, |k| filter.accepts_key(k));
                debug!(
                    endpoints = next.endpoints.len(),
                    containers = next.containers.len(),
                    stacks = next.stacks.len(),
                    unobserved = unobserved.len(),
                    tracked = state.tracker.tracked_len(),
                    events = events.len(),
                    "cycle complete"
                );
                state.snapshot = Arc::new(next);
                state.last_error = None;
                CycleOutcome {
                    snapshot: state.snapshot.clone(),
                    error: None,
                    events,
                }
            }
            Err(e) => {
                warn!(error = %e, "cycle failed, keeping previous snapshot");
                state.last_error = Some(e.clone());
                CycleOutcome {
                    snapshot: state.snapshot.clone(),
                    error: Some(e),
                    events: Vec::new(),
                }
            }
        }
    }

    /// Fetches, filters, enriches and flattens one cycle's inventory. `previous`
    /// supplies containers and stacks for endpoints that could not be listed.
    pub async fn collect(
        &self,
        selection: &Selection,
        previous: &Snapshot,
    ) -> Result<Collected, CycleError> {
        let raw_endpoints = with_timeout(self.ctx.fetch_timeout, self.fetcher.endpoints())
            .await
            .map_err(CycleError::Endpoints)?;
        let filter = SelectionFilter::new(&self.ctx.config_id, &self.ctx.config_name, selection);
        let (selected, rejected): (Vec<RawEndpoint>, Vec<RawEndpoint>) = raw_endpoints
            .into_iter()
            .partition(|e| filter.endpoint_selected(e.id));
        debug!(
            selected = selected.len(),
            rejected = rejected.len(),
            "endpoints filtered"
        );

        let results = join_all(selected.iter().map(|raw| self.collect_endpoint(&filter, raw))).await;

        let mut endpoints = Vec::with_capacity(results.len());
        let mut containers = BTreeMap::new();
        let mut stacks = BTreeMap::new();
        let mut unobserved = BTreeSet::new();
        for result in results {
            match result? {
                None => continue,
                Some(EndpointInventory::Listed {
                    endpoint,
                    containers: listed_containers,
                    stacks: listed_stacks,
                }) => {
                    containers.insert(endpoint.id, listed_containers);
                    stacks.insert(endpoint.id, listed_stacks);
                    endpoints.push(endpoint);
                }
                Some(EndpointInventory::Unlisted(endpoint)) => {
                    let id = endpoint.id;
                    let held_containers: Vec<Container> = previous
                        .containers
                        .values()
                        .filter(|c| c.endpoint_id == id)
                        .cloned()
                        .collect();
                    let held_stacks: Vec<Stack> = previous
                        .stacks
                        .values()
                        .filter(|s| s.endpoint_id == id)
                        .cloned()
                        .collect();
                    debug!(
                        endpoint_id = id,
                        containers = held_containers.len(),
                        stacks = held_stacks.len(),
                        "holding previous inventory"
                    );
                    containers.insert(id, held_containers);
                    stacks.insert(id, held_stacks);
                    unobserved.insert(id);
                    endpoints.push(endpoint);
                }
            }
        }
        Ok(Collected {
            snapshot: snapshot::build(containers, stacks, endpoints),
            unobserved,
        })
    }

    /// `Ok(None)` drops the endpoint from this cycle (it answered NotFound).
    /// A transient failure of either listing yields `Unlisted`, since stack state
    /// depends on the container listing.
    #[instrument(skip_all, fields(endpoint_id = raw.id))]
    async fn collect_endpoint(
        &self,
        filter: &SelectionFilter<'_>,
        raw: &RawEndpoint,
    ) -> Result<Option<EndpointInventory>, CycleError> {
        let endpoint = Endpoint::from_raw(&self.ctx.config_id, raw);
        if !endpoint.is_up() {
            debug!(name = %endpoint.name, "endpoint down, skipping containers and stacks");
            return Ok(Some(EndpointInventory::Listed {
                endpoint,
                containers: Vec::new(),
                stacks: Vec::new(),
            }));
        }

        let timeout = self.ctx.fetch_timeout;
        let (raw_containers, raw_stacks) = tokio::join!(
            with_timeout(timeout, self.fetcher.containers(endpoint.id)),
            with_timeout(timeout, self.fetcher.stacks(endpoint.id)),
        );
        let raw_containers = self.endpoint_level(&endpoint, "containers", raw_containers)?;
        let raw_stacks = self.endpoint_level(&endpoint, "stacks", raw_stacks)?;
        let (raw_containers, raw_stacks) = match (raw_containers, raw_stacks) {
            (Listing::Gone, _) | (_, Listing::Gone) => return Ok(None),
            (Listing::Items(c), Listing::Items(s)) => (c, s),
            _ => return Ok(Some(EndpointInventory::Unlisted(endpoint))),
        };

        let stacks: Vec<Stack> = filter
            .stacks(raw_stacks)
            .0
            .iter()
            .map(|s| Stack::from_raw(&self.ctx.config_id, endpoint.id, s, &raw_containers))
            .collect();

        let summaries: Vec<Container> = raw_containers
            .iter()
            .map(|c| Container::from_summary(&self.ctx.config_id, endpoint.id, &endpoint.name, c))
            .collect();
        let (accepted, rejected) = filter.containers(summaries);
        debug!(
            accepted = accepted.len(),
            rejected = rejected.len(),
            "containers filtered"
        );

        let enricher = DetailEnricher::new(
            self.fetcher.as_ref(),
            self.ctx.features,
            timeout,
            self.ctx.max_concurrent_inspections,
        );
        let mut containers = Vec::with_capacity(accepted.len());
        for outcome in enricher.enrich_all(accepted).await {
            match outcome {
                Ok(c) => containers.push(c),
                Err((_, FetchError::Unauthorized)) => {
                    return Err(CycleError::Unauthorized {
                        endpoint_id: endpoint.id,
                    });
                }
                Err((c, e)) => {
                    warn!(
                        container = %c.name,
                        error = %e,
                        operation = "container_detail",
                        "container detail failed, dropping from this cycle"
                    );
                }
            }
        }

        Ok(Some(EndpointInventory::Listed {
            endpoint,
            containers,
            stacks,
        }))
    }

    /// Applies the endpoint-level error policy to a listing result:
    /// Unauthorized fails the cycle, NotFound drops the endpoint, anything else
    /// leaves the listing unread for this cycle.
    fn endpoint_level<T>(
        &self,
        endpoint: &Endpoint,
        operation: &'static str,
        result: Result<Vec<T>, FetchError>,
    ) -> Result<Listing<T>, CycleError> {
        match result {
            Ok(items) => Ok(Listing::Items(items)),
            Err(FetchError::Unauthorized) => Err(CycleError::Unauthorized {
                endpoint_id: endpoint.id,
            }),
            Err(FetchError::NotFound) => {
                warn!(
                    endpoint = %endpoint.name,
                    operation,
                    "endpoint not found, dropping from this cycle"
                );
                Ok(Listing::Gone)
            }
            Err(e) => {
                warn!(
                    endpoint = %endpoint.name,
                    operation,
                    error = %e,
                    "endpoint listing failed, keeping previous inventory"
                );
                Ok(Listing::Unread)
            }
        }
    }
}

/// Outcome of one endpoint-level listing.
enum Listing<T> {
    Items(Vec<T>),
    Gone,
    Unread,
}
