// Consecutive-miss tracking and repair issues for resources that stop showing up.
//
// Per key: UNKNOWN (untracked) -> TRACKING (missed 1..THRESHOLD-1 cycles) ->
// FLAGGED (issue open) -> UNKNOWN once the key reappears, is deselected or is fixed.

use crate::models::{RepairEvent, RepairIssue, ResourceKey, ResourceKind, Snapshot};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Consecutive misses before an issue is opened. At the default 30 s cadence this
/// is about 90 s, long enough to ride out a container restart.
pub const FAILURE_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    Unknown,
    Tracking,
    Flagged,
}

/// One finished cycle as the tracker sees it.
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub previous: &'a Snapshot,
    pub current: &'a Snapshot,
    /// Keys named by the selection, seen or not.
    pub expected: &'a BTreeSet<ResourceKey>,
    /// Endpoints whose containers and stacks could not be listed this cycle.
    pub unobserved: &'a BTreeSet<u64>,
}

impl<'a> Observation<'a> {
    /// A cycle with nothing expected beyond `previous` and every endpoint listed.
    pub fn new(previous: &'a Snapshot, current: &'a Snapshot) -> Self {
        static NO_KEYS: BTreeSet<ResourceKey> = BTreeSet::new();
        static NO_ENDPOINTS: BTreeSet<u64> = BTreeSet::new();
        Self {
            previous,
            current,
            expected: &NO_KEYS,
            unobserved: &NO_ENDPOINTS,
        }
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    misses: u32,
    display_name: String,
    issue: Option<RepairIssue>,
}

#[derive(Debug, Default)]
pub struct FailureTracker {
    tracked: HashMap<ResourceKey, Tracked>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances every candidate key by one cycle and returns the events it caused.
    ///
    /// Candidates are the keys of the previous snapshot, the keys the selection
    /// names directly and keys already being tracked. `is_selected` decides whether
    /// a key is still expected; keys that are not are dropped without being flagged.
    /// Containers and stacks under an unobserved endpoint are left as they are.
    pub fn observe<F>(&mut self, cycle: Observation<'_>, is_selected: F) -> Vec<RepairEvent>
    where
        F: Fn(&ResourceKey) -> bool,
    {
        let Observation {
            previous,
            current,
            expected,
            unobserved,
        } = cycle;
        let candidates: BTreeSet<ResourceKey> = previous
            .keys()
            .chain(expected.iter())
            .chain(self.tracked.keys())
            .filter(|k| {
                k.kind() == ResourceKind::Endpoint || !unobserved.contains(&k.endpoint_id())
            })
            .cloned()
            .collect();
        let mut events = Vec::new();

        for key in candidates {
            if current.contains(&key) {
                if let Some(issue) = self.forget(&key) {
                    info!(issue = %issue.id, name = %issue.display_name, "resource back, repair issue resolved");
                    events.push(RepairEvent::Resolved(issue));
                }
                continue;
            }
            if !is_selected(&key) {
                if let Some(issue) = self.forget(&key) {
                    info!(issue = %issue.id, "resource deselected, repair issue resolved");
                    events.push(RepairEvent::Resolved(issue));
                }
                continue;
            }

            let display_name = previous
                .display_name(&key)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| fallback_name(&key));
            let entry = self.tracked.entry(key.clone()).or_insert(Tracked {
                misses: 0,
                display_name,
                issue: None,
            });
            entry.misses = entry.misses.saturating_add(1);
            tracing::debug!(key = %key, misses = entry.misses, "resource missing");

            if entry.misses >= FAILURE_THRESHOLD && entry.issue.is_none() {
                let issue = RepairIssue::new(key, entry.display_name.clone());
                info!(
                    issue = %issue.id,
                    kind = %issue.kind,
                    name = %issue.display_name,
                    misses = entry.misses,
                    "repair issue opened"
                );
                entry.issue = Some(issue.clone());
                events.push(RepairEvent::Opened(issue));
            }
        }
        events
    }

    /// Drops tracked keys rejected by `is_selected` (selection changed between cycles).
    pub fn retain_selected<F>(&mut self, is_selected: F) -> Vec<RepairEvent>
    where
        F: Fn(&ResourceKey) -> bool,
    {
        let gone: Vec<ResourceKey> = self
            .tracked
            .keys()
            .filter(|k| !is_selected(k))
            .cloned()
            .collect();
        gone.iter()
            .filter_map(|k| self.forget(k))
            .map(RepairEvent::Resolved)
            .collect()
    }

    /// Closes the issue with the given issue id or rendered key and stops tracking it.
    pub fn fix(&mut self, id_or_key: &str) -> Option<RepairIssue> {
        let key = self
            .tracked
            .iter()
            .find(|(k, t)| {
                t.issue
                    .as_ref()
                    .is_some_and(|i| i.id == id_or_key || k.to_string() == id_or_key)
            })
            .map(|(k, _)| k.clone())?;
        self.forget(&key)
    }

    pub fn misses(&self, key: &ResourceKey) -> u32 {
        self.tracked.get(key).map_or(0, |t| t.misses)
    }

    pub fn state(&self, key: &ResourceKey) -> TrackState {
        match self.tracked.get(key) {
            None => TrackState::Unknown,
            Some(t) if t.issue.is_some() => TrackState::Flagged,
            Some(_) => TrackState::Tracking,
        }
    }

    /// Open issues ordered by key.
    pub fn open_issues(&self) -> Vec<RepairIssue> {
        let mut issues: Vec<RepairIssue> = self
            .tracked
            .values()
            .filter_map(|t| t.issue.clone())
            .collect();
        issues.sort_by(|a, b| a.key.cmp(&b.key));
        issues
    }

    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    fn forget(&mut self, key: &ResourceKey) -> Option<RepairIssue> {
        self.tracked.remove(key).and_then(|t| t.issue)
    }
}

/// Name for a key that was never seen: container name or stack id, or the
/// rendered key for endpoints.
fn fallback_name(key: &ResourceKey) -> String {
    match key.name() {
        "" => key.to_string(),
        name => name.to_string(),
    }
}
