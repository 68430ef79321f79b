// Flattens per-endpoint cycle results into the published snapshot.

use crate::models::{Container, Endpoint, Snapshot, Stack};
use std::collections::BTreeMap;

/// Pure transform: nested per-endpoint collections in, one ordered map per kind out.
/// Keys come from each record's composite key, so input order never matters.
pub fn build(
    containers: BTreeMap<u64, Vec<Container>>,
    stacks: BTreeMap<u64, Vec<Stack>>,
    endpoints: Vec<Endpoint>,
) -> Snapshot {
    Snapshot {
        endpoints: endpoints.into_iter().map(|e| (e.key.clone(), e)).collect(),
        containers: containers
            .into_values()
            .flatten()
            .map(|c| (c.key.clone(), c))
            .collect(),
        stacks: stacks
            .into_values()
            .flatten()
            .map(|s| (s.key.clone(), s))
            .collect(),
    }
}
